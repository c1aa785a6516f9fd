use std::path::PathBuf;

use clap::{Parser, Subcommand};

#[derive(Parser)]
#[command(name = "warden", about = "Warden — local authentication for a sensitive wallet app")]
pub struct Cli {
    /// Path to config file
    #[arg(long)]
    pub config: Option<PathBuf>,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Interactive unlock session
    Run,

    /// Print credential, lockout, and session state
    Status,

    /// Set or replace the primary credential
    SetCredential {
        #[arg(long)]
        value: String,
    },

    /// Remove the primary credential (discards duress too)
    RemoveCredential,

    /// Set or replace the duress credential
    SetDuress {
        #[arg(long)]
        value: String,
    },

    /// Remove the duress credential
    RemoveDuress,

    /// Set the auto-lock policy (immediate, 1m, 5m, 15m, 30m, 1h)
    SetPolicy {
        #[arg(long)]
        policy: String,
    },

    /// Set the biometric mode (off, manual, automatic)
    SetBiometric {
        #[arg(long)]
        mode: String,
    },
}
