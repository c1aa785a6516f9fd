mod cli;
mod setup;

use anyhow::Result;
use clap::Parser;
use tokio::io::AsyncBufReadExt;

use warden_core::config::{AppConfig, AutoLockPolicy, BiometricMode};
use warden_core::{lifecycle, LifecycleEvent};
use warden_session::SecurityCenter;

use cli::{Cli, Commands};

#[tokio::main]
async fn main() -> Result<()> {
    lifecycle::init_tracing();

    let cli = Cli::parse();
    let config = AppConfig::load_or_default(cli.config.as_deref());

    match cli.command {
        Commands::Run => {
            lifecycle::log_startup();
            let center = setup::build_center(&config)?;
            run_interactive(center).await?;
        }

        Commands::Status => {
            let center = setup::build_center(&config)?;
            print_status(&center);
        }

        Commands::SetCredential { value } => {
            let mut center = setup::build_center(&config)?;
            center.set_primary_credential(&value)?;
            println!("Primary credential set");
        }

        Commands::RemoveCredential => {
            let mut center = setup::build_center(&config)?;
            center.remove_primary_credential()?;
            println!("Primary credential removed");
        }

        Commands::SetDuress { value } => {
            let mut center = setup::build_center(&config)?;
            center.set_duress_credential(&value)?;
            println!("Duress credential set");
        }

        Commands::RemoveDuress => {
            let mut center = setup::build_center(&config)?;
            center.remove_duress_credential()?;
            println!("Duress credential removed");
        }

        Commands::SetPolicy { policy } => {
            let parsed = AutoLockPolicy::from_token(&policy)
                .ok_or_else(|| anyhow::anyhow!("Unknown policy token: {policy}"))?;
            let mut center = setup::build_center(&config)?;
            center.set_auto_lock_policy(parsed);
            println!("Auto-lock policy: {}", parsed.label());
        }

        Commands::SetBiometric { mode } => {
            let parsed = BiometricMode::from_token(&mode)
                .ok_or_else(|| anyhow::anyhow!("Unknown biometric mode: {mode}"))?;
            let mut center = setup::build_center(&config)?;
            center.set_biometric_mode(parsed)?;
            println!("Biometric mode: {}", parsed.label());
        }
    }

    Ok(())
}

fn print_status(center: &SecurityCenter) {
    println!("locked:        {}", center.is_locked());
    println!("primary set:   {}", center.is_primary_set());
    println!("duress set:    {}", center.is_duress_set());
    println!("auto-lock:     {}", center.auto_lock_policy().label());
    println!("biometrics:    {}", center.biometric_mode().label());
    println!("lockout:       {:?}", center.lockout_state());
    println!("device trust:  {:?}", center.device_trust());
}

/// Drive the unlock protocol from stdin: submit digits, request biometrics,
/// and simulate background/foreground cycles.
async fn run_interactive(mut center: SecurityCenter) -> Result<()> {
    if let Some(mut events) = center.take_auth_events() {
        tokio::spawn(async move {
            while let Some(event) = events.recv().await {
                tracing::info!(?event, "auth event");
            }
        });
    }

    center.handle_lifecycle(LifecycleEvent::WillEnterForeground);
    if center.is_locked() {
        center.present_unlock().await;
    }
    print_status(&center);
    println!("Commands: <digits> submit credential, bio, bg <secs>, status, quit");

    let stdin = tokio::io::BufReader::new(tokio::io::stdin());
    let mut lines = stdin.lines();
    while let Some(line) = lines.next_line().await? {
        let line = line.trim();
        match line {
            "" => {}
            "quit" => break,
            "status" => print_status(&center),
            "bio" => center.request_biometric_unlock().await?,
            _ if line.starts_with("bg ") => {
                let secs: u64 = line[3..].trim().parse().unwrap_or(0);
                center.handle_lifecycle(LifecycleEvent::EnteredBackground);
                println!("(backgrounded for {secs}s)");
                tokio::time::sleep(std::time::Duration::from_secs(secs)).await;
                center.handle_lifecycle(LifecycleEvent::WillEnterForeground);
                if center.is_locked() {
                    center.present_unlock().await;
                    println!("Session locked — enter your credential");
                }
            }
            digits => {
                center.submit_credential(digits)?;
                if !center.is_locked() {
                    println!("Unlocked");
                }
            }
        }
    }

    lifecycle::log_shutdown();
    Ok(())
}
