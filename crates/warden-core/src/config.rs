use std::path::Path;
use std::time::Duration;

use serde::Deserialize;

/// Preference-store key for the auto-lock policy token.
pub const AUTO_LOCK_POLICY_KEY: &str = "session.auto_lock_policy";

/// Preference-store key for the biometric mode token.
pub const BIOMETRIC_MODE_KEY: &str = "unlock.biometric_mode";

/// Preference-store key for the has-launched-before flag.
pub const FIRST_LAUNCH_KEY: &str = "app.has_launched";

// ── Auto-lock policy ────────────────────────────────────────────────────

/// Maximum backgrounded idle time before the session must re-authenticate.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AutoLockPolicy {
    Immediate,
    OneMinute,
    FiveMinutes,
    FifteenMinutes,
    ThirtyMinutes,
    OneHour,
}

impl Default for AutoLockPolicy {
    fn default() -> Self {
        Self::Immediate
    }
}

impl AutoLockPolicy {
    /// All policies, in display order.
    pub fn all() -> &'static [Self] {
        &[
            Self::Immediate,
            Self::OneMinute,
            Self::FiveMinutes,
            Self::FifteenMinutes,
            Self::ThirtyMinutes,
            Self::OneHour,
        ]
    }

    /// The idle window this policy tolerates.
    pub fn duration(&self) -> Duration {
        match self {
            Self::Immediate => Duration::ZERO,
            Self::OneMinute => Duration::from_secs(60),
            Self::FiveMinutes => Duration::from_secs(5 * 60),
            Self::FifteenMinutes => Duration::from_secs(15 * 60),
            Self::ThirtyMinutes => Duration::from_secs(30 * 60),
            Self::OneHour => Duration::from_secs(60 * 60),
        }
    }

    /// Short token persisted in the preference store.
    pub fn as_token(&self) -> &'static str {
        match self {
            Self::Immediate => "immediate",
            Self::OneMinute => "1m",
            Self::FiveMinutes => "5m",
            Self::FifteenMinutes => "15m",
            Self::ThirtyMinutes => "30m",
            Self::OneHour => "1h",
        }
    }

    /// Parse a persisted token. Unknown tokens yield `None` so a corrupt
    /// preference falls back to the default rather than panicking.
    pub fn from_token(token: &str) -> Option<Self> {
        match token {
            "immediate" => Some(Self::Immediate),
            "1m" => Some(Self::OneMinute),
            "5m" => Some(Self::FiveMinutes),
            "15m" => Some(Self::FifteenMinutes),
            "30m" => Some(Self::ThirtyMinutes),
            "1h" => Some(Self::OneHour),
            _ => None,
        }
    }

    /// Human-readable label.
    pub fn label(&self) -> &'static str {
        match self {
            Self::Immediate => "Immediately",
            Self::OneMinute => "After 1 minute",
            Self::FiveMinutes => "After 5 minutes",
            Self::FifteenMinutes => "After 15 minutes",
            Self::ThirtyMinutes => "After 30 minutes",
            Self::OneHour => "After 1 hour",
        }
    }
}

// ── Biometric mode ──────────────────────────────────────────────────────

/// User-selected biometric behavior on the unlock surface.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum BiometricMode {
    /// Never offer biometrics.
    Off,
    /// Offer a button; evaluate only when tapped.
    Manual,
    /// Request evaluation once per unlock presentation.
    Automatic,
}

impl Default for BiometricMode {
    fn default() -> Self {
        Self::Off
    }
}

impl BiometricMode {
    pub fn all() -> &'static [Self] {
        &[Self::Off, Self::Manual, Self::Automatic]
    }

    pub fn is_enabled(&self) -> bool {
        !matches!(self, Self::Off)
    }

    pub fn as_token(&self) -> &'static str {
        match self {
            Self::Off => "off",
            Self::Manual => "manual",
            Self::Automatic => "automatic",
        }
    }

    pub fn from_token(token: &str) -> Option<Self> {
        match token {
            "off" => Some(Self::Off),
            "manual" => Some(Self::Manual),
            "automatic" => Some(Self::Automatic),
            _ => None,
        }
    }

    pub fn label(&self) -> &'static str {
        match self {
            Self::Off => "Off",
            Self::Manual => "On request",
            Self::Automatic => "Automatic",
        }
    }
}

// ── App configuration ───────────────────────────────────────────────────

#[derive(Debug, Clone, Deserialize)]
pub struct AppConfig {
    #[serde(default)]
    pub storage: StorageConfig,
    #[serde(default)]
    pub unlock: UnlockConfig,
}

#[derive(Debug, Clone, Deserialize)]
pub struct StorageConfig {
    #[serde(default = "default_data_dir")]
    pub data_dir: String,
}

fn default_data_dir() -> String {
    "data".into()
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            data_dir: default_data_dir(),
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct UnlockConfig {
    /// Required credential length in characters. Shorter or longer input is
    /// rejected before it reaches the vault.
    #[serde(default = "default_credential_len")]
    pub credential_len: usize,
}

fn default_credential_len() -> usize {
    6
}

impl Default for UnlockConfig {
    fn default() -> Self {
        Self {
            credential_len: default_credential_len(),
        }
    }
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            storage: StorageConfig::default(),
            unlock: UnlockConfig::default(),
        }
    }
}

impl AppConfig {
    /// Load configuration from a TOML file.
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let content =
            std::fs::read_to_string(path).map_err(|e| ConfigError::Io(e.to_string()))?;
        let config: AppConfig =
            toml::from_str(&content).map_err(|e| ConfigError::Parse(e.to_string()))?;
        Ok(config)
    }

    /// Load config with fallback chain: explicit path → ./config/default.toml → hardcoded defaults.
    pub fn load_or_default(explicit_path: Option<&Path>) -> Self {
        if let Some(path) = explicit_path {
            match Self::load(path) {
                Ok(cfg) => return cfg,
                Err(e) => {
                    tracing::warn!("Failed to load config from {}: {e}", path.display());
                }
            }
        }

        let default_path = Path::new("config/default.toml");
        if default_path.exists() {
            match Self::load(default_path) {
                Ok(cfg) => return cfg,
                Err(e) => {
                    tracing::warn!("Failed to load default config: {e}");
                }
            }
        }

        tracing::info!("Using hardcoded default configuration");
        Self::default()
    }
}

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Config I/O error: {0}")]
    Io(String),

    #[error("Config parse error: {0}")]
    Parse(String),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn policy_tokens_roundtrip() {
        for policy in AutoLockPolicy::all() {
            assert_eq!(AutoLockPolicy::from_token(policy.as_token()), Some(*policy));
        }
    }

    #[test]
    fn policy_durations_are_increasing() {
        let all = AutoLockPolicy::all();
        for pair in all.windows(2) {
            assert!(pair[0].duration() < pair[1].duration());
        }
    }

    #[test]
    fn immediate_policy_has_zero_window() {
        assert_eq!(AutoLockPolicy::Immediate.duration(), Duration::ZERO);
    }

    #[test]
    fn unknown_policy_token_is_none() {
        assert_eq!(AutoLockPolicy::from_token("2h"), None);
        assert_eq!(AutoLockPolicy::from_token(""), None);
    }

    #[test]
    fn biometric_tokens_roundtrip() {
        for mode in BiometricMode::all() {
            assert_eq!(BiometricMode::from_token(mode.as_token()), Some(*mode));
        }
    }

    #[test]
    fn biometric_off_is_not_enabled() {
        assert!(!BiometricMode::Off.is_enabled());
        assert!(BiometricMode::Manual.is_enabled());
        assert!(BiometricMode::Automatic.is_enabled());
    }

    #[test]
    fn defaults_fail_closed() {
        assert_eq!(AutoLockPolicy::default(), AutoLockPolicy::Immediate);
        assert_eq!(BiometricMode::default(), BiometricMode::Off);
    }

    #[test]
    fn app_config_defaults() {
        let cfg = AppConfig::default();
        assert_eq!(cfg.storage.data_dir, "data");
        assert_eq!(cfg.unlock.credential_len, 6);
    }

    #[test]
    fn app_config_parses_partial_toml() {
        let cfg: AppConfig = toml::from_str("[unlock]\ncredential_len = 4\n").unwrap();
        assert_eq!(cfg.unlock.credential_len, 4);
        assert_eq!(cfg.storage.data_dir, "data");
    }
}
