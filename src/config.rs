//! Runtime configuration.
//!
//! Built-in defaults, optionally overridden by a TOML file, optionally
//! overridden again by command-line flags (see [`crate::cli`]).
//!
//! ```toml
//! status_command = ["tailscale", "status", "--json", "--self"]
//! status_timeout_secs = 10
//! control_socket = "/run/bird/bird.ctl"
//! control_timeout_secs = 5
//! protocol = "tailscale"
//! poll_interval_secs = 15
//! # max_consecutive_control_failures = 20
//! ```

use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::Deserialize;

use crate::control::validate_protocol_name;
use crate::error::{Result, SyncError};
use crate::reconciler::ReconcilerConfig;

pub const DEFAULT_CONTROL_SOCKET: &str = "/run/bird/bird.ctl";
pub const DEFAULT_PROTOCOL: &str = "tailscale";
pub const DEFAULT_POLL_INTERVAL_SECS: u64 = 15;
pub const DEFAULT_STATUS_TIMEOUT_SECS: u64 = 10;
pub const DEFAULT_CONTROL_TIMEOUT_SECS: u64 = 5;

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct SyncConfig {
    /// Program and arguments producing the JSON status document.
    pub status_command: Vec<String>,
    pub status_timeout_secs: u64,
    /// BIRD control socket.
    pub control_socket: PathBuf,
    /// Deadline for one complete control call.
    pub control_timeout_secs: u64,
    /// BIRD protocol to enable or disable.
    pub protocol: String,
    pub poll_interval_secs: u64,
    /// Exit after this many control failures in a row. Unset: never exit.
    pub max_consecutive_control_failures: Option<u32>,
}

impl Default for SyncConfig {
    fn default() -> Self {
        Self {
            status_command: ["tailscale", "status", "--json", "--self"]
                .iter()
                .map(|s| s.to_string())
                .collect(),
            status_timeout_secs: DEFAULT_STATUS_TIMEOUT_SECS,
            control_socket: PathBuf::from(DEFAULT_CONTROL_SOCKET),
            control_timeout_secs: DEFAULT_CONTROL_TIMEOUT_SECS,
            protocol: DEFAULT_PROTOCOL.to_string(),
            poll_interval_secs: DEFAULT_POLL_INTERVAL_SECS,
            max_consecutive_control_failures: None,
        }
    }
}

impl SyncConfig {
    pub fn from_toml_str(raw: &str) -> Result<Self> {
        toml::from_str(raw).map_err(|e| SyncError::Config(e.to_string()))
    }

    /// Read and parse a TOML file. Missing keys take their defaults.
    pub fn load(path: &Path) -> Result<Self> {
        let raw = std::fs::read_to_string(path)
            .map_err(|e| SyncError::Config(format!("{}: {e}", path.display())))?;
        Self::from_toml_str(&raw)
    }

    /// Shrink the built-in timeouts to fit a poll interval shorter than their
    /// sum, keeping the 2:1 status/control split. Timeouts that were set
    /// explicitly are left alone, and so is an interval too short to split.
    pub fn fit_default_timeouts(&mut self) {
        let defaults = self.status_timeout_secs == DEFAULT_STATUS_TIMEOUT_SECS
            && self.control_timeout_secs == DEFAULT_CONTROL_TIMEOUT_SECS;
        let interval = self.poll_interval_secs;
        let fits = DEFAULT_STATUS_TIMEOUT_SECS + DEFAULT_CONTROL_TIMEOUT_SECS <= interval;
        if !defaults || fits || interval < 2 {
            return;
        }
        self.status_timeout_secs = (interval * 2 / 3).max(1);
        self.control_timeout_secs = interval - self.status_timeout_secs;
    }

    /// Reject settings the loop cannot run with.
    ///
    /// Both external calls together must fit inside one poll interval so a
    /// slow dependency never delays the following tick.
    pub fn validate(&self) -> Result<()> {
        if self.status_command.is_empty() {
            return Err(SyncError::Config("status_command is empty".into()));
        }
        validate_protocol_name(&self.protocol)?;
        if self.poll_interval_secs == 0 {
            return Err(SyncError::Config("poll_interval_secs must be positive".into()));
        }
        if self.status_timeout_secs == 0 || self.control_timeout_secs == 0 {
            return Err(SyncError::Config("timeouts must be positive".into()));
        }
        if self.status_timeout_secs + self.control_timeout_secs > self.poll_interval_secs {
            return Err(SyncError::Config(format!(
                "status_timeout_secs ({}) + control_timeout_secs ({}) exceeds poll_interval_secs ({})",
                self.status_timeout_secs, self.control_timeout_secs, self.poll_interval_secs
            )));
        }
        if self.max_consecutive_control_failures == Some(0) {
            return Err(SyncError::Config(
                "max_consecutive_control_failures must be at least 1".into(),
            ));
        }
        Ok(())
    }

    pub fn status_timeout(&self) -> Duration {
        Duration::from_secs(self.status_timeout_secs)
    }

    pub fn control_timeout(&self) -> Duration {
        Duration::from_secs(self.control_timeout_secs)
    }

    pub fn reconciler_config(&self) -> ReconcilerConfig {
        ReconcilerConfig {
            protocol: self.protocol.clone(),
            poll_interval: Duration::from_secs(self.poll_interval_secs),
            max_consecutive_control_failures: self.max_consecutive_control_failures,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn defaults_match_bird_and_tailscale() {
        let cfg = SyncConfig::default();
        assert_eq!(cfg.control_socket, PathBuf::from("/run/bird/bird.ctl"));
        assert_eq!(cfg.protocol, "tailscale");
        assert_eq!(cfg.poll_interval_secs, 15);
        assert_eq!(
            cfg.status_command,
            vec!["tailscale", "status", "--json", "--self"]
        );
        assert!(cfg.validate().is_ok());
    }

    #[test]
    fn empty_toml_is_defaults() {
        assert_eq!(SyncConfig::from_toml_str("").unwrap(), SyncConfig::default());
    }

    #[test]
    fn partial_toml_keeps_other_defaults() {
        let cfg = SyncConfig::from_toml_str(
            r#"
            protocol = "mesh_static"
            poll_interval_secs = 30
            "#,
        )
        .unwrap();
        assert_eq!(cfg.protocol, "mesh_static");
        assert_eq!(cfg.poll_interval_secs, 30);
        assert_eq!(cfg.control_socket, PathBuf::from(DEFAULT_CONTROL_SOCKET));
    }

    #[test]
    fn unknown_key_is_rejected() {
        let err = SyncConfig::from_toml_str("poll_intervall = 3").unwrap_err();
        assert!(matches!(err, SyncError::Config(_)));
    }

    #[test]
    fn load_reads_file() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "control_socket = \"/tmp/bird.ctl\"").unwrap();
        writeln!(file, "max_consecutive_control_failures = 12").unwrap();
        let cfg = SyncConfig::load(file.path()).unwrap();
        assert_eq!(cfg.control_socket, PathBuf::from("/tmp/bird.ctl"));
        assert_eq!(cfg.max_consecutive_control_failures, Some(12));
    }

    #[test]
    fn load_missing_file_is_config_error() {
        let dir = tempfile::tempdir().unwrap();
        let err = SyncConfig::load(&dir.path().join("absent.toml")).unwrap_err();
        assert!(matches!(err, SyncError::Config(ref m) if m.contains("absent.toml")));
    }

    #[test]
    fn timeouts_must_fit_in_interval() {
        let cfg = SyncConfig {
            poll_interval_secs: 10,
            status_timeout_secs: 8,
            control_timeout_secs: DEFAULT_CONTROL_TIMEOUT_SECS,
            ..SyncConfig::default()
        };
        assert!(matches!(cfg.validate(), Err(SyncError::Config(_))));
    }

    #[test]
    fn fit_default_timeouts_shrinks_to_interval() {
        let mut cfg = SyncConfig {
            poll_interval_secs: 10,
            ..SyncConfig::default()
        };
        cfg.fit_default_timeouts();
        assert_eq!(cfg.status_timeout_secs, 6);
        assert_eq!(cfg.control_timeout_secs, 4);
        assert!(cfg.validate().is_ok());

        let mut tight = SyncConfig {
            poll_interval_secs: 2,
            ..SyncConfig::default()
        };
        tight.fit_default_timeouts();
        assert_eq!((tight.status_timeout_secs, tight.control_timeout_secs), (1, 1));
        assert!(tight.validate().is_ok());
    }

    #[test]
    fn fit_default_timeouts_keeps_explicit_or_fitting_values() {
        let mut explicit = SyncConfig {
            poll_interval_secs: 10,
            status_timeout_secs: 8,
            ..SyncConfig::default()
        };
        explicit.fit_default_timeouts();
        assert_eq!(explicit.status_timeout_secs, 8);
        assert_eq!(explicit.control_timeout_secs, DEFAULT_CONTROL_TIMEOUT_SECS);

        let mut roomy = SyncConfig {
            poll_interval_secs: 60,
            ..SyncConfig::default()
        };
        roomy.fit_default_timeouts();
        assert_eq!(roomy.status_timeout_secs, DEFAULT_STATUS_TIMEOUT_SECS);
    }

    #[test]
    fn zero_interval_is_rejected() {
        let cfg = SyncConfig {
            poll_interval_secs: 0,
            ..SyncConfig::default()
        };
        assert!(cfg.validate().is_err());
    }

    #[test]
    fn bad_protocol_name_is_rejected() {
        let cfg = SyncConfig {
            protocol: "tailscale\nrestart all".into(),
            ..SyncConfig::default()
        };
        assert!(matches!(
            cfg.validate(),
            Err(SyncError::InvalidProtocolName(_))
        ));
    }

    #[test]
    fn zero_failure_limit_is_rejected() {
        let cfg = SyncConfig {
            max_consecutive_control_failures: Some(0),
            ..SyncConfig::default()
        };
        assert!(cfg.validate().is_err());
    }

    #[test]
    fn reconciler_config_carries_fields() {
        let cfg = SyncConfig {
            protocol: "ts".into(),
            poll_interval_secs: 20,
            max_consecutive_control_failures: Some(4),
            ..SyncConfig::default()
        };
        let rc = cfg.reconciler_config();
        assert_eq!(rc.protocol, "ts");
        assert_eq!(rc.poll_interval, Duration::from_secs(20));
        assert_eq!(rc.max_consecutive_control_failures, Some(4));
    }
}
