use crate::config::SyncConfig;
use crate::error::Result;
use clap::Parser;
use std::path::PathBuf;

#[derive(Parser, Debug)]
#[command(name = "primary-route-sync")]
#[command(version)]
#[command(about = "Enable a BIRD protocol only while this node is a Tailscale primary router")]
pub struct Args {
    /// TOML configuration file; flags below override its values
    #[arg(long, short)]
    pub config: Option<PathBuf>,

    /// BIRD control socket path
    #[arg(long)]
    pub socket: Option<PathBuf>,

    /// BIRD protocol name to enable or disable
    #[arg(long)]
    pub protocol: Option<String>,

    /// Seconds between reconciliation ticks
    #[arg(long)]
    pub interval_secs: Option<u64>,

    /// Deadline for the status command, in seconds
    #[arg(long)]
    pub status_timeout_secs: Option<u64>,

    /// Deadline for one control call to BIRD, in seconds
    #[arg(long)]
    pub control_timeout_secs: Option<u64>,

    /// Reconcile once and exit instead of looping
    #[arg(long)]
    pub once: bool,
}

impl Args {
    /// Defaults, then the config file (if any), then flags. The result is
    /// validated.
    ///
    /// An interval given without either timeout flag shrinks the built-in
    /// timeouts to fit it.
    pub fn resolve_config(&self) -> Result<SyncConfig> {
        let mut cfg = match &self.config {
            Some(path) => SyncConfig::load(path)?,
            None => SyncConfig::default(),
        };
        if let Some(socket) = &self.socket {
            cfg.control_socket = socket.clone();
        }
        if let Some(protocol) = &self.protocol {
            cfg.protocol = protocol.clone();
        }
        if let Some(secs) = self.interval_secs {
            cfg.poll_interval_secs = secs;
            if self.status_timeout_secs.is_none() && self.control_timeout_secs.is_none() {
                cfg.fit_default_timeouts();
            }
        }
        if let Some(secs) = self.status_timeout_secs {
            cfg.status_timeout_secs = secs;
        }
        if let Some(secs) = self.control_timeout_secs {
            cfg.control_timeout_secs = secs;
        }
        cfg.validate()?;
        Ok(cfg)
    }
}
