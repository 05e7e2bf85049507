//! # primary-route-sync
//!
//! Keeps a BIRD protocol enabled exactly while this node is a Tailscale
//! primary router.
//!
//! - [`status`] polls `tailscale status --json --self` and reduces it to a
//!   [`LivenessSignal`].
//! - [`control`] talks to BIRD's control socket.
//! - [`reconciler`] is the state machine tying the two together on a timer.

pub mod cli;
pub mod config;
pub mod control;
pub mod error;
pub mod reconciler;
pub mod status;
pub mod telemetry;

pub use config::SyncConfig;
pub use control::{BirdClient, ControlVerb, RoutingControl};
pub use error::{Result, SyncError};
pub use reconciler::{decide, Reconciler, ReconcilerConfig, ReconcilerState, TickOutcome};
pub use status::{CommandStatusOracle, LivenessSignal, StatusOracle};
