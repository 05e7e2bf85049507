//! # Routing daemon control
//!
//! Thin client for BIRD's control socket (`/run/bird/bird.ctl` by default).
//! Exposes exactly two verbs, `enable <protocol>` and `disable <protocol>`,
//! each issued over a fresh session and bounded by a timeout.
//!
//! ## Usage
//!
//! ```rust,ignore
//! let client = BirdClient::new("/run/bird/bird.ctl", Duration::from_secs(5));
//! client.apply(ControlVerb::Enable, "tailscale").await?;
//! ```

pub mod bird;
pub mod reply;

pub use bird::{
    validate_protocol_name, BirdClient, BirdSession, ControlVerb, RoutingControl,
    CONTROL_OPERATION,
};
pub use reply::{Reply, ReplyLine};
