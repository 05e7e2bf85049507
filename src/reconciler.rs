//! # Reconciliation loop
//!
//! Keeps the routing daemon's protocol state in line with the status oracle:
//!
//! ```text
//!  StatusOracle::poll ──► LivenessSignal ──► decide(state, signal) ──► RoutingControl::apply
//!                                                 ▲                              │
//!                                                 └──── state updated on Ok ─────┘
//! ```
//!
//! ## Guarantees
//! - `state` only ever records a control call that succeeded. A failed call
//!   leaves it untouched, so the next tick retries the same transition.
//! - A status failure is treated as [`LivenessSignal::NotPrimary`]: a primary
//!   router claim is never kept enabled on a status we could not read.
//! - No redundant calls: once a state is applied, matching signals are no-ops.
//! - Ticks never overlap, and shutdown is only observed between ticks, so a
//!   control call in flight always runs to completion or its timeout.
//!
//! ## Known limitation
//! A signal flapping faster than the poll interval produces one control call
//! per tick. There is no hysteresis beyond the interval itself.

use std::process::ExitCode;
use std::time::Duration;

use tokio::sync::watch;
use tokio::time::{interval, MissedTickBehavior};
use tracing::{debug, error, info, warn};

use crate::control::{ControlVerb, RoutingControl};
use crate::error::{Result, SyncError};
use crate::status::{LivenessSignal, StatusOracle};

/// Consecutive failures after which log lines escalate from `warn` to `error`.
pub const FAILURE_ESCALATION_THRESHOLD: u32 = 5;

/// What the loop believes the daemon's protocol state to be.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ReconcilerState {
    /// Nothing applied yet this process lifetime. Never re-entered.
    #[default]
    Unknown,
    /// The last successful call was `enable`.
    Enabled,
    /// The last successful call was `disable`.
    Disabled,
}

impl ReconcilerState {
    /// State reached once `verb` has been applied successfully.
    pub fn after(verb: ControlVerb) -> Self {
        match verb {
            ControlVerb::Enable  => ReconcilerState::Enabled,
            ControlVerb::Disable => ReconcilerState::Disabled,
        }
    }
}

impl std::fmt::Display for ReconcilerState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ReconcilerState::Unknown  => write!(f, "unknown"),
            ReconcilerState::Enabled  => write!(f, "enabled"),
            ReconcilerState::Disabled => write!(f, "disabled"),
        }
    }
}

/// The transition needed to bring `state` in line with `signal`, if any.
pub fn decide(state: ReconcilerState, signal: LivenessSignal) -> Option<ControlVerb> {
    match (signal, state) {
        (LivenessSignal::Primary, ReconcilerState::Enabled) => None,
        (LivenessSignal::Primary, _) => Some(ControlVerb::Enable),
        (LivenessSignal::NotPrimary, ReconcilerState::Disabled) => None,
        (LivenessSignal::NotPrimary, _) => Some(ControlVerb::Disable),
    }
}

/// Loop settings.
#[derive(Debug, Clone)]
pub struct ReconcilerConfig {
    /// Protocol name passed to every control call.
    pub protocol: String,
    /// Time between ticks.
    pub poll_interval: Duration,
    /// When set, [`Reconciler::run`] returns an error after this many
    /// consecutive control failures so a supervisor can restart the process.
    pub max_consecutive_control_failures: Option<u32>,
}

impl ReconcilerConfig {
    /// Defaults: 15 s interval, no failure limit.
    pub fn new(protocol: impl Into<String>) -> Self {
        Self {
            protocol: protocol.into(),
            poll_interval: Duration::from_secs(15),
            max_consecutive_control_failures: None,
        }
    }
}

/// Everything one tick observed and did.
#[derive(Debug)]
pub struct TickOutcome {
    /// Signal acted on (after the fail-safe mapping of poll errors).
    pub signal: LivenessSignal,
    /// Why the poll failed, when it did.
    pub poll_error: Option<SyncError>,
    /// Verb attempted this tick, if a transition was needed.
    pub action: Option<ControlVerb>,
    /// Why the verb failed, when it did.
    pub control_error: Option<SyncError>,
    /// State after the tick.
    pub state: ReconcilerState,
}

impl TickOutcome {
    /// True when a transition was attempted and applied.
    pub fn transitioned(&self) -> bool {
        self.action.is_some() && self.control_error.is_none()
    }

    /// True unless a control call failed. A poll failure whose fail-safe
    /// disable was applied still counts as success.
    pub fn succeeded(&self) -> bool {
        self.control_error.is_none()
    }

    /// Process exit status for a single-shot run.
    pub fn exit_code(&self) -> ExitCode {
        if self.succeeded() {
            ExitCode::SUCCESS
        } else {
            ExitCode::FAILURE
        }
    }
}

/// The reconciliation state machine plus its collaborators.
pub struct Reconciler<O, C> {
    config: ReconcilerConfig,
    oracle: O,
    control: C,
    state: ReconcilerState,
    consecutive_poll_failures: u32,
    consecutive_control_failures: u32,
}

impl<O: StatusOracle, C: RoutingControl> Reconciler<O, C> {
    /// Start in [`ReconcilerState::Unknown`].
    pub fn new(config: ReconcilerConfig, oracle: O, control: C) -> Self {
        Self {
            config,
            oracle,
            control,
            state: ReconcilerState::Unknown,
            consecutive_poll_failures: 0,
            consecutive_control_failures: 0,
        }
    }

    pub fn state(&self) -> ReconcilerState {
        self.state
    }

    pub fn consecutive_poll_failures(&self) -> u32 {
        self.consecutive_poll_failures
    }

    pub fn consecutive_control_failures(&self) -> u32 {
        self.consecutive_control_failures
    }

    /// Run one poll → decide → apply cycle.
    ///
    /// Never fails: errors are logged and returned inside the outcome.
    pub async fn tick(&mut self) -> TickOutcome {
        let (signal, poll_error) = match self.oracle.poll().await {
            Ok(signal) => {
                self.consecutive_poll_failures = 0;
                (signal, None)
            }
            Err(e) => {
                self.consecutive_poll_failures = self.consecutive_poll_failures.saturating_add(1);
                if self.consecutive_poll_failures >= FAILURE_ESCALATION_THRESHOLD {
                    error!(
                        error = %e,
                        kind = e.kind(),
                        consecutive_failures = self.consecutive_poll_failures,
                        "status poll failed repeatedly, treating node as not primary"
                    );
                } else {
                    warn!(
                        error = %e,
                        kind = e.kind(),
                        "status poll failed, treating node as not primary"
                    );
                }
                (LivenessSignal::NotPrimary, Some(e))
            }
        };

        let Some(verb) = decide(self.state, signal) else {
            debug!(state = %self.state, signal = %signal, "protocol already reconciled");
            return TickOutcome {
                signal,
                poll_error,
                action: None,
                control_error: None,
                state: self.state,
            };
        };

        let protocol = self.config.protocol.as_str();
        let control_error = match self.control.apply(verb, protocol).await {
            Ok(()) => {
                let previous = self.state;
                self.state = ReconcilerState::after(verb);
                self.consecutive_control_failures = 0;
                info!(
                    protocol,
                    from = %previous,
                    to = %self.state,
                    signal = %signal,
                    "protocol state changed"
                );
                None
            }
            Err(e) => {
                self.consecutive_control_failures =
                    self.consecutive_control_failures.saturating_add(1);
                if self.consecutive_control_failures >= FAILURE_ESCALATION_THRESHOLD {
                    error!(
                        error = %e,
                        kind = e.kind(),
                        protocol,
                        verb = %verb,
                        state = %self.state,
                        consecutive_failures = self.consecutive_control_failures,
                        "control call failed repeatedly, will retry next tick"
                    );
                } else {
                    warn!(
                        error = %e,
                        kind = e.kind(),
                        protocol,
                        verb = %verb,
                        state = %self.state,
                        "control call failed, will retry next tick"
                    );
                }
                Some(e)
            }
        };

        TickOutcome {
            signal,
            poll_error,
            action: Some(verb),
            control_error,
            state: self.state,
        }
    }

    /// Tick every `poll_interval` until `shutdown` turns `true` (or its
    /// sender is dropped). Returns the final state.
    ///
    /// # Errors
    /// [`SyncError::ControlFailuresExceeded`] only when
    /// `max_consecutive_control_failures` is configured and reached.
    pub async fn run(mut self, mut shutdown: watch::Receiver<bool>) -> Result<ReconcilerState> {
        let mut ticker = interval(self.config.poll_interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

        info!(
            protocol = %self.config.protocol,
            interval = ?self.config.poll_interval,
            "reconciliation loop started"
        );

        loop {
            tokio::select! {
                biased;
                _ = shutdown_requested(&mut shutdown) => break,
                _ = ticker.tick() => {}
            }

            let outcome = self.tick().await;

            if let (Some(limit), Some(last)) = (
                self.config.max_consecutive_control_failures,
                outcome.control_error,
            ) {
                if self.consecutive_control_failures >= limit {
                    error!(
                        limit,
                        protocol = %self.config.protocol,
                        "control failure limit reached, stopping loop"
                    );
                    return Err(SyncError::ControlFailuresExceeded {
                        count: self.consecutive_control_failures,
                        last: Box::new(last),
                    });
                }
            }
        }

        info!(state = %self.state, "reconciliation loop stopped");
        Ok(self.state)
    }
}

async fn shutdown_requested(rx: &mut watch::Receiver<bool>) {
    // A dropped sender counts as a shutdown request.
    let _ = rx.wait_for(|&stop| stop).await;
}
