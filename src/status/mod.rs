//! # Status oracle
//!
//! Answers one question per tick: is this node currently a primary router
//! for the mesh?
//!
//! 1. **Execution** ([`oracle`]) runs the status command with a deadline and
//!    captures stdout. Spawn failures, non-zero exits and timeouts are errors.
//! 2. **Parsing** ([`document`]) reads stdout as a JSON object and reports
//!    whether `Self.PrimaryRoutes` is present. Malformed JSON is an error;
//!    a well-formed document with a different shape is simply "not primary".

pub mod document;
pub mod oracle;

pub use document::{LivenessSignal, SelfField, StatusDocument, PRIMARY_ROUTES_KEY, SELF_KEY};
pub use oracle::{CommandStatusOracle, StatusOracle, STATUS_OPERATION};
