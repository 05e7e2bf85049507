//! Narrow model of the `tailscale status --json` document.
//!
//! Only one thing is read from the document: whether the top-level `Self`
//! object carries a `PrimaryRoutes` key. The key's value is never inspected;
//! tailscale omits the key entirely when the node is not a primary router.

use serde_json::{Map, Value};

use crate::error::Result;

/// Top-level key holding this node's own peer record.
pub const SELF_KEY: &str = "Self";

/// Key inside [`SELF_KEY`] whose presence marks a primary router.
pub const PRIMARY_ROUTES_KEY: &str = "PrimaryRoutes";

/// Liveness derived from one poll of the status oracle.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LivenessSignal {
    /// The node currently advertises primary routes into the mesh.
    Primary,
    /// The node does not, or its status could not be determined.
    NotPrimary,
}

impl From<bool> for LivenessSignal {
    fn from(primary: bool) -> Self {
        if primary {
            LivenessSignal::Primary
        } else {
            LivenessSignal::NotPrimary
        }
    }
}

impl std::fmt::Display for LivenessSignal {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            LivenessSignal::Primary    => write!(f, "primary"),
            LivenessSignal::NotPrimary => write!(f, "not-primary"),
        }
    }
}

/// What was found under the `Self` key.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SelfField {
    /// No `Self` key at the top level.
    Absent,
    /// `Self` is present but is not an object (null, string, array...).
    NotAnObject,
    /// `Self` is an object; records whether `PrimaryRoutes` is among its keys.
    Object { primary_routes: bool },
}

/// The subset of the status document this crate consumes.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StatusDocument {
    pub self_field: SelfField,
}

impl StatusDocument {
    /// Parse raw status output.
    ///
    /// # Errors
    /// [`SyncError::Parse`](crate::error::SyncError::Parse) when the payload
    /// is not valid JSON or its top level is not an object. A well-formed
    /// object with the wrong shape underneath is *not* an error; it simply
    /// yields [`LivenessSignal::NotPrimary`].
    pub fn parse(payload: &[u8]) -> Result<Self> {
        let root: Map<String, Value> = serde_json::from_slice(payload)?;
        Ok(Self::from_root(&root))
    }

    fn from_root(root: &Map<String, Value>) -> Self {
        let self_field = match root.get(SELF_KEY) {
            None => SelfField::Absent,
            Some(Value::Object(node)) => SelfField::Object {
                primary_routes: node.contains_key(PRIMARY_ROUTES_KEY),
            },
            Some(_) => SelfField::NotAnObject,
        };
        Self { self_field }
    }

    /// Presence of `Self.PrimaryRoutes`, regardless of its value.
    pub fn liveness(&self) -> LivenessSignal {
        match self.self_field {
            SelfField::Object { primary_routes } => primary_routes.into(),
            SelfField::Absent | SelfField::NotAnObject => LivenessSignal::NotPrimary,
        }
    }
}
