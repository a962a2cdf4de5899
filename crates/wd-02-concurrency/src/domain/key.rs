//! Queue identity.

use shared_types::{ActionId, ConcurrencyKey};
use std::fmt;

/// Resolved key of one gate queue.
///
/// A numeric `ConcurrencyKey` scopes the queue to the declaring action; a
/// string key names a queue shared by every action that declares it. The two
/// namespaces never collide, even if an action id equals a shared key name.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum GateKey {
    Action(ActionId),
    Shared(String),
}

impl GateKey {
    /// Resolve the queue an action's declared key maps to.
    #[must_use]
    pub fn resolve(action_id: &ActionId, key: &ConcurrencyKey) -> Self {
        match key {
            ConcurrencyKey::PerAction(_) => Self::Action(action_id.clone()),
            ConcurrencyKey::Shared(name) => Self::Shared(name.clone()),
        }
    }
}

impl fmt::Display for GateKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Action(id) => write!(f, "action:{id}"),
            Self::Shared(name) => write!(f, "shared:{name}"),
        }
    }
}
