//! # Core Identity Entities
//!
//! Identifiers shared by every execution zone.
//!
//! ## Clusters
//!
//! - **Actions**: `ActionId`, `Zone`, `ConcurrencyKey`
//! - **Runtime identity**: `TabId`, `FrameId`, `RuntimeInfo`, `Address`
//! - **Correlation**: `CorrelationId`, `RequestId`

use serde::{Deserialize, Serialize};
use std::fmt;
use uuid::Uuid;

// =============================================================================
// ACTIONS
// =============================================================================

/// Execution zone an action is declared to run in.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Zone {
    /// Per-frame content script.
    Content,
    /// Background service worker. Exactly one per extension.
    Background,
    /// Extension popup page. At most one open at a time.
    Popup,
}

impl Zone {
    /// Stable lowercase name used in logs and metric labels.
    #[must_use]
    pub fn name(&self) -> &'static str {
        match self {
            Self::Content => "content",
            Self::Background => "background",
            Self::Popup => "popup",
        }
    }

    /// Whether a zone has exactly one owner, so calls can be routed without a target.
    #[must_use]
    pub fn is_singleton(&self) -> bool {
        !matches!(self, Self::Content)
    }
}

impl fmt::Display for Zone {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Globally unique action identifier.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ActionId(String);

impl ActionId {
    /// Create an action id.
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    /// Borrow the id as a string slice.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for ActionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for ActionId {
    fn from(id: &str) -> Self {
        Self::new(id)
    }
}

impl From<String> for ActionId {
    fn from(id: String) -> Self {
        Self(id)
    }
}

/// Serialization contract for an action.
///
/// - `PerAction(n)` is an implicit key scoped to the declaring action's id that
///   admits at most `n` concurrent executions of that action.
/// - `Shared(name)` is an explicit key shared by every action that names it; at
///   most one execution across all of them is in flight.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum ConcurrencyKey {
    PerAction(usize),
    Shared(String),
}

impl ConcurrencyKey {
    /// Implicit per-action key with capacity one.
    #[must_use]
    pub fn exclusive() -> Self {
        Self::PerAction(1)
    }

    /// Explicit key shared across action ids.
    pub fn shared(name: impl Into<String>) -> Self {
        Self::Shared(name.into())
    }

    /// Number of executions the key admits at once. Zero is treated as one.
    #[must_use]
    pub fn capacity(&self) -> usize {
        match self {
            Self::PerAction(n) => (*n).max(1),
            Self::Shared(_) => 1,
        }
    }
}

impl From<usize> for ConcurrencyKey {
    fn from(n: usize) -> Self {
        Self::PerAction(n)
    }
}

impl From<&str> for ConcurrencyKey {
    fn from(name: &str) -> Self {
        Self::shared(name)
    }
}

// =============================================================================
// RUNTIME IDENTITY
// =============================================================================

/// Browser tab identifier.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct TabId(pub i32);

impl TabId {
    /// Contexts that do not live in a tab (background, popup).
    pub const NONE: TabId = TabId(-1);
}

impl fmt::Display for TabId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Document frame identifier within a tab.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct FrameId(pub u32);

impl FrameId {
    /// The top-level document of a tab.
    pub const TOP: FrameId = FrameId(0);

    #[must_use]
    pub fn is_top(&self) -> bool {
        *self == Self::TOP
    }
}

impl fmt::Display for FrameId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// The (tab, frame) pair identifying an execution context.
///
/// Resolved once at context startup and immutable afterwards.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct RuntimeInfo {
    #[serde(rename = "tabID")]
    pub tab_id: TabId,
    #[serde(rename = "frameID")]
    pub frame_id: FrameId,
}

impl RuntimeInfo {
    #[must_use]
    pub fn new(tab_id: TabId, frame_id: FrameId) -> Self {
        Self { tab_id, frame_id }
    }

    /// Identity of contexts that are not attached to a tab.
    #[must_use]
    pub fn extension_page() -> Self {
        Self::new(TabId::NONE, FrameId::TOP)
    }

    /// Whether data scoped to `other` belongs to this context.
    #[must_use]
    pub fn owns(&self, other: &RuntimeInfo) -> bool {
        self == other
    }
}

impl fmt::Display for RuntimeInfo {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "tab={} frame={}", self.tab_id, self.frame_id)
    }
}

/// Routable address of an execution context on the message bus.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Address {
    pub zone: Zone,
    pub runtime: RuntimeInfo,
}

impl Address {
    #[must_use]
    pub fn background() -> Self {
        Self {
            zone: Zone::Background,
            runtime: RuntimeInfo::extension_page(),
        }
    }

    #[must_use]
    pub fn popup() -> Self {
        Self {
            zone: Zone::Popup,
            runtime: RuntimeInfo::extension_page(),
        }
    }

    #[must_use]
    pub fn content(runtime: RuntimeInfo) -> Self {
        Self {
            zone: Zone::Content,
            runtime,
        }
    }

    /// Address of the single owner of a singleton zone.
    #[must_use]
    pub fn singleton(zone: Zone) -> Option<Self> {
        match zone {
            Zone::Background => Some(Self::background()),
            Zone::Popup => Some(Self::popup()),
            Zone::Content => None,
        }
    }
}

impl fmt::Display for Address {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.zone {
            Zone::Content => write!(f, "content({})", self.runtime),
            zone => f.write_str(zone.name()),
        }
    }
}

// =============================================================================
// CORRELATION
// =============================================================================

/// Correlates a cross-zone request with its reply.
///
/// Uses UUID v7 so ids sort by creation time in logs.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct CorrelationId(Uuid);

impl CorrelationId {
    #[must_use]
    pub fn new() -> Self {
        Self(Uuid::now_v7())
    }

    pub fn parse(s: &str) -> Result<Self, uuid::Error> {
        Uuid::parse_str(s).map(Self)
    }

    #[must_use]
    pub fn as_uuid(&self) -> &Uuid {
        &self.0
    }
}

impl Default for CorrelationId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for CorrelationId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Correlates a frame handshake request with its result.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct RequestId(Uuid);

impl RequestId {
    #[must_use]
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }
}

impl Default for RequestId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for RequestId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}
