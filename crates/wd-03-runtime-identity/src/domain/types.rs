use shared_types::{FrameId, RequestId};
use std::fmt;

/// Opaque reference to an iframe element within one document.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct IframeHandle(pub u32);

impl fmt::Display for IframeHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "iframe#{}", self.0)
    }
}

/// Where a window message came from, as seen by the receiving document.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MessageSource {
    /// The parent window.
    Parent,
    /// The window of one of this document's iframes.
    Iframe(IframeHandle),
    /// Any other window.
    Other,
}

/// What handling one handshake message did.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HandshakeOutcome {
    /// Sent `frame-id/request` to an untagged iframe.
    Requested {
        iframe: IframeHandle,
        request_id: RequestId,
    },
    /// Replied to the parent with this document's frame id.
    Replied { request_id: RequestId },
    /// Parent asked before the own frame id was known; reply queued.
    Deferred { request_id: RequestId },
    /// Tagged an iframe element.
    Tagged {
        iframe: IframeHandle,
        frame_id: FrameId,
    },
    /// Valid message that required nothing (already tagged, already pending,
    /// or not from one of our iframes).
    Ignored,
}
