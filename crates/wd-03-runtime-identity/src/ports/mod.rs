//! # Ports - Runtime Identity
//!
//! The resolver never touches a real document or messaging API; hosts adapt
//! them to these traits.

use crate::domain::IframeHandle;
use async_trait::async_trait;
use shared_types::{ActionError, FrameId, RuntimeInfo};

/// Asks the background context who the calling context is.
#[async_trait]
pub trait RuntimeQuery: Send + Sync {
    async fn query_runtime(&self) -> Result<RuntimeInfo, ActionError>;
}

/// The slice of a document the handshake needs.
pub trait FrameDocument: Send + Sync {
    /// Whether this document is framed (has a parent window).
    fn has_parent(&self) -> bool;

    /// Iframe elements currently in this document.
    fn iframes(&self) -> Vec<IframeHandle>;

    /// Frame id previously tagged onto `iframe`.
    fn frame_tag(&self, iframe: IframeHandle) -> Option<FrameId>;

    /// Record `frame_id` on the `iframe` element.
    fn set_frame_tag(&self, iframe: IframeHandle, frame_id: FrameId);

    /// Post a raw message into `iframe`'s window.
    fn post_to_iframe(&self, iframe: IframeHandle, message: String);

    /// Post a raw message to the parent window. No-op for top documents.
    fn post_to_parent(&self, message: String);
}
