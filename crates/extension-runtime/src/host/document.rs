//! # Simulated Documents
//!
//! A page document with nested iframes. Each document owns a window inbox;
//! `post_*` calls deliver into the target window with the source the
//! receiver would observe.

use parking_lot::Mutex;
use shared_types::FrameId;
use std::collections::BTreeMap;
use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::Arc;
use tokio::sync::{mpsc, watch};
use tracing::trace;
use wd_03_runtime_identity::{FrameDocument, IframeHandle, MessageSource};

/// A message as it arrives in a window.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WindowMessage {
    pub source: MessageSource,
    pub data: String,
}

/// Receiving end of a document's window.
pub type WindowReceiver = mpsc::UnboundedReceiver<WindowMessage>;

struct IframeSlot {
    tag: Option<FrameId>,
    window: mpsc::UnboundedSender<WindowMessage>,
    posted: usize,
}

struct ParentLink {
    window: mpsc::UnboundedSender<WindowMessage>,
    /// Our iframe element as the parent sees it.
    handle: IframeHandle,
}

/// In-memory document implementing `FrameDocument`.
pub struct SimDocument {
    window: mpsc::UnboundedSender<WindowMessage>,
    parent: Option<ParentLink>,
    iframes: Mutex<BTreeMap<IframeHandle, IframeSlot>>,
    next_iframe: AtomicU32,
    tagged: watch::Sender<u64>,
}

impl SimDocument {
    /// Top-level document of a tab.
    #[must_use]
    pub fn top() -> (Arc<Self>, WindowReceiver) {
        Self::with_parent(None)
    }

    fn with_parent(parent: Option<ParentLink>) -> (Arc<Self>, WindowReceiver) {
        let (window, receiver) = mpsc::unbounded_channel();
        let (tagged, _) = watch::channel(0);
        let document = Arc::new(Self {
            window,
            parent,
            iframes: Mutex::new(BTreeMap::new()),
            next_iframe: AtomicU32::new(1),
            tagged,
        });
        (document, receiver)
    }

    /// Append an untagged iframe and return its element plus the document
    /// loaded inside it.
    pub fn append_iframe(&self) -> (IframeHandle, Arc<SimDocument>, WindowReceiver) {
        let handle = IframeHandle(self.next_iframe.fetch_add(1, Ordering::Relaxed));
        let (child, receiver) = Self::with_parent(Some(ParentLink {
            window: self.window.clone(),
            handle,
        }));
        self.iframes.lock().insert(
            handle,
            IframeSlot {
                tag: None,
                window: child.window.clone(),
                posted: 0,
            },
        );
        (handle, child, receiver)
    }

    /// Deliver `data` into this document's window as if posted by `source`.
    pub fn deliver(&self, source: MessageSource, data: impl Into<String>) {
        let _ = self.window.send(WindowMessage {
            source,
            data: data.into(),
        });
    }

    /// Element handle of this document in its parent, if framed.
    #[must_use]
    pub fn handle_in_parent(&self) -> Option<IframeHandle> {
        self.parent.as_ref().map(|p| p.handle)
    }

    /// Messages posted into `iframe` so far.
    #[must_use]
    pub fn posted_to(&self, iframe: IframeHandle) -> usize {
        self.iframes.lock().get(&iframe).map_or(0, |slot| slot.posted)
    }

    /// Wait until `iframe` carries a frame id tag.
    ///
    /// Returns `None` if no such iframe exists.
    pub async fn wait_for_tag(&self, iframe: IframeHandle) -> Option<FrameId> {
        let mut updates = self.tagged.subscribe();
        loop {
            let tag = {
                let iframes = self.iframes.lock();
                iframes.get(&iframe)?.tag
            };
            if tag.is_some() {
                return tag;
            }
            if updates.changed().await.is_err() {
                return None;
            }
        }
    }
}

impl FrameDocument for SimDocument {
    fn has_parent(&self) -> bool {
        self.parent.is_some()
    }

    fn iframes(&self) -> Vec<IframeHandle> {
        self.iframes.lock().keys().copied().collect()
    }

    fn frame_tag(&self, iframe: IframeHandle) -> Option<FrameId> {
        self.iframes.lock().get(&iframe).and_then(|slot| slot.tag)
    }

    fn set_frame_tag(&self, iframe: IframeHandle, frame_id: FrameId) {
        if let Some(slot) = self.iframes.lock().get_mut(&iframe) {
            slot.tag = Some(frame_id);
        }
        self.tagged.send_modify(|version| *version += 1);
    }

    fn post_to_iframe(&self, iframe: IframeHandle, message: String) {
        let mut iframes = self.iframes.lock();
        let Some(slot) = iframes.get_mut(&iframe) else {
            trace!(%iframe, "Post to missing iframe dropped");
            return;
        };
        slot.posted += 1;
        let _ = slot.window.send(WindowMessage {
            source: MessageSource::Parent,
            data: message,
        });
    }

    fn post_to_parent(&self, message: String) {
        if let Some(parent) = &self.parent {
            let _ = parent.window.send(WindowMessage {
                source: MessageSource::Iframe(parent.handle),
                data: message,
            });
        }
    }
}

impl std::fmt::Debug for SimDocument {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SimDocument")
            .field("framed", &self.parent.is_some())
            .field("iframes", &self.iframes.lock().len())
            .finish()
    }
}
