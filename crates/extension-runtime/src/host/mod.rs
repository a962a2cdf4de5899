//! # Simulated Browser Host
//!
//! Runs every zone of the extension in one process: documents and iframes
//! for content scripts, one bus standing in for the runtime messaging API.

pub mod document;
pub mod extension;

pub use document::{SimDocument, WindowMessage, WindowReceiver};
pub use extension::{ContextHandle, ExtensionHost, FrameContext, HostBuilder, HostError, IframeLoad};
