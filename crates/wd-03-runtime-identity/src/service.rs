//! Runtime identity at context startup.

use crate::ports::RuntimeQuery;
use shared_types::{ActionError, RuntimeInfo, Zone};
use tracing::info;

/// Resolve the `RuntimeInfo` of a context starting in `zone`.
///
/// Only content contexts live in a tab; they ask the background once. The
/// result is fixed for the life of the context.
///
/// # Errors
///
/// Whatever the query fails with, typically `Transport` when the background
/// is not up yet.
pub async fn resolve_runtime_info(
    zone: Zone,
    query: &dyn RuntimeQuery,
) -> Result<RuntimeInfo, ActionError> {
    let info = match zone {
        Zone::Background | Zone::Popup => RuntimeInfo::extension_page(),
        Zone::Content => query.query_runtime().await?,
    };
    info!(%zone, tab_id = %info.tab_id, frame_id = %info.frame_id, "Runtime identity resolved");
    Ok(info)
}
