use chrono::Utc;

use crate::store::Store;

/// Purges message ids older than the dedup retention window.
pub async fn run(store: &Store) {
    tracing::debug!("message_id_cleanup: start");
    match store.purge_message_ids(Utc::now().timestamp()) {
        Ok(0) => {}
        Ok(count) => tracing::info!(cleaned = count, "message_id_cleanup: done"),
        Err(e) => tracing::error!(error=%e, "message_id_cleanup failed"),
    }
}
