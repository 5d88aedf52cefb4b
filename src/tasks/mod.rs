//! Background scheduled tasks for the application.
//!
//! Currently only the partner diamond feed refresh runs here.
//! Call `spawn_all` once during startup to launch them.

use crate::config::SyncConfig;
use crate::error::AppError;
use crate::models::DiamondSource;
use crate::services::DiamondSyncService;
use std::time::Duration;

/// Spawn all background tasks.
///
/// The sync loop detaches via `tokio::spawn`; it does not block.
pub fn spawn_all(diamond_sync_service: DiamondSyncService, sync_config: SyncConfig) {
    if !sync_config.enabled {
        log::info!("Scheduled diamond sync is disabled");
        return;
    }

    // 合作方钻石数据定时全量同步
    let interval = Duration::from_secs(sync_config.interval_secs.max(60));
    tokio::spawn(async move {
        loop {
            for source in DiamondSource::ALL {
                match diamond_sync_service.sync(source).await {
                    Ok(outcome) => log::info!(
                        "Scheduled {source} sync: {} processed, {} marked unavailable",
                        outcome.processed,
                        outcome.marked_unavailable
                    ),
                    // 手动同步进行中，等下一轮
                    Err(AppError::Conflict(msg)) => log::info!("Skipping {source} sync: {msg}"),
                    Err(e) => log::error!("Scheduled {source} sync failed: {e:?}"),
                }
            }
            tokio::time::sleep(interval).await;
        }
    });
}
