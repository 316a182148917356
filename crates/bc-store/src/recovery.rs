//! Standalone stuck-lease sweep, usable independently of the worker's own
//! per-iteration sweep (e.g. from an admin task or a separate process).

use crate::repository::PublicationRepository;
use std::sync::Arc;
use std::time::Duration;
use tokio::time::{interval, MissedTickBehavior};
use tracing::{debug, error, info};

#[derive(Debug, Clone)]
pub struct RecoveryConfig {
    pub check_interval: Duration,
    pub processing_ttl_seconds: i64,
    pub max_attempts: i32,
    pub enabled: bool,
}

impl Default for RecoveryConfig {
    fn default() -> Self {
        Self {
            check_interval: Duration::from_secs(60),
            processing_ttl_seconds: bc_common::DEFAULT_PROCESSING_TTL_SECONDS,
            max_attempts: bc_common::DEFAULT_MAX_ATTEMPTS,
            enabled: true,
        }
    }
}

pub struct RecoveryTask {
    repository: Arc<dyn PublicationRepository>,
    config: RecoveryConfig,
}

impl RecoveryTask {
    pub fn new(repository: Arc<dyn PublicationRepository>, config: RecoveryConfig) -> Self {
        Self { repository, config }
    }

    pub async fn run(&self) {
        if !self.config.enabled {
            info!("publication lease recovery task is disabled");
            return;
        }

        info!(
            interval = ?self.config.check_interval,
            ttl_seconds = self.config.processing_ttl_seconds,
            "starting publication lease recovery task"
        );

        let mut ticker = interval(self.config.check_interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);

        loop {
            ticker.tick().await;
            self.recover_once().await;
        }
    }

    pub async fn recover_once(&self) {
        debug!("checking for stuck publication leases");
        match self
            .repository
            .recover_stuck_leases(self.config.processing_ttl_seconds, self.config.max_attempts)
            .await
        {
            Ok(count) => {
                if count > 0 {
                    info!(count, "recovered stuck publication leases");
                }
            }
            Err(e) => {
                error!(error = %e, "failed to recover stuck publication leases");
            }
        }
    }
}
