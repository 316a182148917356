//! Publication queue worker: recover stuck leases, select a due batch,
//! claim one at a time, process each via the messaging client, and commit
//! the derived state. No exception escapes the per-item processing
//! boundary — on any failure during processing the row is pushed to
//! `retry` (or `failed` if the attempts cap is reached) rather than left
//! in `processing`.

use bc_common::{clock, Post, PostStatus, Publication};
use bc_messaging::{ClientConfig, TelegramClient};
use bc_store::{AuditLogWriter, PublicationRepository, StoreError};
use chrono::Duration;
use serde_json::json;
use std::collections::HashMap;
use std::sync::Arc;
use std::sync::Mutex as StdMutex;
use thiserror::Error;
use tokio::time::sleep;
use tracing::{debug, error, info, warn};

#[derive(Debug, Error)]
pub enum WorkerError {
    #[error(transparent)]
    Store(#[from] StoreError),
    #[error("post {0} referenced by publication has no channel")]
    MissingChannel(i64),
    #[error("post {0} not found for publication")]
    MissingPost(i64),
}

#[derive(Debug, Clone)]
pub struct WorkerConfig {
    pub worker_id: String,
    pub interval_seconds: u64,
    pub batch_size: i64,
    pub max_attempts: i32,
    pub default_retry_minutes: i64,
    pub processing_ttl_seconds: i64,
}

pub struct Worker {
    repo: Arc<dyn PublicationRepository>,
    audit: AuditLogWriter,
    messaging_config: ClientConfig,
    config: WorkerConfig,
    clients: StdMutex<HashMap<i64, Arc<TelegramClient>>>,
}

impl Worker {
    pub fn new(
        repo: Arc<dyn PublicationRepository>,
        audit: AuditLogWriter,
        messaging_config: ClientConfig,
        config: WorkerConfig,
    ) -> Self {
        Self {
            repo,
            audit,
            messaging_config,
            config,
            clients: StdMutex::new(HashMap::new()),
        }
    }

    /// Runs forever, one iteration per `interval_seconds`.
    pub async fn run(&self) {
        info!(worker_id = %self.config.worker_id, "starting publication worker");
        loop {
            if let Err(e) = self.run_once().await {
                error!(error = %e, "worker iteration failed");
            }
            sleep(std::time::Duration::from_secs(self.config.interval_seconds)).await;
        }
    }

    /// Runs a single iteration: recover, select, claim, process. Returns
    /// the number of publications processed (claimed successfully).
    pub async fn run_once(&self) -> Result<usize, WorkerError> {
        let recovered = self
            .repo
            .recover_stuck_leases(self.config.processing_ttl_seconds, self.config.max_attempts)
            .await?;
        if recovered > 0 {
            debug!(recovered, "stuck leases recovered this iteration");
        }

        let batch = self
            .repo
            .select_due_batch(self.config.batch_size, self.config.max_attempts)
            .await?;

        let mut processed = 0usize;
        for candidate in batch {
            if !self.repo.claim(candidate.id, &self.config.worker_id).await? {
                debug!(id = candidate.id, "lost claim race, skipping");
                continue;
            }
            self.process_claimed(candidate.id).await;
            processed += 1;
        }

        Ok(processed)
    }

    /// Processes one already-claimed row. Never lets an error escape: any
    /// failure here is converted into a retry/fail transition so the row
    /// never lingers in `processing`.
    async fn process_claimed(&self, id: i64) {
        match self.try_process_claimed(id).await {
            Ok(()) => {}
            Err(e) => {
                warn!(id, error = %e, "unexpected error while processing publication, retrying");
                self.fallback_retry(id, &format!("unexpected_error: {e}"), true, None)
                    .await;
            }
        }
    }

    async fn try_process_claimed(&self, id: i64) -> Result<(), WorkerError> {
        let publication = self
            .repo
            .reload(id)
            .await?
            .ok_or(StoreError::NotFound(format!("publication {id}")))?;

        // Idempotent completion: a prior crashed run already got a
        // successful send committed to message_id but crashed before the
        // status flip landed.
        if let Some(message_id) = &publication.message_id {
            debug!(id, message_id, "reentry: message_id already set, completing idempotently");
            self.repo.mark_already_sent(id, clock::now_utc_naive()).await?;
            self.finalize_post_status(&publication, true).await?;
            return Ok(());
        }

        let post = self
            .repo
            .load_post(publication.post_id)
            .await?
            .ok_or(WorkerError::MissingPost(publication.post_id))?;
        let channel = self
            .repo
            .load_channel(post.channel_id)
            .await?
            .ok_or(WorkerError::MissingChannel(post.channel_id))?;

        let chat_id = bc_messaging::normalize_chat_id(&channel.destination);
        let client = self.client_for_channel(&channel);

        let result = bc_messaging::send_publication(&client, &chat_id, &post).await;

        if result.ok {
            let message_id = result.message_id.unwrap_or_default();
            let sent_at = clock::now_utc_naive();
            self.repo.mark_sent(id, &message_id, sent_at).await?;
            self.audit
                .log(
                    "publication",
                    id,
                    "send",
                    json!({"message_id": message_id}),
                )
                .await?;
            self.finalize_post_status(&publication, true).await?;
        } else {
            self.handle_send_failure(&publication, &post, result).await?;
        }

        Ok(())
    }

    async fn handle_send_failure(
        &self,
        publication: &Publication,
        post: &Post,
        result: bc_messaging::SendResult,
    ) -> Result<(), WorkerError> {
        let error = result.error.unwrap_or_else(|| "unknown error".to_string());
        let attempts_after = publication.attempts + 1;

        if attempts_after >= self.config.max_attempts || !result.retryable {
            self.repo.mark_failed(publication.id, &error).await?;
            self.repo.set_post_status(post.id, PostStatus::Failed).await?;
            self.audit
                .log("publication", publication.id, "fail", json!({"error": error}))
                .await?;
        } else {
            let delay_seconds = self
                .config
                .default_retry_minutes
                .saturating_mul(60)
                .max(result.retry_after_seconds.unwrap_or(0));
            let ready_at = clock::now_utc_naive() + Duration::seconds(delay_seconds);
            self.repo.mark_retry(publication.id, &error, ready_at).await?;
            self.audit
                .log(
                    "publication",
                    publication.id,
                    "retry",
                    json!({"error": error, "delay_seconds": delay_seconds}),
                )
                .await?;
        }

        Ok(())
    }

    /// On an unexpected error (store hiccup, panic-free bug), push the row
    /// back to retry/failed without touching attempts bookkeeping we
    /// couldn't safely read. Mirrors the worker's own failure path but
    /// tolerates not having a freshly-reloaded row.
    async fn fallback_retry(&self, id: i64, error: &str, retryable: bool, retry_after_seconds: Option<i64>) {
        let reloaded = match self.repo.reload(id).await {
            Ok(Some(p)) => p,
            _ => {
                error!(id, "could not reload publication after unexpected error, leaving lease for stuck-recovery sweep");
                return;
            }
        };

        let attempts_after = reloaded.attempts + 1;
        let outcome = if attempts_after >= self.config.max_attempts || !retryable {
            self.repo.mark_failed(id, error).await
        } else {
            let delay_seconds = self
                .config
                .default_retry_minutes
                .saturating_mul(60)
                .max(retry_after_seconds.unwrap_or(0));
            let ready_at = clock::now_utc_naive() + Duration::seconds(delay_seconds);
            self.repo.mark_retry(id, error, ready_at).await
        };

        if let Err(e) = outcome {
            error!(id, error = %e, "failed to commit fallback retry/fail transition");
        }
    }

    async fn finalize_post_status(&self, publication: &Publication, sent: bool) -> Result<(), WorkerError> {
        if !sent {
            return Ok(());
        }
        let remaining = self
            .repo
            .count_non_terminal_for_post(publication.post_id, publication.id)
            .await?;
        if remaining == 0 {
            self.repo
                .set_post_status(publication.post_id, PostStatus::Sent)
                .await?;
        }
        Ok(())
    }

    fn client_for_channel(&self, channel: &bc_common::Channel) -> Arc<TelegramClient> {
        let mut clients = self.clients.lock().unwrap();
        if let Some(client) = clients.get(&channel.id) {
            return client.clone();
        }
        let client = Arc::new(
            TelegramClient::new(self.messaging_config.clone(), channel.credential_token.clone())
                .expect("reqwest client construction is infallible for well-formed timeouts"),
        );
        clients.insert(channel.id, client.clone());
        client
    }
}
