//! Notification fan-out for matched donors.
//!
//! Dispatch is gated on the request's fraud score: requests at or above the
//! suppression threshold are never announced to donors. Individual delivery
//! failures are logged and counted but never abort the batch, and each
//! delivery is bounded by a timeout so one slow transport cannot stall the
//! rest of the fan-out.

use crate::matching::{DonorMatch, DonorProfile};
use crate::RequestRecord;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;
use tokio::task::JoinHandle;
use tracing::{info, warn};
use uuid::Uuid;

/// Fraud score at which donor notifications are suppressed entirely.
pub const DEFAULT_SUPPRESSION_THRESHOLD: u8 = 80;
/// Per-delivery time budget.
pub const DEFAULT_DELIVERY_TIMEOUT: Duration = Duration::from_secs(10);

/// Errors surfaced by notification transports.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum NotifyError {
    #[error("email delivery failed: {0}")]
    Email(String),
    #[error("sms delivery failed: {0}")]
    Sms(String),
    #[error("transport unavailable: {0}")]
    Transport(String),
}

/// A delivery channel for donor alerts. Implementations wrap an email
/// sender, an SMS gateway, or both.
#[async_trait]
pub trait Notifier: Send + Sync {
    /// Transport name used in logs.
    fn name(&self) -> &str;

    /// Delivers one alert about `record` to `donor`.
    async fn deliver(&self, donor: &DonorProfile, record: &RequestRecord)
        -> Result<(), NotifyError>;
}

#[derive(Debug, Clone)]
pub struct DispatchConfig {
    /// Requests scoring at or above this are not announced.
    pub suppression_threshold: u8,
    /// Upper bound on a single delivery attempt.
    pub delivery_timeout: Duration,
}

impl Default for DispatchConfig {
    fn default() -> Self {
        Self {
            suppression_threshold: DEFAULT_SUPPRESSION_THRESHOLD,
            delivery_timeout: DEFAULT_DELIVERY_TIMEOUT,
        }
    }
}

/// Outcome of one fan-out batch.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DispatchReport {
    pub request_id: Uuid,
    pub suppressed: bool,
    pub attempted: usize,
    pub delivered: usize,
    pub failed: usize,
}

impl DispatchReport {
    fn suppressed(request_id: Uuid) -> Self {
        Self {
            request_id,
            suppressed: true,
            attempted: 0,
            delivered: 0,
            failed: 0,
        }
    }

    pub fn all_delivered(&self) -> bool {
        !self.suppressed && self.failed == 0
    }
}

/// Fans a screened request out to matched donors over one transport.
pub struct NotificationDispatcher<N: Notifier> {
    notifier: N,
    config: DispatchConfig,
}

impl<N: Notifier> NotificationDispatcher<N> {
    pub fn new(notifier: N) -> Self {
        Self::with_config(notifier, DispatchConfig::default())
    }

    pub fn with_config(notifier: N, config: DispatchConfig) -> Self {
        Self { notifier, config }
    }

    /// Notifies every matched donor about the request.
    ///
    /// Suppressed requests return immediately with an empty report. A failed
    /// or timed-out delivery is logged and counted; remaining donors are
    /// still attempted.
    pub async fn dispatch(&self, record: &RequestRecord, matches: &[DonorMatch]) -> DispatchReport {
        let request_id = record.request.id;

        if record.fraud.score >= self.config.suppression_threshold {
            info!(
                request_id = %request_id,
                fraud_score = record.fraud.score,
                threshold = self.config.suppression_threshold,
                "notifications suppressed for high-risk request"
            );
            return DispatchReport::suppressed(request_id);
        }

        let mut delivered = 0;
        let mut failed = 0;
        for candidate in matches {
            let attempt = tokio::time::timeout(
                self.config.delivery_timeout,
                self.notifier.deliver(&candidate.donor, record),
            )
            .await;

            match attempt {
                Ok(Ok(())) => delivered += 1,
                Ok(Err(err)) => {
                    failed += 1;
                    warn!(
                        request_id = %request_id,
                        donor_id = %candidate.donor.id,
                        transport = self.notifier.name(),
                        error = %err,
                        "donor notification failed"
                    );
                }
                Err(_) => {
                    failed += 1;
                    warn!(
                        request_id = %request_id,
                        donor_id = %candidate.donor.id,
                        transport = self.notifier.name(),
                        timeout_ms = self.config.delivery_timeout.as_millis() as u64,
                        "donor notification timed out"
                    );
                }
            }
        }

        info!(
            request_id = %request_id,
            attempted = matches.len(),
            delivered,
            failed,
            "donor notification batch finished"
        );
        DispatchReport {
            request_id,
            suppressed: false,
            attempted: matches.len(),
            delivered,
            failed,
        }
    }
}

/// Runs a fan-out on a background task so request intake never waits on
/// transports. The handle resolves to the batch report.
pub fn spawn_dispatch<N>(
    dispatcher: Arc<NotificationDispatcher<N>>,
    record: RequestRecord,
    matches: Vec<DonorMatch>,
) -> JoinHandle<DispatchReport>
where
    N: Notifier + 'static,
{
    tokio::spawn(async move { dispatcher.dispatch(&record, &matches).await })
}
