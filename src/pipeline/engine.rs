use std::sync::Arc;

use anyhow::{Error, Result};
use futures_util::{StreamExt, stream};
use serde::Serialize;
use tracing::{debug, error, info};

use crate::{
    clients::qontak::QontakClient,
    models::{
        broadcast::BroadcastRequest,
        candidate::{Candidate, CandidateDetails, NotificationKind, SourceTable},
        outcome::DispatchOutcome,
    },
    pipeline::{CandidateSource, CursorStore, MessageStatsStore, PipelineSettings, gap, join, visit},
    utils::sanitize_phone_number,
};

#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum SourceRunStatus {
    /// Candidates were fetched, dispatched, and accounted for.
    Completed,
    /// The scan returned no new candidates; nothing was dispatched.
    Empty,
    /// The batch aborted before the cursor moved; the next run retries it.
    Failed,
}

#[derive(Debug, Clone, Serialize)]
pub struct SourceRunResult {
    pub source: SourceTable,
    pub status: SourceRunStatus,
    pub total: usize,
    pub delivered: usize,
    pub failed: usize,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub last_event_id: Option<i64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

#[derive(Debug, Clone, Serialize)]
pub struct RunReport {
    pub workflow: NotificationKind,
    pub sources: Vec<SourceRunResult>,
}

/// Orchestrates one notification workflow: scan each sibling source past its
/// cursor, fan the batch out to the provider, fold the outcomes into stats,
/// then advance the cursor.
pub struct NotificationPipeline {
    registry: Arc<dyn CandidateSource>,
    cursors: Arc<dyn CursorStore>,
    stats: Arc<dyn MessageStatsStore>,
    qontak: Arc<QontakClient>,
    settings: PipelineSettings,
}

impl NotificationPipeline {
    pub fn new(
        registry: Arc<dyn CandidateSource>,
        cursors: Arc<dyn CursorStore>,
        stats: Arc<dyn MessageStatsStore>,
        qontak: Arc<QontakClient>,
        settings: PipelineSettings,
    ) -> Self {
        Self {
            registry,
            cursors,
            stats,
            qontak,
            settings,
        }
    }

    /// Runs one workflow across both sibling sources, identity first. A
    /// failure in one source never prevents the other from running.
    pub async fn run(&self, kind: NotificationKind) -> RunReport {
        info!(workflow = kind.as_str(), "Workflow run started");

        let mut sources = Vec::with_capacity(SourceTable::ALL.len());
        for source in SourceTable::ALL {
            sources.push(self.run_source(source, kind).await);
        }

        let total: usize = sources.iter().map(|s| s.total).sum();
        let delivered: usize = sources.iter().map(|s| s.delivered).sum();
        let failed: usize = sources.iter().map(|s| s.failed).sum();

        info!(
            workflow = kind.as_str(),
            total, delivered, failed, "Workflow run finished"
        );

        RunReport {
            workflow: kind,
            sources,
        }
    }

    async fn run_source(&self, source: SourceTable, kind: NotificationKind) -> SourceRunResult {
        match self.run_batch(source, kind).await {
            Ok(result) => result,
            Err(e) => {
                error!(
                    source = source.as_str(),
                    workflow = kind.as_str(),
                    error = %e,
                    "Source batch failed"
                );

                SourceRunResult {
                    source,
                    status: SourceRunStatus::Failed,
                    total: 0,
                    delivered: 0,
                    failed: 0,
                    last_event_id: None,
                    error: Some(e.to_string()),
                }
            }
        }
    }

    /// One scan+dispatch cycle for a single source. Stats are recorded before
    /// the cursor moves, so a stats failure leaves the batch unseen and it is
    /// re-sent on the next run rather than dropped.
    async fn run_batch(
        &self,
        source: SourceTable,
        kind: NotificationKind,
    ) -> Result<SourceRunResult, Error> {
        let last_event_id = self.cursors.last_event_id(source, kind).await?;

        let candidates = self
            .registry
            .fetch_candidates(source, kind, last_event_id)
            .await?;

        if candidates.is_empty() {
            debug!(
                source = source.as_str(),
                workflow = kind.as_str(),
                last_event_id,
                "No new candidates"
            );

            return Ok(SourceRunResult {
                source,
                status: SourceRunStatus::Empty,
                total: 0,
                delivered: 0,
                failed: 0,
                last_event_id: None,
                error: None,
            });
        }

        let total = candidates.len();
        let batch_max = candidates
            .iter()
            .map(|c| c.event_id)
            .max()
            .unwrap_or(last_event_id);

        let outcomes = self.dispatch_all(kind, &candidates).await;
        let delivered = outcomes.iter().filter(|o| o.is_delivered()).count();
        let failed = total - delivered;

        self.stats
            .record(
                self.settings.template_id_for(kind),
                kind.as_str(),
                delivered as i64,
                failed as i64,
            )
            .await?;

        let new_cursor = batch_max.max(last_event_id);
        self.cursors.advance(source, kind, new_cursor).await?;

        info!(
            source = source.as_str(),
            workflow = kind.as_str(),
            total,
            delivered,
            failed,
            cursor = new_cursor,
            "Batch completed"
        );

        Ok(SourceRunResult {
            source,
            status: SourceRunStatus::Completed,
            total,
            delivered,
            failed,
            last_event_id: Some(new_cursor),
            error: None,
        })
    }

    /// Fans the batch out to the provider, at most `dispatch_concurrency`
    /// candidates in flight. Outcome order is not delivery order; only the
    /// counts matter.
    async fn dispatch_all(
        &self,
        kind: NotificationKind,
        candidates: &[Candidate],
    ) -> Vec<DispatchOutcome> {
        let limit = self.settings.dispatch_concurrency.max(1);

        let dispatches: Vec<_> = candidates
            .iter()
            .map(|candidate| self.dispatch_one(kind, candidate))
            .collect();

        stream::iter(dispatches)
            .buffer_unordered(limit)
            .collect()
            .await
    }

    async fn dispatch_one(&self, kind: NotificationKind, candidate: &Candidate) -> DispatchOutcome {
        let request = match self.build_request(kind, candidate).await {
            Ok(request) => request,
            Err(e) => {
                error!(
                    event_id = candidate.event_id,
                    full_name = %candidate.full_name,
                    error = %e,
                    "Failed to build broadcast request"
                );
                return DispatchOutcome::Unknown(format!("Failed to build request: {}", e));
            }
        };

        let outcome = self.qontak.send_broadcast(&request).await;

        match &outcome {
            DispatchOutcome::Delivered => {
                debug!(event_id = candidate.event_id, "Broadcast delivered");
            }
            DispatchOutcome::Rejected(provider_error) => {
                error!(
                    event_id = candidate.event_id,
                    full_name = %candidate.full_name,
                    mobile_phone_number = %candidate.mobile_phone_number,
                    error = %provider_error,
                    "Broadcast rejected by provider"
                );
            }
            DispatchOutcome::Unknown(reason) => {
                error!(
                    event_id = candidate.event_id,
                    full_name = %candidate.full_name,
                    mobile_phone_number = %candidate.mobile_phone_number,
                    reason,
                    "Broadcast outcome unknown"
                );
            }
        }

        outcome
    }

    async fn build_request(
        &self,
        kind: NotificationKind,
        candidate: &Candidate,
    ) -> Result<BroadcastRequest, Error> {
        let parameters = match &candidate.details {
            CandidateDetails::Enrollment => join::build_parameters(candidate, &self.settings),
            CandidateDetails::VisitReminder {
                latest_visit_number,
            } => visit::build_parameters(candidate, *latest_visit_number),
            CandidateDetails::PregnancyGap { gap_values } => {
                gap::build_parameters(candidate, gap_values, &self.qontak, &self.settings).await?
            }
        };

        Ok(BroadcastRequest {
            to_name: candidate.full_name.clone(),
            to_number: sanitize_phone_number(&candidate.mobile_phone_number),
            message_template_id: self.settings.template_id_for(kind).to_string(),
            channel_integration_id: self.settings.channel_integration_id.clone(),
            parameters,
        })
    }
}
