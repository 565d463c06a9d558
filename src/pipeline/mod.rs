pub mod engine;
pub mod gap;
pub mod join;
pub mod qr;
pub mod visit;

use std::path::PathBuf;

use anyhow::{Error, Result};
use async_trait::async_trait;

use crate::{
    config::Config,
    models::candidate::{Candidate, NotificationKind, SourceTable},
};

/// Yields registry rows that became eligible after `last_event_id` for one
/// (source, kind) scan, ascending by event id. Eligibility rules (phone
/// presence, demo-account exclusion, sibling deduplication) belong to the
/// implementation, not the callers.
#[async_trait]
pub trait CandidateSource: Send + Sync {
    async fn fetch_candidates(
        &self,
        source: SourceTable,
        kind: NotificationKind,
        last_event_id: i64,
    ) -> Result<Vec<Candidate>, Error>;
}

/// Durable high-water mark per (source, kind) scan. Advancing it is a
/// "mark as seen", not a delivery guarantee: a crash between dispatch and
/// advance re-sends the batch on the next run.
#[async_trait]
pub trait CursorStore: Send + Sync {
    async fn last_event_id(
        &self,
        source: SourceTable,
        kind: NotificationKind,
    ) -> Result<i64, Error>;

    async fn advance(
        &self,
        source: SourceTable,
        kind: NotificationKind,
        event_id: i64,
    ) -> Result<(), Error>;
}

/// Per-template delivery counters. Deltas are additive across runs; a row is
/// created on first touch and never overwritten.
#[async_trait]
pub trait MessageStatsStore: Send + Sync {
    async fn record(
        &self,
        message_template_id: &str,
        message_type: &str,
        success_delta: i64,
        failure_delta: i64,
    ) -> Result<(), Error>;
}

/// Immutable settings shared by every workflow run.
#[derive(Debug, Clone)]
pub struct PipelineSettings {
    pub channel_integration_id: String,
    pub join_notification_template_id: String,
    pub visit_reminder_template_id: String,
    pub pregnancy_gap_template_id: String,
    pub district_health_office_name: String,
    pub dispatch_concurrency: usize,
    pub qr_code_directory: PathBuf,
    pub qr_code_width: u32,
    pub qr_code_height: u32,
}

impl PipelineSettings {
    pub fn from_config(config: &Config) -> Self {
        Self {
            channel_integration_id: config.channel_integration_id.clone(),
            join_notification_template_id: config.join_notification_template_id.clone(),
            visit_reminder_template_id: config.visit_reminder_template_id.clone(),
            pregnancy_gap_template_id: config.pregnancy_gap_template_id.clone(),
            district_health_office_name: config.district_health_office_name.clone(),
            dispatch_concurrency: config.dispatch_concurrency,
            qr_code_directory: PathBuf::from(&config.qr_code_directory),
            qr_code_width: config.qr_code_width,
            qr_code_height: config.qr_code_height,
        }
    }

    pub fn template_id_for(&self, kind: NotificationKind) -> &str {
        match kind {
            NotificationKind::Join => &self.join_notification_template_id,
            NotificationKind::VisitReminder => &self.visit_reminder_template_id,
            NotificationKind::PregnancyGap => &self.pregnancy_gap_template_id,
        }
    }
}
