use std::{
    collections::{HashMap, HashSet},
    path::Path,
    sync::{Arc, Mutex},
    time::Duration,
};

use anc_notify_service::{
    clients::{auth::SharedAccessToken, qontak::QontakClient},
    models::candidate::{Candidate, CandidateDetails, NotificationKind, SourceTable},
    pipeline::{
        CandidateSource, CursorStore, MessageStatsStore, PipelineSettings,
        engine::NotificationPipeline,
    },
};
use anyhow::{Error, Result, anyhow};
use async_trait::async_trait;
use serde_json::{Value, json};
use wiremock::MockServer;

/// Scriptable candidate source backed by per-(source, kind) batches.
///
/// By default it behaves like the real registry scan and only returns
/// candidates past the cursor; `ignore_cursor` makes it replay the full
/// batch on every fetch, which simulates a run happening before the
/// previous cursor advance landed.
#[derive(Default)]
pub struct InMemorySource {
    batches: Mutex<HashMap<(SourceTable, NotificationKind), Vec<Candidate>>>,
    failing: Mutex<HashSet<SourceTable>>,
    ignore_cursor: Mutex<bool>,
}

impl InMemorySource {
    pub fn stage(&self, source: SourceTable, kind: NotificationKind, candidates: Vec<Candidate>) {
        self.batches
            .lock()
            .unwrap()
            .insert((source, kind), candidates);
    }

    pub fn fail_source(&self, source: SourceTable) {
        self.failing.lock().unwrap().insert(source);
    }

    pub fn ignore_cursor(&self) {
        *self.ignore_cursor.lock().unwrap() = true;
    }
}

#[async_trait]
impl CandidateSource for InMemorySource {
    async fn fetch_candidates(
        &self,
        source: SourceTable,
        kind: NotificationKind,
        last_event_id: i64,
    ) -> Result<Vec<Candidate>, Error> {
        if self.failing.lock().unwrap().contains(&source) {
            return Err(anyhow!("Candidate query failed for {}", source.as_str()));
        }

        let batch = self
            .batches
            .lock()
            .unwrap()
            .get(&(source, kind))
            .cloned()
            .unwrap_or_default();

        if *self.ignore_cursor.lock().unwrap() {
            return Ok(batch);
        }

        Ok(batch
            .into_iter()
            .filter(|c| c.event_id > last_event_id)
            .collect())
    }
}

#[derive(Default)]
pub struct InMemoryCursors {
    positions: Mutex<HashMap<(SourceTable, NotificationKind), i64>>,
}

impl InMemoryCursors {
    pub fn position(&self, source: SourceTable, kind: NotificationKind) -> i64 {
        self.positions
            .lock()
            .unwrap()
            .get(&(source, kind))
            .copied()
            .unwrap_or(0)
    }
}

#[async_trait]
impl CursorStore for InMemoryCursors {
    async fn last_event_id(
        &self,
        source: SourceTable,
        kind: NotificationKind,
    ) -> Result<i64, Error> {
        Ok(self.position(source, kind))
    }

    async fn advance(
        &self,
        source: SourceTable,
        kind: NotificationKind,
        event_id: i64,
    ) -> Result<(), Error> {
        self.positions
            .lock()
            .unwrap()
            .insert((source, kind), event_id);
        Ok(())
    }
}

/// Additive stats sink mirroring the database upsert, plus a kill switch to
/// exercise the stats-before-cursor ordering.
#[derive(Default)]
pub struct InMemoryStats {
    rows: Mutex<HashMap<(String, String), (i64, i64)>>,
    fail: Mutex<bool>,
}

impl InMemoryStats {
    pub fn totals(&self, message_template_id: &str, message_type: &str) -> (i64, i64) {
        self.rows
            .lock()
            .unwrap()
            .get(&(message_template_id.to_string(), message_type.to_string()))
            .copied()
            .unwrap_or((0, 0))
    }

    pub fn row_count(&self) -> usize {
        self.rows.lock().unwrap().len()
    }

    pub fn fail_always(&self) {
        *self.fail.lock().unwrap() = true;
    }
}

#[async_trait]
impl MessageStatsStore for InMemoryStats {
    async fn record(
        &self,
        message_template_id: &str,
        message_type: &str,
        success_delta: i64,
        failure_delta: i64,
    ) -> Result<(), Error> {
        if *self.fail.lock().unwrap() {
            return Err(anyhow!("Failed to upsert message stats"));
        }

        let mut rows = self.rows.lock().unwrap();
        let entry = rows
            .entry((message_template_id.to_string(), message_type.to_string()))
            .or_insert((0, 0));
        entry.0 += success_delta;
        entry.1 += failure_delta;
        Ok(())
    }
}

pub struct TestPipeline {
    pub source: Arc<InMemorySource>,
    pub cursors: Arc<InMemoryCursors>,
    pub stats: Arc<InMemoryStats>,
    pub pipeline: NotificationPipeline,
}

pub fn build_pipeline(server: &MockServer, settings: PipelineSettings) -> Result<TestPipeline> {
    let source = Arc::new(InMemorySource::default());
    let cursors = Arc::new(InMemoryCursors::default());
    let stats = Arc::new(InMemoryStats::default());
    let qontak = Arc::new(provider_client(server)?);

    let pipeline = NotificationPipeline::new(
        source.clone(),
        cursors.clone(),
        stats.clone(),
        qontak,
        settings,
    );

    Ok(TestPipeline {
        source,
        cursors,
        stats,
        pipeline,
    })
}

pub fn provider_client(server: &MockServer) -> Result<QontakClient> {
    let token = SharedAccessToken::new();
    token.set("test-token".to_string());
    QontakClient::new(server.uri(), Duration::from_secs(5), token)
}

pub fn test_settings(qr_code_directory: &Path) -> PipelineSettings {
    PipelineSettings {
        channel_integration_id: "channel-1".to_string(),
        join_notification_template_id: "tpl-join".to_string(),
        visit_reminder_template_id: "tpl-visit".to_string(),
        pregnancy_gap_template_id: "tpl-gap".to_string(),
        district_health_office_name: "Dinas Kesehatan Kota Test".to_string(),
        dispatch_concurrency: 4,
        qr_code_directory: qr_code_directory.to_path_buf(),
        qr_code_width: 200,
        qr_code_height: 200,
    }
}

pub fn join_candidate(event_id: i64, full_name: &str, mobile_phone_number: &str) -> Candidate {
    Candidate {
        event_id,
        mobile_phone_number: mobile_phone_number.to_string(),
        full_name: full_name.to_string(),
        details: CandidateDetails::Enrollment,
    }
}

pub fn visit_candidate(
    event_id: i64,
    full_name: &str,
    mobile_phone_number: &str,
    latest_visit_number: i64,
) -> Candidate {
    Candidate {
        event_id,
        mobile_phone_number: mobile_phone_number.to_string(),
        full_name: full_name.to_string(),
        details: CandidateDetails::VisitReminder {
            latest_visit_number,
        },
    }
}

pub fn gap_candidate(
    event_id: i64,
    full_name: &str,
    mobile_phone_number: &str,
    gap_values: &str,
) -> Candidate {
    Candidate {
        event_id,
        mobile_phone_number: mobile_phone_number.to_string(),
        full_name: full_name.to_string(),
        details: CandidateDetails::PregnancyGap {
            gap_values: gap_values.to_string(),
        },
    }
}

/// A well-formed latest-visit projection: 20 comma-joined clinical fields.
pub fn gap_csv() -> String {
    [
        "2026-08-01",
        "28",
        "155",
        "58",
        "24",
        "110",
        "70",
        "26",
        "cephalic",
        "140",
        "T2",
        "yes",
        "yes",
        "no",
        "11.5",
        "no",
        "N/A",
        "no",
        "no",
        "no",
    ]
    .join(",")
}

pub fn broadcast_success_body() -> Value {
    json!({
        "status": "success",
        "data": {
            "id": "b6a5c1e0-0000-0000-0000-000000000000",
            "send_at": null,
            "created_at": "2026-08-23T08:00:00Z"
        }
    })
}

pub fn rejection_body(code: i64, message: &str) -> Value {
    json!({
        "status": "error",
        "error": {
            "code": code,
            "messages": [message]
        }
    })
}

pub fn upload_success_body(url: &str) -> Value {
    json!({
        "status": "success",
        "data": { "url": url }
    })
}

/// Parses the JSON bodies of every broadcast request the mock server saw.
pub async fn recorded_broadcasts(server: &MockServer) -> Vec<Value> {
    server
        .received_requests()
        .await
        .unwrap_or_default()
        .into_iter()
        .filter(|r| r.url.path().ends_with("/broadcasts/whatsapp/direct"))
        .map(|r| serde_json::from_slice(&r.body).expect("broadcast body should be JSON"))
        .collect()
}
