use std::sync::LazyLock;

use anyhow::{Error, Result, anyhow};
use async_trait::async_trait;
use tokio_postgres::{Client, NoTls, Row};
use tracing::{debug, error, info};

use crate::{
    config::Config,
    models::candidate::{Candidate, CandidateDetails, NotificationKind, SourceTable},
    pipeline::{CandidateSource, MessageStatsStore},
};

/// New registry rows for the join notification: the latest row per phone
/// number past the cursor, enrolled with WhatsApp consent not withdrawn.
const JOIN_FROM_MOTHER_IDENTITY: &str = "\
SELECT mi.event_id, \
       mi.mobile_phone_number, \
       COALESCE((SELECT cm.full_name \
                   FROM client_mother cm \
                  WHERE cm.base_entity_id = mi.mother_base_entity_id \
                  ORDER BY cm.server_version_epoch DESC \
                  LIMIT 1), '') AS full_name \
  FROM mother_identity mi \
 WHERE mi.event_id IN ( \
        SELECT MAX(mi_id_only.event_id) OVER (PARTITION BY mi_id_only.mobile_phone_number) \
          FROM mother_identity mi_id_only \
         WHERE mi_id_only.event_id > $1 \
           AND mi_id_only.mobile_phone_number IS NOT NULL \
           AND mi_id_only.provider_id NOT LIKE '%demo%' \
           AND mi_id_only.mother_base_entity_id IN ( \
                SELECT ar.mother_base_entity_id \
                  FROM anc_register ar \
                 WHERE ar.is_consented_whatsapp IS NULL \
                    OR ar.is_consented_whatsapp != 'Tidak')) \
 ORDER BY mi.event_id";

/// Join candidates surfacing from the edit table: rows whose phone number was
/// added after initial registration, excluding mothers already notified from
/// an edit inside the previous cursor window.
const JOIN_FROM_MOTHER_EDIT: &str = "\
SELECT me.event_id, \
       me.mobile_phone_number, \
       COALESCE((SELECT cm.full_name \
                   FROM client_mother cm \
                  WHERE cm.base_entity_id = me.mother_base_entity_id \
                  ORDER BY cm.server_version_epoch DESC \
                  LIMIT 1), '') AS full_name \
  FROM mother_edit me \
 WHERE me.event_id IN ( \
        SELECT MAX(me_id_only.event_id) OVER (PARTITION BY me_id_only.mother_base_entity_id) \
          FROM mother_edit me_id_only \
         WHERE me_id_only.event_id > $1 \
           AND me_id_only.mobile_phone_number IS NOT NULL \
           AND me_id_only.provider_id NOT LIKE '%demo%' \
           AND me_id_only.mother_base_entity_id IN ( \
                SELECT mi.mother_base_entity_id \
                  FROM mother_identity mi \
                 WHERE mi.mobile_phone_number IS NULL) \
           AND me_id_only.mother_base_entity_id NOT IN ( \
                SELECT me_duplicate.mother_base_entity_id \
                  FROM mother_edit me_duplicate \
                 WHERE me_duplicate.mobile_phone_number IS NOT NULL \
                   AND me_duplicate.event_id <= $1 \
                   AND me_duplicate.provider_id NOT LIKE '%demo%') \
           AND me_id_only.mother_base_entity_id IN ( \
                SELECT ar.mother_base_entity_id \
                  FROM anc_register ar \
                 WHERE ar.is_consented_whatsapp IS NULL \
                    OR ar.is_consented_whatsapp != 'Tidak')) \
 ORDER BY me.event_id";

/// Visit reminders from the identity table: mothers whose latest visit falls
/// exactly on current_date - visit interval + reminder lead, not yet seen.
/// The visit event id doubles as the candidate id, so every new visit re-arms
/// the reminder and the gap message for its mother.
const VISIT_REMINDER_FROM_MOTHER_IDENTITY: &str = "\
SELECT dedup.event_id, dedup.mobile_phone_number, dedup.full_name, dedup.latest_anc_visit_number \
  FROM ( \
       SELECT DISTINCT ON (mi.mobile_phone_number) \
              lv.event_id, \
              mi.mobile_phone_number, \
              COALESCE((SELECT cm.full_name \
                          FROM client_mother cm \
                         WHERE cm.base_entity_id = mi.mother_base_entity_id \
                         ORDER BY cm.server_version_epoch DESC \
                         LIMIT 1), '') AS full_name, \
              COALESCE(NULLIF(lv.anc_visit_number, ''), '0')::bigint AS latest_anc_visit_number \
         FROM mother_identity mi \
        INNER JOIN (SELECT av.*, \
                           ROW_NUMBER() OVER (PARTITION BY av.mother_base_entity_id \
                                              ORDER BY av.anc_date DESC, av.event_id DESC) AS visit_rank \
                      FROM anc_visit av) lv \
                ON lv.mother_base_entity_id = mi.mother_base_entity_id \
               AND lv.visit_rank = 1 \
        WHERE lv.event_id > $1 \
          AND lv.anc_date = current_date - INTERVAL '1 day' * $2::int + INTERVAL '1 day' * $3::int \
          AND mi.mobile_phone_number IS NOT NULL \
          AND mi.provider_id NOT LIKE '%demo%' \
          AND mi.mother_base_entity_id IN (SELECT ar.mother_base_entity_id FROM anc_register ar) \
        ORDER BY mi.mobile_phone_number, mi.event_id DESC) dedup \
 ORDER BY dedup.event_id";

const VISIT_REMINDER_FROM_MOTHER_EDIT: &str = "\
SELECT dedup.event_id, dedup.mobile_phone_number, dedup.full_name, dedup.latest_anc_visit_number \
  FROM ( \
       SELECT DISTINCT ON (me.mother_base_entity_id) \
              lv.event_id, \
              me.mobile_phone_number, \
              COALESCE((SELECT cm.full_name \
                          FROM client_mother cm \
                         WHERE cm.base_entity_id = me.mother_base_entity_id \
                         ORDER BY cm.server_version_epoch DESC \
                         LIMIT 1), '') AS full_name, \
              COALESCE(NULLIF(lv.anc_visit_number, ''), '0')::bigint AS latest_anc_visit_number \
         FROM mother_edit me \
        INNER JOIN (SELECT av.*, \
                           ROW_NUMBER() OVER (PARTITION BY av.mother_base_entity_id \
                                              ORDER BY av.anc_date DESC, av.event_id DESC) AS visit_rank \
                      FROM anc_visit av) lv \
                ON lv.mother_base_entity_id = me.mother_base_entity_id \
               AND lv.visit_rank = 1 \
        WHERE lv.event_id > $1 \
          AND lv.anc_date = current_date - INTERVAL '1 day' * $2::int + INTERVAL '1 day' * $3::int \
          AND me.mobile_phone_number IS NOT NULL \
          AND me.provider_id NOT LIKE '%demo%' \
          AND me.mother_base_entity_id IN ( \
               SELECT mi.mother_base_entity_id \
                 FROM mother_identity mi \
                WHERE mi.mobile_phone_number IS NULL) \
          AND me.mother_base_entity_id IN (SELECT ar.mother_base_entity_id FROM anc_register ar) \
        ORDER BY me.mother_base_entity_id, me.event_id DESC) dedup \
 ORDER BY dedup.event_id";

/// The 20 comma-joined clinical fields of the latest visit, in the order the
/// gap message template substitutes them. Blank columns are reported as N/A.
const GAP_VALUES_COLUMN: &str = "\
CONCAT_WS(',', \
    COALESCE(lv.anc_date::varchar, 'N/A'), \
    COALESCE(NULLIF(lv.gestational_age, ''), 'N/A'), \
    COALESCE(NULLIF(lv.height_in_cm, ''), 'N/A'), \
    COALESCE(NULLIF(lv.weight_in_kg, ''), 'N/A'), \
    COALESCE(NULLIF(lv.mid_upper_arm_circumference_in_cm, ''), 'N/A'), \
    COALESCE(NULLIF(lv.vital_sign_systolic_blood_pressure, ''), 'N/A'), \
    COALESCE(NULLIF(lv.vital_sign_diastolic_blood_pressure, ''), 'N/A'), \
    COALESCE(NULLIF(lv.uterine_fundal_height, ''), 'N/A'), \
    COALESCE(NULLIF(lv.fetal_presentation, ''), 'N/A'), \
    COALESCE(NULLIF(lv.fetal_heart_rate, ''), 'N/A'), \
    COALESCE(NULLIF(lv.tetanus_toxoid_immunization_status, ''), 'N/A'), \
    COALESCE(NULLIF(lv.is_given_tetanus_toxoid_injection, ''), 'N/A'), \
    COALESCE(NULLIF(lv.is_given_iron_folic_acid_tablet, ''), 'N/A'), \
    COALESCE(NULLIF(lv.has_proteinuria, ''), 'N/A'), \
    COALESCE(NULLIF(lv.haemoglobin_level_result, ''), 'N/A'), \
    COALESCE(NULLIF(lv.blood_glucose_over_140_mgdl, ''), 'N/A'), \
    COALESCE(NULLIF(lv.has_thalasemia, ''), 'N/A'), \
    COALESCE(NULLIF(lv.has_syphilis, ''), 'N/A'), \
    COALESCE(NULLIF(lv.has_hbsag, ''), 'N/A'), \
    COALESCE(NULLIF(lv.has_hiv, ''), 'N/A')) AS gap_values";

static PREGNANCY_GAP_FROM_MOTHER_IDENTITY: LazyLock<String> = LazyLock::new(|| {
    PREGNANCY_GAP_IDENTITY_TEMPLATE.replace("{gap_values}", GAP_VALUES_COLUMN)
});

static PREGNANCY_GAP_FROM_MOTHER_EDIT: LazyLock<String> = LazyLock::new(|| {
    PREGNANCY_GAP_EDIT_TEMPLATE.replace("{gap_values}", GAP_VALUES_COLUMN)
});

const PREGNANCY_GAP_IDENTITY_TEMPLATE: &str = "\
SELECT dedup.event_id, dedup.mobile_phone_number, dedup.full_name, dedup.gap_values \
  FROM ( \
       SELECT DISTINCT ON (mi.mobile_phone_number) \
              lv.event_id, \
              mi.mobile_phone_number, \
              COALESCE((SELECT cm.full_name \
                          FROM client_mother cm \
                         WHERE cm.base_entity_id = mi.mother_base_entity_id \
                         ORDER BY cm.server_version_epoch DESC \
                         LIMIT 1), '') AS full_name, \
              {gap_values} \
         FROM mother_identity mi \
        INNER JOIN (SELECT av.*, \
                           ROW_NUMBER() OVER (PARTITION BY av.mother_base_entity_id \
                                              ORDER BY av.anc_date DESC, av.event_id DESC) AS visit_rank \
                      FROM anc_visit av) lv \
                ON lv.mother_base_entity_id = mi.mother_base_entity_id \
               AND lv.visit_rank = 1 \
        WHERE lv.event_id > $1 \
          AND mi.mobile_phone_number IS NOT NULL \
          AND mi.provider_id NOT LIKE '%demo%' \
          AND mi.mother_base_entity_id IN (SELECT ar.mother_base_entity_id FROM anc_register ar) \
        ORDER BY mi.mobile_phone_number, mi.event_id DESC) dedup \
 ORDER BY dedup.event_id";

const PREGNANCY_GAP_EDIT_TEMPLATE: &str = "\
SELECT dedup.event_id, dedup.mobile_phone_number, dedup.full_name, dedup.gap_values \
  FROM ( \
       SELECT DISTINCT ON (me.mother_base_entity_id) \
              lv.event_id, \
              me.mobile_phone_number, \
              COALESCE((SELECT cm.full_name \
                          FROM client_mother cm \
                         WHERE cm.base_entity_id = me.mother_base_entity_id \
                         ORDER BY cm.server_version_epoch DESC \
                         LIMIT 1), '') AS full_name, \
              {gap_values} \
         FROM mother_edit me \
        INNER JOIN (SELECT av.*, \
                           ROW_NUMBER() OVER (PARTITION BY av.mother_base_entity_id \
                                              ORDER BY av.anc_date DESC, av.event_id DESC) AS visit_rank \
                      FROM anc_visit av) lv \
                ON lv.mother_base_entity_id = me.mother_base_entity_id \
               AND lv.visit_rank = 1 \
        WHERE lv.event_id > $1 \
          AND me.mobile_phone_number IS NOT NULL \
          AND me.provider_id NOT LIKE '%demo%' \
          AND me.mother_base_entity_id IN ( \
               SELECT mi.mother_base_entity_id \
                 FROM mother_identity mi \
                WHERE mi.mobile_phone_number IS NULL) \
          AND me.mother_base_entity_id IN (SELECT ar.mother_base_entity_id FROM anc_register ar) \
        ORDER BY me.mother_base_entity_id, me.event_id DESC) dedup \
 ORDER BY dedup.event_id";

const UPSERT_MESSAGE_STATS: &str = "\
INSERT INTO automated_message_stats \
       (message_template_id, message_type, success_count, failure_count, updated_at) \
VALUES ($1, $2, $3, $4, now()) \
ON CONFLICT (message_template_id, message_type) \
DO UPDATE SET success_count = automated_message_stats.success_count + EXCLUDED.success_count, \
              failure_count = automated_message_stats.failure_count + EXCLUDED.failure_count, \
              updated_at = now()";

/// The registry tables belong to the upstream sync platform; the stats table
/// is the only one this service owns.
const CREATE_STATS_TABLE: &str = "\
CREATE TABLE IF NOT EXISTS automated_message_stats ( \
    message_template_id VARCHAR(255) NOT NULL, \
    message_type        VARCHAR(64)  NOT NULL, \
    success_count       BIGINT       NOT NULL DEFAULT 0, \
    failure_count       BIGINT       NOT NULL DEFAULT 0, \
    updated_at          TIMESTAMPTZ  NOT NULL DEFAULT now(), \
    PRIMARY KEY (message_template_id, message_type))";

pub struct DatabaseClient {
    client: Client,
    visit_interval_in_days: i32,
    visit_reminder_interval_in_days: i32,
}

impl DatabaseClient {
    pub async fn connect(config: &Config) -> Result<Self, Error> {
        info!("Connecting to PostgreSQL database");

        let (client, connection) = tokio_postgres::connect(&config.database_url, NoTls)
            .await
            .map_err(|e| anyhow!("Failed to connect to database: {}", e))?;

        tokio::spawn(async move {
            if let Err(e) = connection.await {
                error!(error = %e, "Database connection terminated");
            }
        });

        client
            .batch_execute(CREATE_STATS_TABLE)
            .await
            .map_err(|e| anyhow!("Failed to ensure stats table: {}", e))?;

        info!("PostgreSQL connection established");

        Ok(Self {
            client,
            visit_interval_in_days: config.visit_interval_in_days,
            visit_reminder_interval_in_days: config.visit_reminder_interval_in_days,
        })
    }

    pub async fn health_check(&self) -> Result<(), Error> {
        self.client
            .query_one("SELECT 1", &[])
            .await
            .map_err(|e| anyhow!("Database health check failed: {}", e))?;

        Ok(())
    }

    fn row_to_candidate(row: &Row, kind: NotificationKind) -> Result<Candidate, Error> {
        let details = match kind {
            NotificationKind::Join => CandidateDetails::Enrollment,
            NotificationKind::VisitReminder => CandidateDetails::VisitReminder {
                latest_visit_number: row.try_get("latest_anc_visit_number")?,
            },
            NotificationKind::PregnancyGap => CandidateDetails::PregnancyGap {
                gap_values: row.try_get("gap_values")?,
            },
        };

        Ok(Candidate {
            event_id: row.try_get("event_id")?,
            mobile_phone_number: row.try_get("mobile_phone_number")?,
            full_name: row.try_get("full_name")?,
            details,
        })
    }
}

#[async_trait]
impl CandidateSource for DatabaseClient {
    async fn fetch_candidates(
        &self,
        source: SourceTable,
        kind: NotificationKind,
        last_event_id: i64,
    ) -> Result<Vec<Candidate>, Error> {
        let rows = match (kind, source) {
            (NotificationKind::Join, SourceTable::MotherIdentity) => {
                self.client
                    .query(JOIN_FROM_MOTHER_IDENTITY, &[&last_event_id])
                    .await
            }
            (NotificationKind::Join, SourceTable::MotherEdit) => {
                self.client
                    .query(JOIN_FROM_MOTHER_EDIT, &[&last_event_id])
                    .await
            }
            (NotificationKind::VisitReminder, SourceTable::MotherIdentity) => {
                self.client
                    .query(
                        VISIT_REMINDER_FROM_MOTHER_IDENTITY,
                        &[
                            &last_event_id,
                            &self.visit_interval_in_days,
                            &self.visit_reminder_interval_in_days,
                        ],
                    )
                    .await
            }
            (NotificationKind::VisitReminder, SourceTable::MotherEdit) => {
                self.client
                    .query(
                        VISIT_REMINDER_FROM_MOTHER_EDIT,
                        &[
                            &last_event_id,
                            &self.visit_interval_in_days,
                            &self.visit_reminder_interval_in_days,
                        ],
                    )
                    .await
            }
            (NotificationKind::PregnancyGap, SourceTable::MotherIdentity) => {
                self.client
                    .query(PREGNANCY_GAP_FROM_MOTHER_IDENTITY.as_str(), &[&last_event_id])
                    .await
            }
            (NotificationKind::PregnancyGap, SourceTable::MotherEdit) => {
                self.client
                    .query(PREGNANCY_GAP_FROM_MOTHER_EDIT.as_str(), &[&last_event_id])
                    .await
            }
        }
        .map_err(|e| {
            anyhow!(
                "Candidate query failed for {} / {}: {}",
                source.as_str(),
                kind.as_str(),
                e
            )
        })?;

        let candidates = rows
            .iter()
            .map(|row| Self::row_to_candidate(row, kind))
            .collect::<Result<Vec<_>, Error>>()?;

        debug!(
            source = source.as_str(),
            kind = kind.as_str(),
            last_event_id,
            count = candidates.len(),
            "Fetched candidates"
        );

        Ok(candidates)
    }
}

#[async_trait]
impl MessageStatsStore for DatabaseClient {
    async fn record(
        &self,
        message_template_id: &str,
        message_type: &str,
        success_delta: i64,
        failure_delta: i64,
    ) -> Result<(), Error> {
        if success_delta == 0 && failure_delta == 0 {
            return Ok(());
        }

        self.client
            .execute(
                UPSERT_MESSAGE_STATS,
                &[
                    &message_template_id,
                    &message_type,
                    &success_delta,
                    &failure_delta,
                ],
            )
            .await
            .map_err(|e| anyhow!("Failed to upsert message stats: {}", e))?;

        debug!(
            message_template_id,
            message_type, success_delta, failure_delta, "Message stats recorded"
        );

        Ok(())
    }
}
