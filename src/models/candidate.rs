use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SourceTable {
    MotherIdentity,
    MotherEdit,
}

impl SourceTable {
    pub const ALL: [SourceTable; 2] = [SourceTable::MotherIdentity, SourceTable::MotherEdit];

    pub fn as_str(&self) -> &'static str {
        match self {
            SourceTable::MotherIdentity => "mother_identity",
            SourceTable::MotherEdit => "mother_edit",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum NotificationKind {
    #[serde(rename = "join_notification")]
    Join,
    #[serde(rename = "anc_visit_reminder")]
    VisitReminder,
    #[serde(rename = "pregnancy_gap")]
    PregnancyGap,
}

impl NotificationKind {
    pub const ALL: [NotificationKind; 3] = [
        NotificationKind::Join,
        NotificationKind::VisitReminder,
        NotificationKind::PregnancyGap,
    ];

    /// Label used for stats rows, cursor keys, trigger routes, and logs.
    pub fn as_str(&self) -> &'static str {
        match self {
            NotificationKind::Join => "join_notification",
            NotificationKind::VisitReminder => "anc_visit_reminder",
            NotificationKind::PregnancyGap => "pregnancy_gap",
        }
    }

    pub fn from_str(s: &str) -> Option<Self> {
        match s {
            "join_notification" => Some(NotificationKind::Join),
            "anc_visit_reminder" => Some(NotificationKind::VisitReminder),
            "pregnancy_gap" => Some(NotificationKind::PregnancyGap),
            _ => None,
        }
    }
}

/// One registry row eligible for an outbound notification. `event_id` is the
/// monotonic identifier within its (source, kind) scan and feeds the cursor.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Candidate {
    pub event_id: i64,
    pub mobile_phone_number: String,
    pub full_name: String,
    pub details: CandidateDetails,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum CandidateDetails {
    Enrollment,
    VisitReminder { latest_visit_number: i64 },
    PregnancyGap { gap_values: String },
}
