// Database rows. Field order matches the column order in schema.rs.
use diesel::prelude::*;
use serde::Serialize;

use super::schema::*;

#[derive(Insertable, Queryable, Serialize, Clone, Debug)]
#[diesel(table_name = incidents)]
pub struct Incident {
    pub id: String,
    pub subject_id: String,
    pub detected_phrase: String,
    pub confidence: Option<f64>,
    pub source: String,               // "text", "audio", "system"
    pub severity_tier: String,        // "CRITICAL", "HIGH", "MEDIUM"
    pub status: String,               // "unreviewed", "escalated"
    pub created_at: i64,
    pub escalated_at: Option<i64>,
    pub escalated_by: Option<String>, // Reviewer who escalated
}

#[derive(Insertable, Queryable, Serialize, Clone, Debug)]
#[diesel(table_name = guardian_alerts)]
pub struct GuardianAlert {
    pub id: String,
    pub kind: String,                 // "emergency", "payment_reminder"
    pub incident_id: Option<String>,  // Unique; set for emergency alerts
    pub session_id: Option<String>,   // Set for payment reminders
    pub subject_id: String,
    pub message: String,
    pub status: String,               // "unread", "read"
    pub created_at: i64,
}

#[derive(Insertable, Queryable, Serialize, Clone, Debug)]
#[diesel(table_name = emergency_payments)]
pub struct EmergencyPayment {
    pub id: String,
    pub incident_id: String,          // Unique
    pub alert_id: String,
    pub reviewer_id: String,          // Reviewer who escalated
    pub subject_id: String,
    pub amount_cents: i64,
    pub currency: String,
    pub payment_status: String,       // "unpaid", "paid"
    pub case_status: String,          // "pending_payment", "ready"
    pub created_at: i64,
    pub paid_at: Option<i64>,
}

#[derive(Insertable, Queryable, Serialize, Clone, Debug)]
#[diesel(table_name = cases)]
pub struct Case {
    pub id: String,
    pub reviewer_id: String,
    pub subject_id: String,
    pub incident_id: String,          // Unique
    pub payment_id: String,
    pub detected_phrase: String,
    pub severity_tier: String,
    pub status: String,               // "open", "in_session", "closed"
    pub opened_at: i64,
    pub closed_at: Option<i64>,
}

#[derive(Insertable, Queryable, Serialize, Clone, Debug)]
#[diesel(table_name = sessions)]
pub struct Session {
    pub id: String,
    pub case_id: String,
    pub reviewer_id: String,
    pub subject_id: String,
    pub topic: String,
    pub scheduled_at: i64,
    pub location_ref: String,         // Validated meeting link
    pub status: String,               // "scheduled", "completed", "cancelled"
    pub payment_status: String,       // "paid", "unpaid"
    pub price_cents: i64,
    pub notes: Option<String>,
    pub created_at: i64,
}

#[derive(Insertable, Queryable, Serialize, Clone, Debug, PartialEq)]
#[diesel(table_name = session_progress)]
pub struct SessionProgress {
    pub session_id: String,
    pub subject_id: String,
    pub plan_level: i32,
    pub skills_level: i32,
    pub goals_level: i32,
    pub notes: Option<String>,
    pub updated_at: i64,
}

#[derive(Insertable, Queryable, Serialize, Clone, Debug)]
#[diesel(table_name = reviewer_alerts)]
pub struct ReviewerAlert {
    pub id: String,
    pub reviewer_id: String,
    pub payment_id: String,
    pub incident_id: String,
    pub message: String,
    pub status: String,
    pub created_at: i64,
}

#[derive(Insertable, Queryable, Serialize, Clone, Debug)]
#[diesel(table_name = guardian_links)]
pub struct GuardianLink {
    pub guardian_id: String,
    pub subject_id: String,
    pub created_at: i64,
}

#[derive(Insertable, Queryable, Serialize, Clone, Debug)]
#[diesel(table_name = group_sessions)]
pub struct GroupSession {
    pub id: String,
    pub counselor_id: String,
    pub topic: String,
    pub description: Option<String>,
    pub starts_at: i64,
    pub location_ref: String,
    pub meeting_id: String,
    pub status: String,               // "scheduled", "completed"
    pub created_at: i64,
}

#[derive(Insertable, Queryable, Serialize, Clone, Debug)]
#[diesel(table_name = group_attendance)]
pub struct GroupAttendance {
    pub session_id: String,
    pub subject_id: String,
    pub joined_at: i64,
}

#[derive(Insertable, Queryable, Serialize, Clone, Debug)]
#[diesel(table_name = audit_logs)]
pub struct AuditLog {
    pub id: String,
    pub actor_id: Option<String>,
    pub event_type: String,           // "escalate", "payment_settled", "case_open", ...
    pub event_data: String,           // JSON string with event details
    pub created_at: i64,
}
