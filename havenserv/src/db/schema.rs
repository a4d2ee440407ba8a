// Diesel schema definition for the Haven database
use diesel::allow_tables_to_appear_in_same_query;
use diesel::table;

table! {
    incidents (id) {
        id -> Text,
        subject_id -> Text,
        detected_phrase -> Text,
        confidence -> Nullable<Double>,
        source -> Text,
        severity_tier -> Text,
        status -> Text,
        created_at -> BigInt,
        escalated_at -> Nullable<BigInt>,
        escalated_by -> Nullable<Text>,
    }
}

table! {
    guardian_alerts (id) {
        id -> Text,
        kind -> Text,
        incident_id -> Nullable<Text>,
        session_id -> Nullable<Text>,
        subject_id -> Text,
        message -> Text,
        status -> Text,
        created_at -> BigInt,
    }
}

table! {
    emergency_payments (id) {
        id -> Text,
        incident_id -> Text,
        alert_id -> Text,
        reviewer_id -> Text,
        subject_id -> Text,
        amount_cents -> BigInt,
        currency -> Text,
        payment_status -> Text,
        case_status -> Text,
        created_at -> BigInt,
        paid_at -> Nullable<BigInt>,
    }
}

table! {
    cases (id) {
        id -> Text,
        reviewer_id -> Text,
        subject_id -> Text,
        incident_id -> Text,
        payment_id -> Text,
        detected_phrase -> Text,
        severity_tier -> Text,
        status -> Text,
        opened_at -> BigInt,
        closed_at -> Nullable<BigInt>,
    }
}

table! {
    sessions (id) {
        id -> Text,
        case_id -> Text,
        reviewer_id -> Text,
        subject_id -> Text,
        topic -> Text,
        scheduled_at -> BigInt,
        location_ref -> Text,
        status -> Text,
        payment_status -> Text,
        price_cents -> BigInt,
        notes -> Nullable<Text>,
        created_at -> BigInt,
    }
}

table! {
    session_progress (session_id) {
        session_id -> Text,
        subject_id -> Text,
        plan_level -> Integer,
        skills_level -> Integer,
        goals_level -> Integer,
        notes -> Nullable<Text>,
        updated_at -> BigInt,
    }
}

table! {
    reviewer_alerts (id) {
        id -> Text,
        reviewer_id -> Text,
        payment_id -> Text,
        incident_id -> Text,
        message -> Text,
        status -> Text,
        created_at -> BigInt,
    }
}

table! {
    guardian_links (guardian_id, subject_id) {
        guardian_id -> Text,
        subject_id -> Text,
        created_at -> BigInt,
    }
}

table! {
    group_sessions (id) {
        id -> Text,
        counselor_id -> Text,
        topic -> Text,
        description -> Nullable<Text>,
        starts_at -> BigInt,
        location_ref -> Text,
        meeting_id -> Text,
        status -> Text,
        created_at -> BigInt,
    }
}

table! {
    group_attendance (session_id, subject_id) {
        session_id -> Text,
        subject_id -> Text,
        joined_at -> BigInt,
    }
}

table! {
    audit_logs (id) {
        id -> Text,
        actor_id -> Nullable<Text>,
        event_type -> Text,
        event_data -> Text,
        created_at -> BigInt,
    }
}

allow_tables_to_appear_in_same_query!(
    incidents,
    guardian_alerts,
    emergency_payments,
    cases,
    sessions,
    session_progress,
    reviewer_alerts,
    guardian_links,
    group_sessions,
    group_attendance,
    audit_logs,
);
