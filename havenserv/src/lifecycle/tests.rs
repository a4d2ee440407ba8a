use std::sync::Arc;

use diesel::RunQueryDsl;
use haven::auth::{Principal, Role};
use haven::clock::ManualClock;
use haven::logger::LoggerHandle;
use haven::model::{PaymentStatus, SeverityTier};
use haven::payment::{HostedCheckout, PaymentRef, WebhookEvent};
use haven::policy::LifecyclePolicy;
use haven::HavenError;

use super::*;
use crate::db::errors::map_store_error;
use crate::db::init::{init_db, run_migrations};
use crate::db::{Case, Incident};

const T0: i64 = 1_700_000_000;
const DAY: i64 = 86_400;
const ZOOM: &str = "https://zoom.us/j/1234567890";

struct Fixture {
    lifecycle: Lifecycle,
    clock: Arc<ManualClock>,
}

fn fixture() -> Fixture {
    fixture_with(LifecyclePolicy::default())
}

fn fixture_with(policy: LifecyclePolicy) -> Fixture {
    let db = init_db(":memory:").unwrap();
    run_migrations(&db, &policy).unwrap();
    let clock = Arc::new(ManualClock::at(T0));
    let payments = Arc::new(
        HostedCheckout::new("https://pay.example.org/checkout", "checkout-key", LoggerHandle::null()).unwrap(),
    );
    Fixture {
        lifecycle: Lifecycle::new(db, policy, clock.clone(), payments),
        clock,
    }
}

fn psy(id: &str) -> Principal {
    Principal::new(id, Role::Psychologist)
}

fn parent() -> Principal {
    Principal::new("parent-1", Role::Parent)
}

fn admin() -> Principal {
    Principal::new("admin", Role::Admin)
}

fn detection(subject: &str, phrase: &str) -> DetectionInput {
    DetectionInput {
        subject_id: subject.to_string(),
        detected_phrase: phrase.to_string(),
        confidence: None,
        source: None,
    }
}

fn draft(topic: &str, at: i64, link: &str) -> SessionDraft {
    SessionDraft {
        topic: topic.to_string(),
        scheduled_at: at,
        location_ref: link.to_string(),
        notes: None,
    }
}

fn paid_event(reference: PaymentRef) -> WebhookEvent {
    WebhookEvent {
        reference,
        status: PaymentStatus::Paid,
    }
}

/// Intake, escalate and settle an incident for `reviewer`.
fn paid_incident(l: &Lifecycle, reviewer: &Principal, subject: &str) -> Incident {
    let incident = l.intake(reviewer, detection(subject, "I feel depressed")).unwrap();
    let escalation = l.escalate(reviewer, &incident.id).unwrap();
    l.settle(paid_event(PaymentRef::Emergency(escalation.payment.id))).unwrap();
    incident
}

fn open_case_for(l: &Lifecycle, reviewer: &Principal, subject: &str) -> Case {
    let incident = paid_incident(l, reviewer, subject);
    l.open_case(reviewer, &incident.id).unwrap()
}

#[test]
fn escalating_twice_conflicts_and_leaves_one_alert_and_record() {
    let f = fixture();
    let l = &f.lifecycle;
    let reviewer = psy("psy-1");
    let incident = l.intake(&reviewer, detection("teen-1", "panic at school")).unwrap();

    let first = l.escalate(&reviewer, &incident.id).unwrap();
    assert_eq!(first.payment.amount_cents, 2900);
    assert_eq!(first.payment.payment_status, "unpaid");
    assert_eq!(first.payment.case_status, "pending_payment");

    let second = l.escalate(&reviewer, &incident.id);
    assert!(matches!(second, Err(HavenError::Conflict(_))));
    let other = l.escalate(&psy("psy-2"), &incident.id);
    assert!(matches!(other, Err(HavenError::Conflict(_))));

    let mut conn = l.conn().unwrap();
    assert_eq!(db::count_guardian_alerts_for_incident(&mut conn, &incident.id).unwrap(), 1);
    let record = db::get_emergency_payment_by_incident(&mut conn, &incident.id).unwrap().unwrap();
    assert_eq!(record.id, first.payment.id);
    let stored_incident = db::get_incident(&mut conn, &incident.id).unwrap().unwrap();
    assert_eq!(stored_incident.status, "escalated");
    assert_eq!(stored_incident.escalated_by.as_deref(), Some("psy-1"));
}

#[test]
fn failed_record_insert_rolls_back_the_guardian_alert() {
    let f = fixture();
    let l = &f.lifecycle;
    let reviewer = psy("psy-1");
    let incident = l.intake(&reviewer, detection("teen-1", "I want to die")).unwrap();

    {
        let mut conn = l.conn().unwrap();
        diesel::sql_query(
            "CREATE TEMP TRIGGER reject_emergency_payment BEFORE INSERT ON emergency_payments \
             BEGIN SELECT RAISE(ABORT, 'UNIQUE constraint failed: emergency_payments.incident_id'); END",
        )
        .execute(&mut *conn)
        .unwrap();
    }

    let err = l.escalate(&reviewer, &incident.id).unwrap_err();
    assert!(matches!(err, HavenError::Conflict(ref m) if m == "incident already escalated"));

    {
        let mut conn = l.conn().unwrap();
        assert_eq!(db::count_guardian_alerts_for_incident(&mut conn, &incident.id).unwrap(), 0);
        assert!(db::get_emergency_payment_by_incident(&mut conn, &incident.id).unwrap().is_none());
        assert_eq!(db::get_incident(&mut conn, &incident.id).unwrap().unwrap().status, "unreviewed");
        diesel::sql_query("DROP TRIGGER reject_emergency_payment")
            .execute(&mut *conn)
            .unwrap();
    }

    let escalation = l.escalate(&reviewer, &incident.id).unwrap();
    assert_eq!(escalation.payment.incident_id, incident.id);
}

#[test]
fn escalation_requires_reviewer_and_known_incident() {
    let f = fixture();
    let l = &f.lifecycle;
    assert!(matches!(l.escalate(&psy("psy-1"), "missing"), Err(HavenError::NotFound(_))));

    let incident = l.intake(&admin(), detection("teen-1", "panic")).unwrap();
    assert!(matches!(l.escalate(&parent(), &incident.id), Err(HavenError::Forbidden(_))));
    assert!(matches!(l.escalate(&admin(), &incident.id), Err(HavenError::Forbidden(_))));
}

#[test]
fn open_case_requires_settled_payment() {
    let f = fixture();
    let l = &f.lifecycle;
    let reviewer = psy("psy-1");
    let incident = l.intake(&reviewer, detection("teen-1", "I want to die")).unwrap();

    assert!(matches!(l.open_case(&reviewer, &incident.id), Err(HavenError::Precondition(_))));
    l.escalate(&reviewer, &incident.id).unwrap();
    assert!(matches!(l.open_case(&reviewer, &incident.id), Err(HavenError::Precondition(_))));
    assert!(!l.is_paid(&incident.id).unwrap());

    let mut conn = l.conn().unwrap();
    let direct = Case {
        id: "forced".into(),
        reviewer_id: "psy-1".into(),
        subject_id: "teen-1".into(),
        incident_id: incident.id.clone(),
        payment_id: "none".into(),
        detected_phrase: incident.detected_phrase.clone(),
        severity_tier: incident.severity_tier.clone(),
        status: "open".into(),
        opened_at: T0,
        closed_at: None,
    };
    let err = db::insert_case(&mut conn, &direct).map_err(map_store_error).unwrap_err();
    assert!(matches!(err, HavenError::Precondition(_)));
}

#[test]
fn only_the_escalating_reviewer_opens_the_case() {
    let f = fixture();
    let l = &f.lifecycle;
    let incident = paid_incident(l, &psy("psy-1"), "teen-1");

    assert!(matches!(l.open_case(&psy("psy-2"), &incident.id), Err(HavenError::Forbidden(_))));
    let case = l.open_case(&psy("psy-1"), &incident.id).unwrap();
    assert_eq!(case.status, "open");
    assert!(matches!(l.open_case(&psy("psy-1"), &incident.id), Err(HavenError::Conflict(_))));
}

#[test]
fn open_cases_never_exceed_the_cap() {
    let f = fixture_with(LifecyclePolicy {
        max_open_cases: 2,
        ..LifecyclePolicy::default()
    });
    let l = &f.lifecycle;
    let reviewer = psy("psy-1");

    let first = open_case_for(l, &reviewer, "teen-1");
    open_case_for(l, &reviewer, "teen-2");
    let third = paid_incident(l, &reviewer, "teen-3");
    assert!(matches!(l.open_case(&reviewer, &third.id), Err(HavenError::Conflict(_))));

    // Another reviewer has their own budget
    open_case_for(l, &psy("psy-2"), "teen-4");

    l.close_case(&reviewer, &first.id).unwrap();
    l.open_case(&reviewer, &third.id).unwrap();

    let board = l.list_cases(&reviewer).unwrap();
    assert_eq!(board.open.len(), 2);
    assert_eq!(board.closed.len(), 1);
}

#[test]
fn store_trigger_rejects_cases_over_the_cap() {
    let f = fixture_with(LifecyclePolicy {
        max_open_cases: 1,
        ..LifecyclePolicy::default()
    });
    let l = &f.lifecycle;
    let reviewer = psy("psy-1");
    open_case_for(l, &reviewer, "teen-1");
    let extra = paid_incident(l, &reviewer, "teen-2");

    let mut conn = l.conn().unwrap();
    let record = db::get_emergency_payment_by_incident(&mut conn, &extra.id).unwrap().unwrap();
    let bypass = Case {
        id: "bypass".into(),
        reviewer_id: "psy-1".into(),
        subject_id: "teen-2".into(),
        incident_id: extra.id.clone(),
        payment_id: record.id,
        detected_phrase: extra.detected_phrase.clone(),
        severity_tier: extra.severity_tier.clone(),
        status: "open".into(),
        opened_at: T0,
        closed_at: None,
    };
    let err = db::insert_case(&mut conn, &bypass).map_err(map_store_error).unwrap_err();
    assert!(matches!(err, HavenError::Conflict(_)));
    assert_eq!(db::count_active_cases(&mut conn, "psy-1").unwrap(), 1);
}

#[test]
fn close_case_waits_for_scheduled_session() {
    let f = fixture();
    let l = &f.lifecycle;
    let reviewer = psy("psy-1");
    let case = open_case_for(l, &reviewer, "teen-1");
    let session = l.create_session(&reviewer, &case.id, draft("Intake", T0 + DAY, ZOOM)).unwrap();

    assert!(matches!(l.close_case(&reviewer, &case.id), Err(HavenError::Precondition(_))));

    l.delete_session(&reviewer, &session.id).unwrap();
    let closed = l.close_case(&reviewer, &case.id).unwrap();
    assert_eq!(closed.status, "closed");
    assert_eq!(closed.closed_at, Some(T0));

    assert!(matches!(l.close_case(&reviewer, &case.id), Err(HavenError::Precondition(_))));
    let on_closed = l.create_session(&reviewer, &case.id, draft("Follow-up", T0 + DAY, ZOOM));
    assert!(matches!(on_closed, Err(HavenError::Precondition(_))));
}

#[test]
fn closing_another_reviewers_case_is_forbidden() {
    let f = fixture();
    let l = &f.lifecycle;
    let case = open_case_for(l, &psy("psy-1"), "teen-1");
    assert!(matches!(l.close_case(&psy("psy-2"), &case.id), Err(HavenError::Forbidden(_))));
    assert!(matches!(l.close_case(&psy("psy-1"), "nope"), Err(HavenError::NotFound(_))));
}

#[test]
fn completion_is_gated_by_the_private_grace_interval() {
    let f = fixture();
    let l = &f.lifecycle;
    let reviewer = psy("psy-1");
    let case = open_case_for(l, &reviewer, "teen-1");
    let starts = T0 + DAY;
    let session = l.create_session(&reviewer, &case.id, draft("Intake", starts, ZOOM)).unwrap();

    let early = l.mark_completed_at(&reviewer, &session.id, starts + 2 * 3600 - 1);
    assert!(matches!(early, Err(HavenError::Precondition(_))));

    let done = l.mark_completed_at(&reviewer, &session.id, starts + 2 * 3600).unwrap();
    assert_eq!(done.status, "completed");

    let again = l.mark_completed_at(&reviewer, &session.id, starts + 3 * 3600);
    assert!(matches!(again, Err(HavenError::Precondition(_))));
}

#[test]
fn one_scheduled_session_per_case_and_later_sessions_start_unpaid() {
    let f = fixture();
    let l = &f.lifecycle;
    let reviewer = psy("psy-1");
    let case = open_case_for(l, &reviewer, "teen-1");

    let intake = l.create_session(&reviewer, &case.id, draft("Intake", T0 + DAY, ZOOM)).unwrap();
    assert_eq!(intake.payment_status, "paid");
    assert_eq!(intake.price_cents, 2900);

    let second = l.create_session(&reviewer, &case.id, draft("Second", T0 + 2 * DAY, ZOOM));
    assert!(matches!(second, Err(HavenError::Conflict(_))));

    f.clock.set(T0 + DAY + 2 * 3600);
    l.mark_completed(&reviewer, &intake.id).unwrap();

    let follow_up = l.create_session(&reviewer, &case.id, draft("Follow-up", T0 + 3 * DAY, ZOOM)).unwrap();
    assert_eq!(follow_up.payment_status, "unpaid");
    assert!(!l.is_session_paid(&follow_up.id).unwrap());

    let listing = l.list_sessions(&reviewer, &case.id).unwrap();
    assert_eq!(listing.upcoming.len(), 1);
    assert_eq!(listing.completed.len(), 1);
    assert_eq!(listing.completed[0].id, intake.id);
}

#[test]
fn meeting_links_are_validated_on_create_and_update() {
    let f = fixture();
    let l = &f.lifecycle;
    let reviewer = psy("psy-1");
    let case = open_case_for(l, &reviewer, "teen-1");

    let bad = l.create_session(&reviewer, &case.id, draft("Intake", T0 + DAY, "https://meet.google.com/abc"));
    assert!(matches!(bad, Err(HavenError::Validation(_))));
    let blank = l.create_session(&reviewer, &case.id, draft("  ", T0 + DAY, ZOOM));
    assert!(matches!(blank, Err(HavenError::Validation(_))));

    let session = l.create_session(&reviewer, &case.id, draft("Intake", T0 + DAY, ZOOM)).unwrap();
    let bad_update = l.update_session(&reviewer, &session.id, draft("Intake", T0 + DAY, "https://meet.google.com/abc"));
    assert!(matches!(bad_update, Err(HavenError::Validation(_))));

    let moved = l
        .update_session(&reviewer, &session.id, draft("Intake (moved)", T0 + 2 * DAY, "https://us02web.zoom.us/j/42"))
        .unwrap();
    assert_eq!(moved.topic, "Intake (moved)");
    assert_eq!(moved.scheduled_at, T0 + 2 * DAY);
    assert_eq!(moved.payment_status, "paid");
}

#[test]
fn payment_reminders_only_for_unpaid_sessions() {
    let f = fixture();
    let l = &f.lifecycle;
    let reviewer = psy("psy-1");
    let case = open_case_for(l, &reviewer, "teen-1");
    let intake = l.create_session(&reviewer, &case.id, draft("Intake", T0, ZOOM)).unwrap();
    assert!(matches!(l.send_payment_reminder(&reviewer, &intake.id), Err(HavenError::Precondition(_))));

    f.clock.set(T0 + 2 * 3600);
    l.mark_completed(&reviewer, &intake.id).unwrap();
    let follow_up = l.create_session(&reviewer, &case.id, draft("Follow-up", T0 + DAY, ZOOM)).unwrap();

    let alert = l.send_payment_reminder(&reviewer, &follow_up.id).unwrap();
    assert_eq!(alert.kind, "payment_reminder");
    assert_eq!(alert.session_id.as_deref(), Some(follow_up.id.as_str()));
    assert!(alert.message.contains("Follow-up"));
    assert_eq!(l.list_sessions(&reviewer, &case.id).unwrap().upcoming[0].payment_status, "unpaid");

    l.settle(paid_event(PaymentRef::Session(follow_up.id.clone()))).unwrap();
    assert!(l.is_session_paid(&follow_up.id).unwrap());
    assert!(matches!(l.send_payment_reminder(&reviewer, &follow_up.id), Err(HavenError::Precondition(_))));
}

#[test]
fn settlement_is_idempotent_and_notifies_reviewer_once() {
    let f = fixture();
    let l = &f.lifecycle;
    let reviewer = psy("psy-1");
    let incident = l.intake(&reviewer, detection("teen-1", "panic")).unwrap();
    let escalation = l.escalate(&reviewer, &incident.id).unwrap();
    let reference = PaymentRef::Emergency(escalation.payment.id.clone());

    assert!(l.settle(paid_event(reference.clone())).unwrap().changed);
    assert!(!l.settle(paid_event(reference.clone())).unwrap().changed);
    assert!(l.is_paid(&incident.id).unwrap());

    let alerts = l.reviewer_alerts(&reviewer).unwrap();
    assert_eq!(alerts.len(), 1);
    assert_eq!(alerts[0].incident_id, incident.id);
    let read = l.mark_reviewer_alert_read(&reviewer, &alerts[0].id).unwrap();
    assert_eq!(read.status, "read");
    assert!(matches!(l.mark_reviewer_alert_read(&psy("psy-2"), &alerts[0].id), Err(HavenError::Forbidden(_))));

    let unpaid = WebhookEvent {
        reference,
        status: PaymentStatus::Unpaid,
    };
    assert!(matches!(l.settle(unpaid), Err(HavenError::Validation(_))));
    assert!(matches!(
        l.settle(paid_event(PaymentRef::Emergency("missing".into()))),
        Err(HavenError::NotFound(_))
    ));
}

#[test]
fn checkout_is_for_linked_guardians_and_unpaid_references() {
    let f = fixture();
    let l = &f.lifecycle;
    let reviewer = psy("psy-1");
    let incident = l.intake(&reviewer, detection("teen-1", "overdose")).unwrap();
    let escalation = l.escalate(&reviewer, &incident.id).unwrap();
    let reference = PaymentRef::Emergency(escalation.payment.id.clone());

    assert!(matches!(l.request_checkout(&parent(), reference.clone()), Err(HavenError::Forbidden(_))));
    assert!(matches!(l.request_checkout(&reviewer, reference.clone()), Err(HavenError::Forbidden(_))));

    l.link_guardian(
        &admin(),
        GuardianLinkInput {
            guardian_id: "parent-1".into(),
            subject_id: "teen-1".into(),
        },
    )
    .unwrap();
    let checkout = l.request_checkout(&parent(), reference.clone()).unwrap();
    assert_eq!(checkout.amount_cents, 2900);
    assert!(checkout.url.contains("ledger=emergency"));
    assert!(checkout.url.contains(&escalation.payment.id));

    l.settle(paid_event(reference.clone())).unwrap();
    assert!(matches!(l.request_checkout(&parent(), reference), Err(HavenError::Conflict(_))));
}

#[test]
fn guardian_inbox_shows_linked_subjects_only() {
    let f = fixture();
    let l = &f.lifecycle;
    let reviewer = psy("psy-1");
    l.link_guardian(
        &admin(),
        GuardianLinkInput {
            guardian_id: "parent-1".into(),
            subject_id: "teen-1".into(),
        },
    )
    .unwrap();
    let duplicate = l.link_guardian(
        &admin(),
        GuardianLinkInput {
            guardian_id: "parent-1".into(),
            subject_id: "teen-1".into(),
        },
    );
    assert!(matches!(duplicate, Err(HavenError::Conflict(_))));

    let mine = l.intake(&reviewer, detection("teen-1", "self-harm")).unwrap();
    let theirs = l.intake(&reviewer, detection("teen-2", "self-harm")).unwrap();
    l.escalate(&reviewer, &mine.id).unwrap();
    let other = l.escalate(&reviewer, &theirs.id).unwrap();

    let alerts = l.guardian_alerts(&parent()).unwrap();
    assert_eq!(alerts.len(), 1);
    assert_eq!(alerts[0].incident_id.as_deref(), Some(mine.id.as_str()));
    assert!(alerts[0].message.contains("29.00 USD"));

    assert_eq!(l.mark_guardian_alert_read(&parent(), &alerts[0].id).unwrap().status, "read");
    assert!(matches!(
        l.mark_guardian_alert_read(&parent(), &other.alert.id),
        Err(HavenError::Forbidden(_))
    ));
}

#[test]
fn risk_queue_sorts_by_tier_then_newest() {
    let f = fixture();
    let l = &f.lifecycle;
    let reviewer = psy("psy-1");

    let medium = l.intake(&reviewer, detection("teen-1", "bad day")).unwrap();
    f.clock.advance(10);
    let critical_old = l.intake(&reviewer, detection("teen-2", "thinking about suicide")).unwrap();
    f.clock.advance(10);
    let high = l
        .intake(
            &reviewer,
            DetectionInput {
                confidence: Some(0.9),
                ..detection("teen-3", "rough week")
            },
        )
        .unwrap();
    f.clock.advance(10);
    let critical_new = l.intake(&reviewer, detection("teen-4", "I want to die")).unwrap();

    assert_eq!(high.severity_tier, SeverityTier::High.as_str());
    let queue: Vec<String> = l.risk_queue(&reviewer, false).unwrap().into_iter().map(|i| i.id).collect();
    assert_eq!(queue, vec![critical_new.id.clone(), critical_old.id, high.id, medium.id]);

    l.escalate(&reviewer, &critical_new.id).unwrap();
    assert_eq!(l.risk_queue(&reviewer, false).unwrap().len(), 3);
    assert_eq!(l.risk_queue(&reviewer, true).unwrap().len(), 4);
    assert!(matches!(l.risk_queue(&parent(), false), Err(HavenError::Forbidden(_))));
}

#[test]
fn risk_queue_keeps_old_critical_incidents_past_the_limit() {
    let f = fixture();
    let l = &f.lifecycle;
    let reviewer = psy("psy-1");

    let critical = l.intake(&reviewer, detection("teen-0", "I want to die")).unwrap();
    for i in 0..super::incidents::QUEUE_LIMIT {
        f.clock.advance(1);
        l.intake(&reviewer, detection(&format!("teen-{}", i + 1), "bad day")).unwrap();
    }

    let queue = l.risk_queue(&reviewer, false).unwrap();
    assert_eq!(queue.len() as i64, super::incidents::QUEUE_LIMIT);
    assert_eq!(queue[0].id, critical.id);
    assert_eq!(queue[0].severity_tier, SeverityTier::Critical.as_str());
    assert_eq!(queue[1].created_at, T0 + super::incidents::QUEUE_LIMIT);
}

#[test]
fn intake_rejects_blank_and_out_of_range_detections() {
    let f = fixture();
    let l = &f.lifecycle;
    let reviewer = psy("psy-1");
    assert!(matches!(l.intake(&reviewer, detection("teen-1", "   ")), Err(HavenError::Validation(_))));
    let bad_confidence = DetectionInput {
        confidence: Some(1.5),
        ..detection("teen-1", "panic")
    };
    assert!(matches!(l.intake(&reviewer, bad_confidence), Err(HavenError::Validation(_))));
}

#[test]
fn progress_is_recorded_for_completed_sessions_only() {
    let f = fixture();
    let l = &f.lifecycle;
    let reviewer = psy("psy-1");
    let case = open_case_for(l, &reviewer, "teen-1");
    let session = l.create_session(&reviewer, &case.id, draft("Intake", T0, ZOOM)).unwrap();
    let input = ProgressInput {
        plan_level: 2,
        skills_level: 3,
        goals_level: 1,
        notes: Some("good start".into()),
    };

    assert!(matches!(l.save_progress(&reviewer, &session.id, input.clone()), Err(HavenError::Precondition(_))));

    f.clock.set(T0 + 2 * 3600);
    l.mark_completed(&reviewer, &session.id).unwrap();
    let saved = l.save_progress(&reviewer, &session.id, input.clone()).unwrap();
    assert!(saved.created);

    let revised = l
        .save_progress(&reviewer, &session.id, ProgressInput { goals_level: 4, ..input.clone() })
        .unwrap();
    assert!(!revised.created);
    assert_eq!(revised.progress.goals_level, 4);

    let too_high = ProgressInput { plan_level: 6, ..input };
    assert!(matches!(l.save_progress(&reviewer, &session.id, too_high), Err(HavenError::Validation(_))));
}

#[test]
fn group_sessions_follow_the_group_grace_and_track_attendance() {
    let f = fixture();
    let l = &f.lifecycle;
    let counselor = Principal::new("counselor-1", Role::Counselor);
    let group_draft = GroupSessionDraft {
        topic: "Friday check-in".into(),
        description: Some("open circle".into()),
        starts_at: T0,
        location_ref: "https://zoom.us/j/987654".into(),
    };

    let session = l.create_group_session(&counselor, group_draft.clone()).unwrap();
    assert_eq!(session.meeting_id, "987654");
    assert!(matches!(
        l.create_group_session(&counselor, group_draft.clone()),
        Err(HavenError::Conflict(_))
    ));
    assert!(matches!(l.create_group_session(&psy("psy-1"), group_draft.clone()), Err(HavenError::Forbidden(_))));

    assert!(l.record_attendance(&counselor, &session.id, "teen-1").unwrap());
    assert!(!l.record_attendance(&counselor, &session.id, "teen-1").unwrap());
    assert!(l.record_attendance(&admin(), &session.id, "teen-2").unwrap());

    f.clock.set(T0 + 3599);
    assert!(matches!(l.complete_group_session(&counselor, &session.id), Err(HavenError::Precondition(_))));
    f.clock.set(T0 + 3600);
    assert_eq!(l.complete_group_session(&counselor, &session.id).unwrap().status, "completed");
    assert!(matches!(
        l.update_group_session(&counselor, &session.id, group_draft.clone()),
        Err(HavenError::Precondition(_))
    ));

    let next = l.create_group_session(&counselor, GroupSessionDraft { starts_at: T0 + 7 * DAY, ..group_draft }).unwrap();
    let listing = l.list_group_sessions(&counselor).unwrap();
    assert_eq!(listing.len(), 2);
    assert_eq!(listing[0].session.id, next.id);
    assert_eq!(listing[1].attendees, 2);

    l.delete_group_session(&counselor, &next.id).unwrap();
    assert_eq!(l.list_group_sessions(&counselor).unwrap().len(), 1);
}

#[test]
fn admin_overview_and_audit_trail() {
    let f = fixture();
    let l = &f.lifecycle;
    let reviewer = psy("psy-1");
    let case = open_case_for(l, &reviewer, "teen-1");
    l.create_session(&reviewer, &case.id, draft("Intake", T0 + DAY, ZOOM)).unwrap();
    l.intake(&reviewer, detection("teen-2", "panic")).unwrap();

    let overview = l.overview(&admin()).unwrap();
    assert_eq!(overview.unreviewed_incidents, 1);
    assert_eq!(overview.escalated_incidents, 1);
    assert_eq!(overview.open_cases, 1);
    assert_eq!(overview.scheduled_sessions, 1);
    assert_eq!(overview.unpaid_emergencies, 0);
    assert!(matches!(l.overview(&reviewer), Err(HavenError::Forbidden(_))));

    let escalations = l.audit_log(&admin(), Some("escalate"), 50).unwrap();
    assert_eq!(escalations.len(), 1);
    assert_eq!(escalations[0].actor_id.as_deref(), Some("psy-1"));
    assert!(l.audit_log(&admin(), None, 50).unwrap().len() >= 5);
}

#[test]
fn crisis_phrase_runs_the_whole_lifecycle() {
    let f = fixture();
    let l = &f.lifecycle;
    let reviewer = psy("psy-1");

    let incident = l.intake(&reviewer, detection("teen-1", "I want to die")).unwrap();
    assert_eq!(incident.severity_tier, "CRITICAL");

    let escalation = l.escalate(&reviewer, &incident.id).unwrap();
    assert!(!l.is_paid(&incident.id).unwrap());
    l.settle(paid_event(PaymentRef::Emergency(escalation.payment.id))).unwrap();
    assert!(l.is_paid(&incident.id).unwrap());

    let case = l.open_case(&reviewer, &incident.id).unwrap();
    let starts = T0 + DAY;
    let session = l.create_session(&reviewer, &case.id, draft("Intake", starts, ZOOM)).unwrap();
    assert_eq!(session.payment_status, "paid");
    assert_eq!(l.list_cases(&reviewer).unwrap().open[0].status, "in_session");

    f.clock.set(starts + 3600);
    assert!(matches!(l.mark_completed(&reviewer, &session.id), Err(HavenError::Precondition(_))));
    assert!(matches!(l.close_case(&reviewer, &case.id), Err(HavenError::Precondition(_))));

    f.clock.set(starts + 2 * 3600);
    l.mark_completed(&reviewer, &session.id).unwrap();
    assert_eq!(l.list_cases(&reviewer).unwrap().open[0].status, "open");

    let closed = l.close_case(&reviewer, &case.id).unwrap();
    assert_eq!(closed.status, "closed");
    let board = l.list_cases(&reviewer).unwrap();
    assert!(board.open.is_empty());
    assert_eq!(board.closed.len(), 1);
}
