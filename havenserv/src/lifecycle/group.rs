use diesel::sqlite::SqliteConnection;
use serde::{Deserialize, Serialize};

use haven::auth::{Principal, Role};
use haven::meeting::MeetingLink;
use haven::model::{GroupSessionStatus, SessionEvent};
use haven::policy::SessionKind;
use haven::HavenError;

use super::{new_id, stored, Lifecycle};
use crate::db::{self, immediate, GroupAttendance, GroupSession, StoreResultExt};

const GROUP_PENDING: &str = "you already have a scheduled group session";

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct GroupSessionDraft {
    pub topic: String,
    #[serde(default)]
    pub description: Option<String>,
    pub starts_at: i64,
    pub location_ref: String,
}

impl GroupSessionDraft {
    fn validate(&self) -> Result<MeetingLink, HavenError> {
        if self.topic.trim().is_empty() {
            return Err(HavenError::validation("topic is required"));
        }
        MeetingLink::parse(&self.location_ref)
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct GroupSessionSummary {
    #[serde(flatten)]
    pub session: GroupSession,
    pub attendees: usize,
}

fn owned_group_session(
    conn: &mut SqliteConnection,
    principal: &Principal,
    session_id: &str,
) -> Result<GroupSession, HavenError> {
    let session = db::get_group_session(conn, session_id)
        .store()?
        .ok_or_else(|| HavenError::not_found("group session"))?;
    if session.counselor_id != principal.id {
        return Err(HavenError::forbidden("group session belongs to another counselor"));
    }
    Ok(session)
}

impl Lifecycle {
    pub fn create_group_session(&self, principal: &Principal, draft: GroupSessionDraft) -> Result<GroupSession, HavenError> {
        principal.require(&[Role::Counselor])?;
        let link = draft.validate()?;
        let now = self.now();

        let mut conn = self.conn()?;
        let session = immediate(&mut conn, |conn| {
            if db::scheduled_group_session(conn, &principal.id).store()?.is_some() {
                return Err(HavenError::conflict(GROUP_PENDING));
            }
            let session = GroupSession {
                id: new_id(),
                counselor_id: principal.id.clone(),
                topic: draft.topic.trim().to_string(),
                description: draft.description.clone(),
                starts_at: draft.starts_at,
                location_ref: link.url.clone(),
                meeting_id: link.meeting_id.clone(),
                status: GroupSessionStatus::Scheduled.as_str().to_string(),
                created_at: now,
            };
            db::insert_group_session(conn, &session).unique_as(GROUP_PENDING)?;
            self.audit(
                conn,
                Some(&principal.id),
                "group_session_create",
                serde_json::json!({"session_id": session.id}),
            );
            Ok(session)
        })?;

        tracing::info!("Group session {} scheduled by {}", session.id, principal.id);
        Ok(session)
    }

    pub fn update_group_session(
        &self,
        principal: &Principal,
        session_id: &str,
        draft: GroupSessionDraft,
    ) -> Result<GroupSession, HavenError> {
        principal.require(&[Role::Counselor])?;
        let link = draft.validate()?;

        let mut conn = self.conn()?;
        immediate(&mut conn, |conn| {
            let session = owned_group_session(conn, principal, session_id)?;
            stored::<GroupSessionStatus>("group session status", &session.status)?.apply(SessionEvent::Edit)?;

            db::update_group_session_details(
                conn,
                session_id,
                draft.topic.trim(),
                draft.description.as_deref(),
                draft.starts_at,
                &link.url,
                &link.meeting_id,
            )
            .store()?;
            db::get_group_session(conn, session_id)
                .store()?
                .ok_or_else(|| HavenError::not_found("group session"))
        })
    }

    pub fn delete_group_session(&self, principal: &Principal, session_id: &str) -> Result<(), HavenError> {
        principal.require(&[Role::Counselor])?;

        let mut conn = self.conn()?;
        immediate(&mut conn, |conn| {
            let session = owned_group_session(conn, principal, session_id)?;
            stored::<GroupSessionStatus>("group session status", &session.status)?.apply(SessionEvent::Delete)?;
            db::delete_group_session(conn, session_id).store()?;
            Ok(())
        })
    }

    /// Complete a group session no earlier than its start plus the group grace interval.
    pub fn complete_group_session(&self, principal: &Principal, session_id: &str) -> Result<GroupSession, HavenError> {
        principal.require(&[Role::Counselor])?;
        let now = self.now();

        let mut conn = self.conn()?;
        immediate(&mut conn, |conn| {
            let mut session = owned_group_session(conn, principal, session_id)?;
            let not_before = self
                .policy
                .grace
                .completion_allowed_at(SessionKind::Group, session.starts_at);
            let next = stored::<GroupSessionStatus>("group session status", &session.status)?
                .apply(SessionEvent::Complete { now, not_before })?;

            db::set_group_session_status(conn, session_id, next.as_str()).store()?;
            session.status = next.as_str().to_string();
            Ok(session)
        })
    }

    /// Returns false when the subject had already been recorded.
    pub fn record_attendance(&self, principal: &Principal, session_id: &str, subject_id: &str) -> Result<bool, HavenError> {
        principal.require(&[Role::Counselor, Role::Admin])?;
        if subject_id.trim().is_empty() {
            return Err(HavenError::validation("subject_id is required"));
        }
        let now = self.now();

        let mut conn = self.conn()?;
        immediate(&mut conn, |conn| {
            if principal.is_admin() {
                db::get_group_session(conn, session_id)
                    .store()?
                    .ok_or_else(|| HavenError::not_found("group session"))?;
            } else {
                owned_group_session(conn, principal, session_id)?;
            }
            let attendance = GroupAttendance {
                session_id: session_id.to_string(),
                subject_id: subject_id.trim().to_string(),
                joined_at: now,
            };
            db::insert_attendance(conn, &attendance).store()
        })
    }

    pub fn list_group_sessions(&self, principal: &Principal) -> Result<Vec<GroupSessionSummary>, HavenError> {
        principal.require(&[Role::Counselor])?;
        let mut conn = self.conn()?;

        let sessions = db::list_group_sessions(&mut conn, &principal.id).store()?;
        let mut summaries = Vec::with_capacity(sessions.len());
        for session in sessions {
            let attendees = db::list_attendance(&mut conn, &session.id).store()?.len();
            summaries.push(GroupSessionSummary { session, attendees });
        }
        Ok(summaries)
    }
}
