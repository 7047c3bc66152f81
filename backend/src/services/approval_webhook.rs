use std::sync::Arc;

use sea_orm::*;
use serde::Serialize;

use crate::errors::{AppError, Result};
use crate::models::{activity, user};
use crate::services::activities::{ActivityService, Decision};
use crate::services::capabilities::Actor;
use crate::services::file_store::FileStore;
use crate::services::sheet_cache::SheetCache;
use crate::services::sheet_log::{AppendReceipt, ApprovalEvent, SheetLogService};

#[derive(Debug, Clone, Serialize)]
pub struct WebhookOutcome {
    #[serde(flatten)]
    pub receipt: AppendReceipt,
    /// Set when the event also decided an activity
    pub activity: Option<activity::Model>,
}

/// Side channel for approval events. An event naming an activity decides it
/// first; every accepted event lands in the student's sheet.
pub struct ApprovalWebhook {
    db: DatabaseConnection,
    files: Arc<dyn FileStore>,
    cache: SheetCache,
}

impl ApprovalWebhook {
    pub fn new(db: DatabaseConnection, files: Arc<dyn FileStore>, cache: SheetCache) -> Self {
        Self { db, files, cache }
    }

    pub async fn process(&self, event: ApprovalEvent) -> Result<WebhookOutcome> {
        event.validate()?;

        let (student_id, decided) = match event.activity_id {
            Some(activity_id) => {
                let decided = self.decide(activity_id, &event).await?;
                if event.student_id.is_some_and(|id| id != decided.student_id) {
                    log::warn!(
                        "Webhook student_id does not own activity {}, using the owner",
                        activity_id
                    );
                }
                (decided.student_id, Some(decided))
            }
            None => {
                let student_id = event.student_id.ok_or_else(|| {
                    AppError::validation("Either activity_id or student_id is required")
                })?;
                (student_id, None)
            }
        };

        let receipt = SheetLogService::new(self.db.clone(), self.cache.clone())
            .append(student_id, &event)
            .await?;

        Ok(WebhookOutcome {
            receipt,
            activity: decided,
        })
    }

    async fn decide(&self, activity_id: i32, event: &ApprovalEvent) -> Result<activity::Model> {
        let status = event.status.as_deref().unwrap_or_default();
        let decision = Decision::parse(status).ok_or_else(|| {
            AppError::validation(format!("Status must be approved or rejected, got '{}'", status))
        })?;

        let faculty_id = event
            .faculty_id
            .ok_or_else(|| AppError::validation("faculty_id is required to decide an activity"))?;

        // The role comes from the store, never from the payload.
        let faculty = user::Entity::find_by_id(faculty_id)
            .one(&self.db)
            .await?
            .ok_or_else(|| AppError::validation("Unknown faculty_id"))?;
        let actor = Actor::new(faculty.id, faculty.role);

        ActivityService::new(self.db.clone(), self.files.clone())
            .decide(activity_id, &actor, decision, event.rejection_reason.clone())
            .await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::activity::ActivityStatus;
    use crate::services::activities::NewActivity;
    use crate::test_utils::*;

    fn payload() -> ApprovalEvent {
        ApprovalEvent {
            student_name: Some("Asha".into()),
            status: Some("approved".into()),
            faculty_name: Some("Dr. Rao".into()),
            category: Some("Competitions".into()),
            ..Default::default()
        }
    }

    async fn pending_activity(db: &DatabaseConnection, student: &Actor) -> activity::Model {
        ActivityService::new(db.clone(), recording_store())
            .create(
                student,
                NewActivity {
                    title: "Hackathon".into(),
                    description: "24h".into(),
                    activity_type: "competition".into(),
                    category: "Competitions".into(),
                    organization: None,
                    start_date: None,
                    end_date: None,
                    certificate_url: None,
                    image_url: None,
                    github_url: None,
                },
            )
            .await
            .unwrap()
    }

    #[tokio::test]
    async fn test_event_decides_and_appends() {
        let db = setup_test_db().await;
        let student = insert_student(&db, "Asha", "CSE").await;
        let faculty = insert_faculty(&db, "Dr. Rao", "CSE").await;
        let activity = pending_activity(&db, &student).await;
        let webhook = ApprovalWebhook::new(db.clone(), recording_store(), SheetCache::new());

        let mut event = payload();
        event.activity_id = Some(activity.id);
        event.faculty_id = Some(faculty.user_id);

        let outcome = webhook.process(event).await.unwrap();
        let decided = outcome.activity.unwrap();
        assert_eq!(decided.status, ActivityStatus::Approved);
        assert_eq!(decided.approved_by, Some(faculty.user_id));

        let sheet = SheetLogService::new(db.clone(), SheetCache::new())
            .get_by_token(&outcome.receipt.share_token)
            .await
            .unwrap();
        assert_eq!(sheet.entries.len(), 1);
        assert_eq!(sheet.entries[0].faculty_name, "Dr. Rao");
    }

    #[tokio::test]
    async fn test_missing_fields_rejected_before_decision() {
        let db = setup_test_db().await;
        let student = insert_student(&db, "Asha", "CSE").await;
        let faculty = insert_faculty(&db, "Dr. Rao", "CSE").await;
        let activity = pending_activity(&db, &student).await;
        let webhook = ApprovalWebhook::new(db.clone(), recording_store(), SheetCache::new());

        let mut event = payload();
        event.student_name = None;
        event.activity_id = Some(activity.id);
        event.faculty_id = Some(faculty.user_id);

        let err = webhook.process(event).await.unwrap_err();
        assert!(matches!(err, AppError::Validation(_)));

        let unchanged = activity::Entity::find_by_id(activity.id)
            .one(&db)
            .await
            .unwrap()
            .unwrap();
        assert!(unchanged.is_pending());
    }

    #[tokio::test]
    async fn test_student_acting_as_faculty_is_denied() {
        let db = setup_test_db().await;
        let student = insert_student(&db, "Asha", "CSE").await;
        let activity = pending_activity(&db, &student).await;
        let webhook = ApprovalWebhook::new(db.clone(), recording_store(), SheetCache::new());

        let mut event = payload();
        event.activity_id = Some(activity.id);
        event.faculty_id = Some(student.user_id);

        let err = webhook.process(event).await.unwrap_err();
        assert!(matches!(err, AppError::PermissionDenied(_)));
    }

    #[tokio::test]
    async fn test_log_only_event_needs_student() {
        let db = setup_test_db().await;
        let student = insert_student(&db, "Asha", "CSE").await;
        let webhook = ApprovalWebhook::new(db.clone(), recording_store(), SheetCache::new());

        let err = webhook.process(payload()).await.unwrap_err();
        assert!(matches!(err, AppError::Validation(_)));

        let mut event = payload();
        event.student_id = Some(student.user_id);
        // Free-text status is stored verbatim when no activity is decided
        event.status = Some("Verified".into());
        let outcome = webhook.process(event).await.unwrap();
        assert!(outcome.activity.is_none());
    }
}
