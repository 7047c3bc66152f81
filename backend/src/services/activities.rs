use std::sync::Arc;

use chrono::{NaiveDate, Utc};
use sea_orm::sea_query::Expr;
use sea_orm::*;
use serde::{Deserialize, Serialize};

use crate::errors::{AppError, Result};
use crate::models::activity::{self, ActivityStatus};
use crate::models::student;
use crate::services::aggregation::Scope;
use crate::services::capabilities::{can, require, Action, Actor, Resource};
use crate::services::file_store::{remove_best_effort, FileStore};
use crate::utils::validators::{
    validate_attachment, validate_date_range, validate_required, validate_url, UPLOAD_PREFIX,
};

#[derive(Debug, Clone, Deserialize)]
pub struct NewActivity {
    pub title: String,
    pub description: String,
    pub activity_type: String,
    pub category: String,
    pub organization: Option<String>,
    pub start_date: Option<NaiveDate>,
    pub end_date: Option<NaiveDate>,
    pub certificate_url: Option<String>,
    pub image_url: Option<String>,
    pub github_url: Option<String>,
}

/// Fields a student may change while the activity is still pending
#[derive(Debug, Clone, Default, Deserialize)]
pub struct ActivityChanges {
    pub title: Option<String>,
    pub description: Option<String>,
    pub activity_type: Option<String>,
    pub category: Option<String>,
    pub organization: Option<String>,
    pub start_date: Option<NaiveDate>,
    pub end_date: Option<NaiveDate>,
    pub certificate_url: Option<String>,
    pub image_url: Option<String>,
    pub github_url: Option<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Decision {
    Approved,
    Rejected,
}

impl Decision {
    pub fn status(self) -> ActivityStatus {
        match self {
            Decision::Approved => ActivityStatus::Approved,
            Decision::Rejected => ActivityStatus::Rejected,
        }
    }

    pub fn parse(value: &str) -> Option<Self> {
        match ActivityStatus::parse(value)? {
            ActivityStatus::Approved => Some(Decision::Approved),
            ActivityStatus::Rejected => Some(Decision::Rejected),
            ActivityStatus::Pending => None,
        }
    }
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct ActivityFilter {
    pub status: Option<ActivityStatus>,
    pub category: Option<String>,
    pub limit: Option<u64>,
    pub offset: Option<u64>,
}

#[derive(Debug, Clone, Serialize)]
pub struct ActivityPage {
    pub activities: Vec<activity::Model>,
    pub total: u64,
    pub has_more: bool,
}

/// Activity store and its approval state machine:
/// pending -> approved | rejected, both terminal.
pub struct ActivityService {
    db: DatabaseConnection,
    files: Arc<dyn FileStore>,
}

impl ActivityService {
    pub fn new(db: DatabaseConnection, files: Arc<dyn FileStore>) -> Self {
        Self { db, files }
    }

    pub async fn create(&self, actor: &Actor, input: NewActivity) -> Result<activity::Model> {
        require(actor, Action::SubmitActivity, Resource::Any)?;
        validate_new(&input)?;

        if student::Entity::find_by_id(actor.user_id).one(&self.db).await?.is_none() {
            return Err(AppError::validation(
                "Complete your student profile before submitting activities",
            ));
        }

        let now = Utc::now();
        let record = activity::ActiveModel {
            id: NotSet,
            student_id: Set(actor.user_id),
            title: Set(input.title.trim().to_string()),
            description: Set(input.description.trim().to_string()),
            activity_type: Set(input.activity_type.trim().to_string()),
            category: Set(input.category.trim().to_string()),
            organization: Set(trimmed(input.organization.clone())),
            start_date: Set(input.start_date),
            end_date: Set(input.end_date),
            certificate_url: Set(trimmed(input.certificate_url.clone())),
            image_url: Set(trimmed(input.image_url.clone())),
            github_url: Set(trimmed(input.github_url.clone())),
            status: Set(ActivityStatus::Pending),
            approved_by: Set(None),
            approved_at: Set(None),
            rejection_reason: Set(None),
            created_at: Set(now),
            updated_at: Set(now),
        };

        match record.insert(&self.db).await {
            Ok(created) => {
                log::info!(
                    "📝 Activity {} '{}' submitted by student {}",
                    created.id,
                    created.title,
                    actor.user_id
                );
                Ok(created)
            }
            Err(e) => {
                // The upload already landed on disk; don't leave it orphaned.
                log::error!("❌ Failed to store activity for {}: {}", actor.user_id, e);
                for reference in uploaded_files(&input.certificate_url, &input.image_url) {
                    remove_best_effort(self.files.as_ref(), &reference).await;
                }
                Err(e.into())
            }
        }
    }

    /// Students only see their own activities; anything else reads as absent.
    pub async fn get(&self, actor: &Actor, activity_id: i32) -> Result<activity::Model> {
        let activity = self.find(activity_id).await?;

        if !can(actor, Action::ViewActivity, Resource::OwnedBy(activity.student_id)) {
            return Err(AppError::not_found("Activity"));
        }

        Ok(activity)
    }

    pub async fn list(&self, actor: &Actor, filter: ActivityFilter) -> Result<ActivityPage> {
        let scope = Scope::for_actor(&self.db, actor).await?;
        let mut query = scope.apply(activity::Entity::find());

        if let Some(status) = filter.status {
            query = query.filter(activity::Column::Status.eq(status));
        }
        if let Some(category) = filter.category.as_deref().filter(|c| !c.trim().is_empty()) {
            query = query.filter(activity::Column::Category.eq(category.trim()));
        }

        let total = query.clone().count(&self.db).await?;

        let limit = filter.limit.unwrap_or(50).clamp(1, 100);
        let offset = filter.offset.unwrap_or(0);

        let activities = query
            .order_by_desc(activity::Column::CreatedAt)
            .order_by_desc(activity::Column::Id)
            .limit(limit)
            .offset(offset)
            .all(&self.db)
            .await?;

        Ok(ActivityPage {
            activities,
            total,
            has_more: offset + limit < total,
        })
    }

    /// Pending activities awaiting review, oldest first
    pub async fn pending_queue(&self, actor: &Actor) -> Result<Vec<activity::Model>> {
        require(actor, Action::DecideActivity, Resource::Any)?;
        let scope = Scope::for_actor(&self.db, actor).await?;

        Ok(scope
            .apply(activity::Entity::find())
            .filter(activity::Column::Status.eq(ActivityStatus::Pending))
            .order_by_asc(activity::Column::CreatedAt)
            .order_by_asc(activity::Column::Id)
            .all(&self.db)
            .await?)
    }

    /// Move a pending activity to approved or rejected in a single UPDATE.
    /// The update only matches pending rows, so an activity is decided once.
    pub async fn decide(
        &self,
        activity_id: i32,
        actor: &Actor,
        decision: Decision,
        rejection_reason: Option<String>,
    ) -> Result<activity::Model> {
        require(actor, Action::DecideActivity, Resource::Any)?;

        let rejection_reason = match decision {
            Decision::Approved => None,
            Decision::Rejected => {
                let reason = trimmed(rejection_reason)
                    .ok_or_else(|| AppError::validation("A rejection reason is required"))?;
                Some(reason)
            }
        };

        let now = Utc::now();
        let result = activity::Entity::update_many()
            .col_expr(activity::Column::Status, Expr::value(decision.status().to_value()))
            .col_expr(activity::Column::ApprovedBy, Expr::value(Some(actor.user_id)))
            .col_expr(activity::Column::ApprovedAt, Expr::value(Some(now)))
            .col_expr(activity::Column::RejectionReason, Expr::value(rejection_reason))
            .col_expr(activity::Column::UpdatedAt, Expr::value(now))
            .filter(activity::Column::Id.eq(activity_id))
            .filter(activity::Column::Status.eq(ActivityStatus::Pending))
            .exec(&self.db)
            .await?;

        let activity = self.find(activity_id).await?;

        if result.rows_affected == 0 {
            log::warn!(
                "❌ Activity {} already {}, decision by {} ignored",
                activity_id,
                activity.status.as_str(),
                actor.user_id
            );
            return Err(AppError::InvalidState(format!(
                "Activity has already been {}",
                activity.status.as_str()
            )));
        }

        log::info!(
            "✅ Activity {} {} by {}",
            activity_id,
            activity.status.as_str(),
            actor.user_id
        );
        Ok(activity)
    }

    pub async fn edit(
        &self,
        activity_id: i32,
        actor: &Actor,
        changes: ActivityChanges,
    ) -> Result<activity::Model> {
        let current = self.find_modifiable(activity_id, actor).await?;
        validate_changes(&current, &changes)?;
        self.apply_edit(&current, changes).await
    }

    /// Write the changes only while the row is still pending; a decision that
    /// lands after `current` was read wins.
    async fn apply_edit(
        &self,
        current: &activity::Model,
        changes: ActivityChanges,
    ) -> Result<activity::Model> {
        let mut record = activity::ActiveModel {
            updated_at: Set(Utc::now()),
            ..Default::default()
        };

        if let Some(title) = changes.title {
            record.title = Set(title.trim().to_string());
        }
        if let Some(description) = changes.description {
            record.description = Set(description.trim().to_string());
        }
        if let Some(activity_type) = changes.activity_type {
            record.activity_type = Set(activity_type.trim().to_string());
        }
        if let Some(category) = changes.category {
            record.category = Set(category.trim().to_string());
        }
        if changes.organization.is_some() {
            record.organization = Set(trimmed(changes.organization));
        }
        if changes.start_date.is_some() {
            record.start_date = Set(changes.start_date);
        }
        if changes.end_date.is_some() {
            record.end_date = Set(changes.end_date);
        }
        let certificate_url = changes
            .certificate_url
            .is_some()
            .then(|| trimmed(changes.certificate_url));
        if let Some(url) = &certificate_url {
            record.certificate_url = Set(url.clone());
        }
        let image_url = changes.image_url.is_some().then(|| trimmed(changes.image_url));
        if let Some(url) = &image_url {
            record.image_url = Set(url.clone());
        }
        if changes.github_url.is_some() {
            record.github_url = Set(trimmed(changes.github_url));
        }

        let result = activity::Entity::update_many()
            .set(record)
            .filter(activity::Column::Id.eq(current.id))
            .filter(activity::Column::Status.eq(ActivityStatus::Pending))
            .exec(&self.db)
            .await?;

        if result.rows_affected == 0 {
            // Gone or decided since it was read
            self.find(current.id).await?;
            return Err(AppError::InvalidState(
                "Cannot modify a decided activity".to_string(),
            ));
        }

        let updated = self.find(current.id).await?;
        log::info!("✏️  Activity {} edited by student {}", current.id, current.student_id);

        // Uploads that are no longer referenced
        let replaced = [
            (&current.certificate_url, certificate_url.is_some()),
            (&current.image_url, image_url.is_some()),
        ]
        .into_iter()
        .filter(|(_, changed)| *changed)
        .flat_map(|(old, _)| uploaded_files(old, &None))
        .filter(|old| {
            updated.certificate_url.as_deref().map(str::trim) != Some(old.as_str())
                && updated.image_url.as_deref().map(str::trim) != Some(old.as_str())
        })
        .collect::<Vec<_>>();
        for reference in replaced {
            remove_best_effort(self.files.as_ref(), &reference).await;
        }

        Ok(updated)
    }

    /// Delete a pending activity, then drop its uploaded files. File removal
    /// failures are logged only.
    pub async fn delete(&self, activity_id: i32, actor: &Actor) -> Result<()> {
        let activity = self.find_modifiable(activity_id, actor).await?;

        let result = activity::Entity::delete_many()
            .filter(activity::Column::Id.eq(activity_id))
            .filter(activity::Column::Status.eq(ActivityStatus::Pending))
            .exec(&self.db)
            .await?;

        if result.rows_affected == 0 {
            return Err(AppError::InvalidState(
                "Cannot modify a decided activity".to_string(),
            ));
        }

        log::info!("🗑️  Activity {} deleted by student {}", activity_id, actor.user_id);

        for reference in uploaded_files(&activity.certificate_url, &activity.image_url) {
            remove_best_effort(self.files.as_ref(), &reference).await;
        }

        Ok(())
    }

    async fn find(&self, activity_id: i32) -> Result<activity::Model> {
        activity::Entity::find_by_id(activity_id)
            .one(&self.db)
            .await?
            .ok_or_else(|| AppError::not_found("Activity"))
    }

    // Owner check first, then lifecycle.
    async fn find_modifiable(&self, activity_id: i32, actor: &Actor) -> Result<activity::Model> {
        let activity = self.find(activity_id).await?;
        require(actor, Action::ModifyActivity, Resource::OwnedBy(activity.student_id))?;

        if !activity.is_pending() {
            return Err(AppError::InvalidState(
                "Cannot modify a decided activity".to_string(),
            ));
        }

        Ok(activity)
    }
}

fn trimmed(value: Option<String>) -> Option<String> {
    value
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
}

fn uploaded_files(certificate: &Option<String>, image: &Option<String>) -> Vec<String> {
    [certificate, image]
        .into_iter()
        .flatten()
        .map(|r| r.trim())
        .filter(|r| r.starts_with(UPLOAD_PREFIX))
        .map(str::to_string)
        .collect()
}

fn validate_links(
    certificate_url: Option<&str>,
    image_url: Option<&str>,
    github_url: Option<&str>,
) -> Result<()> {
    for reference in [certificate_url, image_url].into_iter().flatten() {
        let reference = reference.trim();
        if !reference.is_empty() {
            validate_attachment(reference).map_err(|e| AppError::validation(e.to_string()))?;
        }
    }
    if let Some(github) = github_url.map(str::trim).filter(|g| !g.is_empty()) {
        validate_url(github).map_err(|e| AppError::validation(e.to_string()))?;
    }
    Ok(())
}

fn validate_new(input: &NewActivity) -> Result<()> {
    for (field, value) in [
        ("title", &input.title),
        ("description", &input.description),
        ("activity_type", &input.activity_type),
        ("category", &input.category),
    ] {
        validate_required(field, value).map_err(|e| AppError::validation(e.to_string()))?;
    }

    validate_date_range(input.start_date, input.end_date)
        .map_err(|e| AppError::validation(e.to_string()))?;
    validate_links(
        input.certificate_url.as_deref(),
        input.image_url.as_deref(),
        input.github_url.as_deref(),
    )
}

fn validate_changes(current: &activity::Model, changes: &ActivityChanges) -> Result<()> {
    for (field, value) in [
        ("title", &changes.title),
        ("description", &changes.description),
        ("activity_type", &changes.activity_type),
        ("category", &changes.category),
    ] {
        if let Some(value) = value {
            validate_required(field, value).map_err(|e| AppError::validation(e.to_string()))?;
        }
    }

    validate_date_range(
        changes.start_date.or(current.start_date),
        changes.end_date.or(current.end_date),
    )
    .map_err(|e| AppError::validation(e.to_string()))?;
    validate_links(
        changes.certificate_url.as_deref(),
        changes.image_url.as_deref(),
        changes.github_url.as_deref(),
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::user::Role;
    use crate::test_utils::*;

    fn hackathon() -> NewActivity {
        NewActivity {
            title: "Hackathon".to_string(),
            description: "24h build sprint".to_string(),
            activity_type: "competition".to_string(),
            category: "Competitions".to_string(),
            organization: Some("IEEE".to_string()),
            start_date: NaiveDate::from_ymd_opt(2026, 3, 1),
            end_date: NaiveDate::from_ymd_opt(2026, 3, 2),
            certificate_url: Some("/uploads/hackathon.pdf".to_string()),
            image_url: None,
            github_url: Some("https://github.com/asha/hack".to_string()),
        }
    }

    #[tokio::test]
    async fn test_created_activity_is_pending() {
        let db = setup_test_db().await;
        let student = insert_student(&db, "Asha", "CSE").await;
        let service = ActivityService::new(db.clone(), recording_store());

        let activity = service.create(&student, hackathon()).await.unwrap();

        assert_eq!(activity.status, ActivityStatus::Pending);
        assert_eq!(activity.student_id, student.user_id);
        assert!(activity.approved_by.is_none());
        assert!(activity.approved_at.is_none());
        assert!(activity.rejection_reason.is_none());
    }

    #[tokio::test]
    async fn test_only_students_submit() {
        let db = setup_test_db().await;
        let faculty = insert_faculty(&db, "Dr. Rao", "CSE").await;
        let service = ActivityService::new(db.clone(), recording_store());

        let err = service.create(&faculty, hackathon()).await.unwrap_err();
        assert!(matches!(err, AppError::PermissionDenied(_)));
    }

    #[tokio::test]
    async fn test_create_validates_before_insert() {
        let db = setup_test_db().await;
        let student = insert_student(&db, "Asha", "CSE").await;
        let service = ActivityService::new(db.clone(), recording_store());

        let mut missing_title = hackathon();
        missing_title.title = "  ".to_string();
        assert!(matches!(
            service.create(&student, missing_title).await.unwrap_err(),
            AppError::Validation(_)
        ));

        let mut backwards = hackathon();
        backwards.end_date = NaiveDate::from_ymd_opt(2026, 2, 1);
        assert!(matches!(
            service.create(&student, backwards).await.unwrap_err(),
            AppError::Validation(_)
        ));

        let page = service.list(&student, ActivityFilter::default()).await.unwrap();
        assert_eq!(page.total, 0);
    }

    #[tokio::test]
    async fn test_failed_insert_removes_uploaded_certificate() {
        let db = setup_test_db().await;
        let student = insert_student(&db, "Asha", "CSE").await;
        let files = recording_store();
        let service = ActivityService::new(db.clone(), files.clone());

        // Drop the table so the insert itself fails after validation passed
        db.execute_unprepared("DROP TABLE activities").await.unwrap();

        let err = service.create(&student, hackathon()).await.unwrap_err();
        assert!(matches!(err, AppError::Database(_)));
        assert_eq!(files.removed(), vec!["/uploads/hackathon.pdf".to_string()]);
    }

    #[tokio::test]
    async fn test_approve_sets_metadata_once() {
        let db = setup_test_db().await;
        let student = insert_student(&db, "Asha", "CSE").await;
        let faculty = insert_faculty(&db, "Dr. Rao", "CSE").await;
        let second = insert_faculty(&db, "Dr. Iyer", "CSE").await;
        let service = ActivityService::new(db.clone(), recording_store());

        let activity = service.create(&student, hackathon()).await.unwrap();
        let approved = service
            .decide(activity.id, &faculty, Decision::Approved, Some("ignored".into()))
            .await
            .unwrap();

        assert_eq!(approved.status, ActivityStatus::Approved);
        assert_eq!(approved.approved_by, Some(faculty.user_id));
        assert!(approved.approved_at.is_some());
        assert!(approved.rejection_reason.is_none());
        assert_eq!(approved.title, activity.title);

        let err = service
            .decide(activity.id, &second, Decision::Rejected, Some("late".into()))
            .await
            .unwrap_err();
        assert!(matches!(err, AppError::InvalidState(_)));

        let unchanged = service.get(&faculty, activity.id).await.unwrap();
        assert_eq!(unchanged.approved_by, Some(faculty.user_id));
        assert_eq!(unchanged.approved_at, approved.approved_at);
    }

    #[tokio::test]
    async fn test_decide_requires_reason_role_and_existing_activity() {
        let db = setup_test_db().await;
        let student = insert_student(&db, "Asha", "CSE").await;
        let faculty = insert_faculty(&db, "Dr. Rao", "CSE").await;
        let service = ActivityService::new(db.clone(), recording_store());
        let activity = service.create(&student, hackathon()).await.unwrap();

        let err = service
            .decide(activity.id, &faculty, Decision::Rejected, Some("   ".into()))
            .await
            .unwrap_err();
        assert!(matches!(err, AppError::Validation(_)));

        let err = service
            .decide(activity.id, &student, Decision::Approved, None)
            .await
            .unwrap_err();
        assert!(matches!(err, AppError::PermissionDenied(_)));

        let err = service
            .decide(9999, &faculty, Decision::Approved, None)
            .await
            .unwrap_err();
        assert!(matches!(err, AppError::NotFound(_)));

        // Nothing above changed the record
        let still_pending = service.get(&student, activity.id).await.unwrap();
        assert!(still_pending.is_pending());
    }

    #[tokio::test]
    async fn test_rejected_activity_is_frozen_for_owner() {
        let db = setup_test_db().await;
        let student = insert_student(&db, "Asha", "CSE").await;
        let faculty = insert_faculty(&db, "Dr. Rao", "CSE").await;
        let files = recording_store();
        let service = ActivityService::new(db.clone(), files.clone());

        let activity = service.create(&student, hackathon()).await.unwrap();
        let rejected = service
            .decide(activity.id, &faculty, Decision::Rejected, Some("No certificate".into()))
            .await
            .unwrap();
        assert_eq!(rejected.rejection_reason.as_deref(), Some("No certificate"));

        let changes = ActivityChanges {
            title: Some("Hackathon (resubmitted)".into()),
            ..Default::default()
        };
        let err = service.edit(activity.id, &student, changes).await.unwrap_err();
        assert!(matches!(err, AppError::InvalidState(_)));

        let err = service.delete(activity.id, &student).await.unwrap_err();
        assert!(matches!(err, AppError::InvalidState(_)));

        assert!(files.removed().is_empty());
        assert_eq!(
            service.get(&student, activity.id).await.unwrap().status,
            ActivityStatus::Rejected
        );
    }

    #[tokio::test]
    async fn test_owner_edits_pending_activity() {
        let db = setup_test_db().await;
        let student = insert_student(&db, "Asha", "CSE").await;
        let other = insert_student(&db, "Ravi", "CSE").await;
        let service = ActivityService::new(db.clone(), recording_store());
        let activity = service.create(&student, hackathon()).await.unwrap();

        let changes = ActivityChanges {
            title: Some("Smart India Hackathon".into()),
            organization: Some("AICTE".into()),
            ..Default::default()
        };
        let err = service
            .edit(activity.id, &other, changes.clone())
            .await
            .unwrap_err();
        assert!(matches!(err, AppError::PermissionDenied(_)));

        let edited = service.edit(activity.id, &student, changes).await.unwrap();
        assert_eq!(edited.title, "Smart India Hackathon");
        assert_eq!(edited.organization.as_deref(), Some("AICTE"));
        assert_eq!(edited.status, ActivityStatus::Pending);
        assert_eq!(edited.student_id, student.user_id);
        assert_eq!(edited.description, activity.description);
    }

    #[tokio::test]
    async fn test_edit_loses_to_a_decision_made_after_the_read() {
        let db = setup_test_db().await;
        let student = insert_student(&db, "Asha", "CSE").await;
        let faculty = insert_faculty(&db, "Dr. Rao", "CSE").await;
        let files = recording_store();
        let service = ActivityService::new(db.clone(), files.clone());
        let activity = service.create(&student, hackathon()).await.unwrap();

        // Owner reads the pending row, then faculty decides before the write
        let stale = service.find_modifiable(activity.id, &student).await.unwrap();
        service
            .decide(activity.id, &faculty, Decision::Approved, None)
            .await
            .unwrap();

        let changes = ActivityChanges {
            title: Some("Rewritten after approval".into()),
            certificate_url: Some("/uploads/other.pdf".into()),
            ..Default::default()
        };
        let err = service.apply_edit(&stale, changes).await.unwrap_err();
        assert!(matches!(err, AppError::InvalidState(_)));

        let approved = service.get(&faculty, activity.id).await.unwrap();
        assert_eq!(approved.title, "Hackathon");
        assert_eq!(approved.certificate_url.as_deref(), Some("/uploads/hackathon.pdf"));
        assert!(files.removed().is_empty());
    }

    #[tokio::test]
    async fn test_edit_removes_replaced_upload() {
        let db = setup_test_db().await;
        let student = insert_student(&db, "Asha", "CSE").await;
        let files = recording_store();
        let service = ActivityService::new(db.clone(), files.clone());

        let mut input = hackathon();
        input.image_url = Some("/uploads/team.jpg".to_string());
        let activity = service.create(&student, input).await.unwrap();

        // Untouched image stays, replaced certificate goes
        let changes = ActivityChanges {
            certificate_url: Some("/uploads/hackathon-v2.pdf".into()),
            ..Default::default()
        };
        let edited = service.edit(activity.id, &student, changes).await.unwrap();
        assert_eq!(edited.certificate_url.as_deref(), Some("/uploads/hackathon-v2.pdf"));
        assert_eq!(files.removed(), vec!["/uploads/hackathon.pdf".to_string()]);

        // Resubmitting the same reference removes nothing
        let same = ActivityChanges {
            image_url: Some("/uploads/team.jpg".into()),
            ..Default::default()
        };
        service.edit(activity.id, &student, same).await.unwrap();
        assert_eq!(files.removed().len(), 1);
    }

    #[tokio::test]
    async fn test_delete_removes_uploaded_files_best_effort() {
        let db = setup_test_db().await;
        let student = insert_student(&db, "Asha", "CSE").await;
        let files = std::sync::Arc::new(RecordingFileStore::failing());
        let service = ActivityService::new(db.clone(), files.clone());

        let mut input = hackathon();
        input.image_url = Some("https://cdn.example.com/photo.jpg".to_string());
        let activity = service.create(&student, input).await.unwrap();

        // Removal fails, delete still succeeds
        service.delete(activity.id, &student).await.unwrap();
        assert_eq!(files.removed(), vec!["/uploads/hackathon.pdf".to_string()]);

        let err = service.get(&student, activity.id).await.unwrap_err();
        assert!(matches!(err, AppError::NotFound(_)));
    }

    #[tokio::test]
    async fn test_visibility_and_listing() {
        let db = setup_test_db().await;
        let asha = insert_student(&db, "Asha", "CSE").await;
        let ravi = insert_student(&db, "Ravi", "ECE").await;
        let cse_faculty = insert_faculty(&db, "Dr. Rao", "CSE").await;
        let admin = insert_user(&db, Role::Admin, "Registrar").await;
        let service = ActivityService::new(db.clone(), recording_store());

        let first = service.create(&asha, hackathon()).await.unwrap();
        let second = service.create(&asha, hackathon()).await.unwrap();
        let theirs = service.create(&ravi, hackathon()).await.unwrap();

        let err = service.get(&asha, theirs.id).await.unwrap_err();
        assert!(matches!(err, AppError::NotFound(_)));

        let own = service.list(&asha, ActivityFilter::default()).await.unwrap();
        assert_eq!(own.total, 2);
        // Most recent first
        assert_eq!(own.activities[0].id, second.id);
        assert_eq!(own.activities[1].id, first.id);

        let department = service.list(&cse_faculty, ActivityFilter::default()).await.unwrap();
        assert_eq!(department.total, 2);
        assert!(department.activities.iter().all(|a| a.student_id == asha.user_id));

        let queue = service.pending_queue(&cse_faculty).await.unwrap();
        assert_eq!(queue.iter().map(|a| a.id).collect::<Vec<_>>(), vec![first.id, second.id]);

        let everything = service.list(&admin, ActivityFilter::default()).await.unwrap();
        assert_eq!(everything.total, 3);

        service
            .decide(first.id, &cse_faculty, Decision::Approved, None)
            .await
            .unwrap();
        let approved_only = service
            .list(
                &asha,
                ActivityFilter {
                    status: Some(ActivityStatus::Approved),
                    ..Default::default()
                },
            )
            .await
            .unwrap();
        assert_eq!(approved_only.total, 1);

        let paged = service
            .list(
                &admin,
                ActivityFilter {
                    limit: Some(2),
                    ..Default::default()
                },
            )
            .await
            .unwrap();
        assert_eq!(paged.activities.len(), 2);
        assert!(paged.has_more);
    }
}
