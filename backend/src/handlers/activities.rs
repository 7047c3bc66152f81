use actix_web::{web, HttpResponse, Responder};
use sea_orm::DatabaseConnection;
use serde::Deserialize;

use crate::errors::AppError;
use crate::models::activity::ActivityStatus;
use crate::services::activities::{ActivityChanges, ActivityFilter, ActivityService, Decision, NewActivity};
use crate::services::file_store::LocalFileStore;

const MAX_PAGE_SIZE: u64 = 100;

#[derive(Debug, Deserialize)]
pub struct ActivitiesQuery {
    pub status: Option<String>,
    pub category: Option<String>,
    pub limit: Option<u64>,
    pub offset: Option<u64>,
}

#[derive(Debug, Deserialize)]
pub struct DecisionRequest {
    pub decision: String,
    pub rejection_reason: Option<String>,
}

impl ActivitiesQuery {
    fn into_filter(self) -> Result<ActivityFilter, AppError> {
        let status = match self.status.as_deref() {
            None | Some("") => None,
            Some(raw) => Some(ActivityStatus::parse(raw).ok_or_else(|| {
                AppError::validation(format!("Unknown status filter '{}'", raw))
            })?),
        };

        Ok(ActivityFilter {
            status,
            category: self.category.filter(|c| !c.trim().is_empty()),
            limit: self.limit.map(|l| l.clamp(1, MAX_PAGE_SIZE)),
            offset: self.offset,
        })
    }
}

/// POST /activities
pub async fn create_activity(
    db: web::Data<DatabaseConnection>,
    files: web::Data<LocalFileStore>,
    user_claims: web::ReqData<crate::middleware::auth::Claims>,
    req: web::Json<NewActivity>,
) -> Result<impl Responder, actix_web::Error> {
    let actor = super::actor(&user_claims)?;

    let activity = ActivityService::new(db.get_ref().clone(), super::file_store(files))
        .create(&actor, req.into_inner())
        .await?;

    Ok(HttpResponse::Created().json(activity))
}

/// GET /activities
/// Students see their own, faculty their department, admins everything
pub async fn list_activities(
    db: web::Data<DatabaseConnection>,
    files: web::Data<LocalFileStore>,
    user_claims: web::ReqData<crate::middleware::auth::Claims>,
    query: web::Query<ActivitiesQuery>,
) -> Result<impl Responder, actix_web::Error> {
    let actor = super::actor(&user_claims)?;
    let filter = query.into_inner().into_filter()?;

    let page = ActivityService::new(db.get_ref().clone(), super::file_store(files))
        .list(&actor, filter)
        .await?;

    Ok(HttpResponse::Ok().json(page))
}

/// GET /activities/pending
pub async fn pending_activities(
    db: web::Data<DatabaseConnection>,
    files: web::Data<LocalFileStore>,
    user_claims: web::ReqData<crate::middleware::auth::Claims>,
) -> Result<impl Responder, actix_web::Error> {
    let actor = super::actor(&user_claims)?;

    let queue = ActivityService::new(db.get_ref().clone(), super::file_store(files))
        .pending_queue(&actor)
        .await?;

    Ok(HttpResponse::Ok().json(queue))
}

/// GET /activities/{id}
pub async fn get_activity(
    db: web::Data<DatabaseConnection>,
    files: web::Data<LocalFileStore>,
    user_claims: web::ReqData<crate::middleware::auth::Claims>,
    path: web::Path<i32>,
) -> Result<impl Responder, actix_web::Error> {
    let actor = super::actor(&user_claims)?;

    let activity = ActivityService::new(db.get_ref().clone(), super::file_store(files))
        .get(&actor, path.into_inner())
        .await?;

    Ok(HttpResponse::Ok().json(activity))
}

/// PUT /activities/{id}
pub async fn update_activity(
    db: web::Data<DatabaseConnection>,
    files: web::Data<LocalFileStore>,
    user_claims: web::ReqData<crate::middleware::auth::Claims>,
    path: web::Path<i32>,
    req: web::Json<ActivityChanges>,
) -> Result<impl Responder, actix_web::Error> {
    let actor = super::actor(&user_claims)?;

    let activity = ActivityService::new(db.get_ref().clone(), super::file_store(files))
        .edit(path.into_inner(), &actor, req.into_inner())
        .await?;

    Ok(HttpResponse::Ok().json(activity))
}

/// DELETE /activities/{id}
pub async fn delete_activity(
    db: web::Data<DatabaseConnection>,
    files: web::Data<LocalFileStore>,
    user_claims: web::ReqData<crate::middleware::auth::Claims>,
    path: web::Path<i32>,
) -> Result<impl Responder, actix_web::Error> {
    let actor = super::actor(&user_claims)?;

    ActivityService::new(db.get_ref().clone(), super::file_store(files))
        .delete(path.into_inner(), &actor)
        .await?;

    Ok(HttpResponse::NoContent().finish())
}

/// POST /activities/{id}/decision
pub async fn decide_activity(
    db: web::Data<DatabaseConnection>,
    files: web::Data<LocalFileStore>,
    user_claims: web::ReqData<crate::middleware::auth::Claims>,
    path: web::Path<i32>,
    req: web::Json<DecisionRequest>,
) -> Result<impl Responder, actix_web::Error> {
    let actor = super::actor(&user_claims)?;
    let req = req.into_inner();

    let decision = Decision::parse(&req.decision).ok_or_else(|| {
        AppError::validation(format!("Decision must be approved or rejected, got '{}'", req.decision))
    })?;

    let activity = ActivityService::new(db.get_ref().clone(), super::file_store(files))
        .decide(path.into_inner(), &actor, decision, req.rejection_reason)
        .await?;

    Ok(HttpResponse::Ok().json(activity))
}
