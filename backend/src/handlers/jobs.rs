use actix_web::{web, HttpResponse, Responder};
use chrono::Utc;
use sea_orm::*;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::errors::AppError;
use crate::models::job_posting;
use crate::models::user::Role;
use crate::services::aggregation::AggregationService;
use crate::services::capabilities::{require, Action, Resource};
use crate::utils::validators::validate_required;

#[derive(Debug, Deserialize)]
pub struct CreateJobRequest {
    pub title: String,
    pub company: String,
    pub description: String,
    pub location: Option<String>,
    pub job_type: String,
    pub required_skills: Option<String>,
    pub min_points: Option<i32>,
}

#[derive(Debug, Serialize)]
pub struct JobListing {
    #[serde(flatten)]
    pub job: job_posting::Model,
    /// Only computed for students
    pub eligible: Option<bool>,
}

#[derive(Debug, Serialize)]
pub struct JobsResponse {
    pub jobs: Vec<JobListing>,
    /// Approved activity points of the calling student
    pub total_approved_points: Option<i64>,
}

/// GET /jobs
/// Active postings, flagged with the caller's eligibility when they are a student
pub async fn list_jobs(
    db: web::Data<DatabaseConnection>,
    user_claims: web::ReqData<crate::middleware::auth::Claims>,
) -> Result<impl Responder, actix_web::Error> {
    let actor = super::actor(&user_claims)?;
    require(&actor, Action::ViewJobs, Resource::Any)?;

    let postings = job_posting::Entity::find()
        .filter(job_posting::Column::IsActive.eq(true))
        .order_by_desc(job_posting::Column::CreatedAt)
        .all(db.get_ref())
        .await
        .map_err(AppError::from)?;

    let points = match actor.role {
        Role::Student => Some(
            AggregationService::new(db.get_ref().clone())
                .approved_points(actor.user_id)
                .await?,
        ),
        _ => None,
    };

    let jobs = postings
        .into_iter()
        .map(|job| JobListing {
            eligible: points.map(|p| p >= job.min_points as i64),
            job,
        })
        .collect();

    Ok(HttpResponse::Ok().json(JobsResponse {
        jobs,
        total_approved_points: points,
    }))
}

/// POST /jobs
pub async fn create_job(
    db: web::Data<DatabaseConnection>,
    user_claims: web::ReqData<crate::middleware::auth::Claims>,
    req: web::Json<CreateJobRequest>,
) -> Result<impl Responder, actix_web::Error> {
    let actor = super::actor(&user_claims)?;
    require(&actor, Action::PostJob, Resource::Any)?;
    let req = req.into_inner();

    for (field, value) in [
        ("title", &req.title),
        ("company", &req.company),
        ("description", &req.description),
        ("job_type", &req.job_type),
    ] {
        validate_required(field, value).map_err(|e| AppError::validation(e.to_string()))?;
    }

    let min_points = req.min_points.unwrap_or(0);
    if min_points < 0 {
        return Err(AppError::validation("min_points cannot be negative").into());
    }

    let now = Utc::now();
    let job = job_posting::ActiveModel {
        id: Set(Uuid::new_v4()),
        recruiter_id: Set(actor.user_id),
        title: Set(req.title.trim().to_string()),
        company: Set(req.company.trim().to_string()),
        description: Set(req.description.trim().to_string()),
        location: Set(req.location),
        job_type: Set(req.job_type.trim().to_string()),
        required_skills: Set(req.required_skills),
        min_points: Set(min_points),
        is_active: Set(true),
        created_at: Set(now),
        updated_at: Set(now),
    }
    .insert(db.get_ref())
    .await
    .map_err(AppError::from)?;

    log::info!("💼 Job {} posted by {}", job.id, actor.user_id);
    Ok(HttpResponse::Created().json(job))
}

/// GET /jobs/mine
pub async fn list_my_jobs(
    db: web::Data<DatabaseConnection>,
    user_claims: web::ReqData<crate::middleware::auth::Claims>,
) -> Result<impl Responder, actix_web::Error> {
    let actor = super::actor(&user_claims)?;
    require(&actor, Action::PostJob, Resource::Any)?;

    let jobs = job_posting::Entity::find()
        .filter(job_posting::Column::RecruiterId.eq(actor.user_id))
        .order_by_desc(job_posting::Column::CreatedAt)
        .all(db.get_ref())
        .await
        .map_err(AppError::from)?;

    Ok(HttpResponse::Ok().json(jobs))
}

/// POST /jobs/{id}/close
pub async fn close_job(
    db: web::Data<DatabaseConnection>,
    user_claims: web::ReqData<crate::middleware::auth::Claims>,
    path: web::Path<Uuid>,
) -> Result<impl Responder, actix_web::Error> {
    let actor = super::actor(&user_claims)?;

    let job = job_posting::Entity::find_by_id(path.into_inner())
        .one(db.get_ref())
        .await
        .map_err(AppError::from)?
        .ok_or_else(|| AppError::not_found("Job"))?;

    require(&actor, Action::ManageJob, Resource::OwnedBy(job.recruiter_id))?;

    let mut record: job_posting::ActiveModel = job.into();
    record.is_active = Set(false);
    record.updated_at = Set(Utc::now());
    let closed = record.update(db.get_ref()).await.map_err(AppError::from)?;

    log::info!("💼 Job {} closed", closed.id);
    Ok(HttpResponse::Ok().json(closed))
}
