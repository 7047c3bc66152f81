use std::sync::OnceLock;

use actix_web::{web, HttpResponse, Responder};
use chrono::Utc;
use sea_orm::*;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::errors::AppError;
use crate::models::user::Role;
use crate::models::{faculty, student, user};
use crate::utils::auth::{create_jwt, hash_password, verify_password};
use crate::utils::config::Config;
use crate::utils::validators::{validate_email, validate_password, validate_required};

#[derive(Debug, Deserialize)]
pub struct StudentProfileRequest {
    pub roll_number: String,
    pub department: String,
    pub course: String,
    pub year_of_study: i32,
    pub phone: Option<String>,
    pub bio: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct FacultyProfileRequest {
    pub department: String,
    pub designation: String,
}

#[derive(Debug, Deserialize)]
pub struct RegisterRequest {
    pub email: String,
    pub password: String,
    pub full_name: String,
    pub role: Role,
    pub student: Option<StudentProfileRequest>,
    pub faculty: Option<FacultyProfileRequest>,
}

#[derive(Debug, Deserialize)]
pub struct LoginRequest {
    pub email: String,
    pub password: String,
}

#[derive(Debug, Serialize)]
pub struct AuthResponse {
    pub token: String,
    pub user_id: String,
    pub full_name: String,
    pub role: Role,
}

#[derive(Debug, Serialize)]
pub struct MeResponse {
    pub user: user::Model,
    pub student: Option<student::Model>,
    pub faculty: Option<faculty::Model>,
}

// Hash checked against when the email is unknown, so both login failures cost a bcrypt verify
fn dummy_hash() -> Option<&'static str> {
    static DUMMY: OnceLock<Option<String>> = OnceLock::new();
    DUMMY
        .get_or_init(|| hash_password("unknown-account-placeholder").ok())
        .as_deref()
}

fn invalid(e: anyhow::Error) -> AppError {
    AppError::validation(e.to_string())
}

/// POST /auth/register
pub async fn register(
    db: web::Data<DatabaseConnection>,
    config: web::Data<Config>,
    req: web::Json<RegisterRequest>,
) -> Result<impl Responder, actix_web::Error> {
    let req = req.into_inner();
    let email = req.email.trim().to_lowercase();
    log::info!("📝 Registration attempt for {} ({})", email, req.role.as_str());

    // Check if registration is allowed
    if !config.allow_registration {
        log::warn!("❌ Registration attempt rejected - registration is disabled");
        return Err(AppError::forbidden("Registration is currently disabled").into());
    }

    if req.role == Role::Admin {
        log::warn!("❌ Refused self-registration as admin for {}", email);
        return Err(AppError::forbidden("Admin accounts cannot be self-registered").into());
    }

    validate_email(&email).map_err(invalid)?;
    validate_password(&req.password).map_err(invalid)?;
    validate_required("full_name", &req.full_name).map_err(invalid)?;

    match req.role {
        Role::Student => {
            let profile = req
                .student
                .as_ref()
                .ok_or_else(|| AppError::validation("Student profile is required"))?;
            validate_required("roll_number", &profile.roll_number).map_err(invalid)?;
            validate_required("department", &profile.department).map_err(invalid)?;
            validate_required("course", &profile.course).map_err(invalid)?;
            if !(1..=6).contains(&profile.year_of_study) {
                return Err(AppError::validation("year_of_study must be between 1 and 6").into());
            }
        }
        Role::Faculty => {
            let profile = req
                .faculty
                .as_ref()
                .ok_or_else(|| AppError::validation("Faculty profile is required"))?;
            validate_required("department", &profile.department).map_err(invalid)?;
            validate_required("designation", &profile.designation).map_err(invalid)?;
        }
        Role::Recruiter | Role::Admin => {}
    }

    // Check if email already exists
    let existing_user = user::Entity::find()
        .filter(user::Column::Email.eq(&email))
        .one(db.get_ref())
        .await
        .map_err(AppError::from)?;

    if existing_user.is_some() {
        log::warn!("❌ Registration failed - {} already registered", email);
        return Err(AppError::validation("Email already registered").into());
    }

    let password_hash = hash_password(&req.password).map_err(|e| {
        log::error!("❌ Failed to hash password: {}", e);
        AppError::Internal(format!("Failed to hash password: {}", e))
    })?;

    log::info!("💾 Creating user '{}'...", email);
    let now = Utc::now();
    let user_id = Uuid::new_v4();
    let txn = db.begin().await.map_err(AppError::from)?;

    let created = user::ActiveModel {
        id: Set(user_id),
        email: Set(email.clone()),
        password_hash: Set(password_hash),
        full_name: Set(req.full_name.trim().to_string()),
        role: Set(req.role),
        created_at: Set(now),
        updated_at: Set(now),
    }
    .insert(&txn)
    .await
    .map_err(AppError::from)?;

    if let (Role::Student, Some(profile)) = (req.role, req.student) {
        student::ActiveModel {
            user_id: Set(user_id),
            roll_number: Set(profile.roll_number.trim().to_string()),
            department: Set(profile.department.trim().to_string()),
            course: Set(profile.course.trim().to_string()),
            year_of_study: Set(profile.year_of_study),
            phone: Set(profile.phone),
            bio: Set(profile.bio),
            created_at: Set(now),
            updated_at: Set(now),
        }
        .insert(&txn)
        .await
        .map_err(AppError::from)?;
    }

    if let (Role::Faculty, Some(profile)) = (req.role, req.faculty) {
        faculty::ActiveModel {
            user_id: Set(user_id),
            department: Set(profile.department.trim().to_string()),
            designation: Set(profile.designation.trim().to_string()),
            created_at: Set(now),
        }
        .insert(&txn)
        .await
        .map_err(AppError::from)?;
    }

    txn.commit().await.map_err(AppError::from)?;
    log::info!("✅ User '{}' created successfully (ID: {})", created.email, created.id);

    let token = create_jwt(created.id, created.role, &config.jwt_secret, config.jwt_expiration_hours)
        .map_err(|e| AppError::Internal(format!("Failed to generate token: {}", e)))?;

    Ok(HttpResponse::Created().json(AuthResponse {
        token,
        user_id: created.id.to_string(),
        full_name: created.full_name,
        role: created.role,
    }))
}

/// POST /auth/login
pub async fn login(
    db: web::Data<DatabaseConnection>,
    config: web::Data<Config>,
    req: web::Json<LoginRequest>,
) -> Result<impl Responder, actix_web::Error> {
    let email = req.email.trim().to_lowercase();
    log::info!("🔐 Login attempt for {}", email);

    let user = user::Entity::find()
        .filter(user::Column::Email.eq(&email))
        .one(db.get_ref())
        .await
        .map_err(AppError::from)?;

    let Some(user) = user else {
        if let Some(hash) = dummy_hash() {
            let _ = verify_password(&req.password, hash);
        }
        log::warn!("❌ User '{}' not found", email);
        return Err(AppError::Unauthorized("Invalid credentials".to_string()).into());
    };

    let verified = verify_password(&req.password, &user.password_hash).unwrap_or_else(|e| {
        log::error!("❌ Failed to verify password for '{}': {}", email, e);
        false
    });

    if !verified {
        log::warn!("❌ Invalid password for user '{}'", email);
        return Err(AppError::Unauthorized("Invalid credentials".to_string()).into());
    }

    let token = create_jwt(user.id, user.role, &config.jwt_secret, config.jwt_expiration_hours)
        .map_err(|e| AppError::Internal(format!("Failed to generate token: {}", e)))?;

    log::info!("🎫 JWT token generated for user '{}'", email);

    Ok(HttpResponse::Ok().json(AuthResponse {
        token,
        user_id: user.id.to_string(),
        full_name: user.full_name,
        role: user.role,
    }))
}

/// GET /auth/me
pub async fn me(
    db: web::Data<DatabaseConnection>,
    user_claims: web::ReqData<crate::middleware::auth::Claims>,
) -> Result<impl Responder, actix_web::Error> {
    let actor = super::actor(&user_claims)?;

    let user = user::Entity::find_by_id(actor.user_id)
        .one(db.get_ref())
        .await
        .map_err(AppError::from)?
        .ok_or_else(|| AppError::not_found("User"))?;

    let student = student::Entity::find_by_id(actor.user_id)
        .one(db.get_ref())
        .await
        .map_err(AppError::from)?;
    let faculty = faculty::Entity::find_by_id(actor.user_id)
        .one(db.get_ref())
        .await
        .map_err(AppError::from)?;

    Ok(HttpResponse::Ok().json(MeResponse {
        user,
        student,
        faculty,
    }))
}
