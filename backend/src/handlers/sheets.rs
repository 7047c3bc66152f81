use actix_web::{web, HttpResponse, Responder};
use sea_orm::DatabaseConnection;
use serde::Serialize;

use crate::services::sheet_cache::SheetCache;
use crate::services::sheet_log::SheetLogService;
use crate::utils::config::Config;

#[derive(Debug, Serialize)]
pub struct SheetLinkResponse {
    pub share_token: String,
    pub share_url: String,
}

/// GET /sheets/me
/// The caller's sheet, or nulls when no approval has been logged yet
pub async fn get_own_sheet(
    db: web::Data<DatabaseConnection>,
    cache: web::Data<SheetCache>,
    user_claims: web::ReqData<crate::middleware::auth::Claims>,
) -> Result<impl Responder, actix_web::Error> {
    let actor = super::actor(&user_claims)?;

    let sheet = SheetLogService::new(db.get_ref().clone(), cache.get_ref().clone())
        .get_own(&actor)
        .await?;

    Ok(HttpResponse::Ok().json(sheet))
}

/// POST /sheets/regenerate-token
pub async fn regenerate_token(
    db: web::Data<DatabaseConnection>,
    cache: web::Data<SheetCache>,
    config: web::Data<Config>,
    user_claims: web::ReqData<crate::middleware::auth::Claims>,
) -> Result<impl Responder, actix_web::Error> {
    let actor = super::actor(&user_claims)?;

    let share_token = SheetLogService::new(db.get_ref().clone(), cache.get_ref().clone())
        .regenerate_token(&actor)
        .await?;

    Ok(HttpResponse::Ok().json(SheetLinkResponse {
        share_url: format!("{}/sheet/{}", config.frontend_url.trim_end_matches('/'), share_token),
        share_token,
    }))
}

/// GET /public/sheets/{token}
/// Public endpoint - no authentication required
pub async fn get_public_sheet(
    db: web::Data<DatabaseConnection>,
    cache: web::Data<SheetCache>,
    path: web::Path<String>,
) -> Result<impl Responder, actix_web::Error> {
    let sheet = SheetLogService::new(db.get_ref().clone(), cache.get_ref().clone())
        .get_by_token(&path.into_inner())
        .await?;

    Ok(HttpResponse::Ok().json(sheet))
}
