use actix_web::{web, HttpResponse, Responder};
use sea_orm::DatabaseConnection;
use serde::{Deserialize, Serialize};

use crate::services::portfolios::{GeneratePortfolio, PortfolioService};
use crate::utils::config::Config;

#[derive(Debug, Deserialize)]
pub struct VisibilityRequest {
    pub is_public: bool,
}

#[derive(Debug, Serialize)]
pub struct ShareLinkResponse {
    pub share_token: String,
    pub share_url: String,
}

fn share_url(config: &Config, token: &str) -> String {
    format!("{}/portfolio/{}", config.frontend_url.trim_end_matches('/'), token)
}

/// POST /portfolio/generate
pub async fn generate_portfolio(
    db: web::Data<DatabaseConnection>,
    user_claims: web::ReqData<crate::middleware::auth::Claims>,
    req: Option<web::Json<GeneratePortfolio>>,
) -> Result<impl Responder, actix_web::Error> {
    let actor = super::actor(&user_claims)?;
    let input = req.map(|r| r.into_inner()).unwrap_or_default();

    log::info!("📁 Generating portfolio for student {}", actor.user_id);
    let view = PortfolioService::new(db.get_ref().clone())
        .generate(&actor, input)
        .await?;

    Ok(HttpResponse::Ok().json(view))
}

/// GET /portfolio
pub async fn get_portfolio(
    db: web::Data<DatabaseConnection>,
    user_claims: web::ReqData<crate::middleware::auth::Claims>,
) -> Result<impl Responder, actix_web::Error> {
    let actor = super::actor(&user_claims)?;

    let view = PortfolioService::new(db.get_ref().clone())
        .get_own(&actor)
        .await?;

    Ok(HttpResponse::Ok().json(view))
}

/// PUT /portfolio/visibility
pub async fn update_visibility(
    db: web::Data<DatabaseConnection>,
    user_claims: web::ReqData<crate::middleware::auth::Claims>,
    req: web::Json<VisibilityRequest>,
) -> Result<impl Responder, actix_web::Error> {
    let actor = super::actor(&user_claims)?;

    let portfolio = PortfolioService::new(db.get_ref().clone())
        .set_visibility(&actor, req.is_public)
        .await?;

    Ok(HttpResponse::Ok().json(portfolio))
}

/// POST /portfolio/regenerate-token
pub async fn regenerate_token(
    db: web::Data<DatabaseConnection>,
    config: web::Data<Config>,
    user_claims: web::ReqData<crate::middleware::auth::Claims>,
) -> Result<impl Responder, actix_web::Error> {
    let actor = super::actor(&user_claims)?;

    let share_token = PortfolioService::new(db.get_ref().clone())
        .regenerate_token(&actor)
        .await?;

    Ok(HttpResponse::Ok().json(ShareLinkResponse {
        share_url: share_url(&config, &share_token),
        share_token,
    }))
}

/// GET /public/portfolios/{token}
/// Public endpoint - no authentication required
pub async fn get_public_portfolio(
    db: web::Data<DatabaseConnection>,
    path: web::Path<String>,
) -> Result<impl Responder, actix_web::Error> {
    let portfolio = PortfolioService::new(db.get_ref().clone())
        .get_by_token(&path.into_inner())
        .await?;

    Ok(HttpResponse::Ok().json(portfolio))
}
