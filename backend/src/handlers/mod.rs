pub mod activities;
pub mod auth;
pub mod categories;
pub mod dashboard;
pub mod jobs;
pub mod portfolios;
pub mod sheets;
pub mod webhooks;

use std::sync::Arc;

use actix_cors::Cors;
use actix_web::web;

use crate::errors::AppError;
use crate::middleware::auth::{Claims, JwtMiddleware};
use crate::services::capabilities::Actor;
use crate::services::file_store::{FileStore, LocalFileStore};

pub(crate) fn actor(claims: &Claims) -> Result<Actor, AppError> {
    Actor::from_claims(claims)
}

pub(crate) fn file_store(files: web::Data<LocalFileStore>) -> Arc<dyn FileStore> {
    files.into_inner()
}

/// Every route of the API. Shared by `main` and the handler tests.
pub fn configure(cfg: &mut web::ServiceConfig) {
    cfg
        // Public endpoints (no authentication required)
        .service(
            web::scope("/auth")
                .route("/register", web::post().to(auth::register))
                .route("/login", web::post().to(auth::login))
                .route("/me", web::get().to(auth::me).wrap(JwtMiddleware)),
        )
        // Share links: the token is the only credential
        .service(
            web::scope("/public")
                .wrap(Cors::permissive())
                .route("/portfolios/{token}", web::get().to(portfolios::get_public_portfolio))
                .route("/sheets/{token}", web::get().to(sheets::get_public_sheet)),
        )
        // Authenticated by shared secret header
        .service(
            web::scope("/webhooks")
                .route("/approval", web::post().to(webhooks::approval_event)),
        )
        // Protected endpoints (JWT required)
        .service(
            web::scope("/activities")
                .wrap(JwtMiddleware)
                .route("", web::get().to(activities::list_activities))
                .route("", web::post().to(activities::create_activity))
                .route("/pending", web::get().to(activities::pending_activities))
                .route("/{id}", web::get().to(activities::get_activity))
                .route("/{id}", web::put().to(activities::update_activity))
                .route("/{id}", web::delete().to(activities::delete_activity))
                .route("/{id}/decision", web::post().to(activities::decide_activity)),
        )
        .service(
            web::scope("/dashboard")
                .wrap(JwtMiddleware)
                .route("", web::get().to(dashboard::get_dashboard)),
        )
        .service(
            web::scope("/portfolio")
                .wrap(JwtMiddleware)
                .route("", web::get().to(portfolios::get_portfolio))
                .route("/generate", web::post().to(portfolios::generate_portfolio))
                .route("/visibility", web::put().to(portfolios::update_visibility))
                .route("/regenerate-token", web::post().to(portfolios::regenerate_token)),
        )
        .service(
            web::scope("/sheets")
                .wrap(JwtMiddleware)
                .route("/me", web::get().to(sheets::get_own_sheet))
                .route("/regenerate-token", web::post().to(sheets::regenerate_token)),
        )
        .service(
            web::scope("/categories")
                .wrap(JwtMiddleware)
                .route("", web::get().to(categories::list_categories))
                .route("", web::post().to(categories::create_category))
                .route("/{id}", web::put().to(categories::update_category)),
        )
        .service(
            web::scope("/jobs")
                .wrap(JwtMiddleware)
                .route("", web::get().to(jobs::list_jobs))
                .route("", web::post().to(jobs::create_job))
                .route("/mine", web::get().to(jobs::list_my_jobs))
                .route("/{id}/close", web::post().to(jobs::close_job)),
        );
}
