use actix_web::{web, HttpRequest, HttpResponse, Responder};
use sea_orm::DatabaseConnection;

use crate::errors::AppError;
use crate::services::approval_webhook::ApprovalWebhook;
use crate::services::file_store::LocalFileStore;
use crate::services::sheet_cache::SheetCache;
use crate::services::sheet_log::ApprovalEvent;
use crate::utils::config::Config;

pub const SECRET_HEADER: &str = "X-Webhook-Secret";

// Constant-time comparison
fn secrets_match(given: &str, expected: &str) -> bool {
    let (given, expected) = (given.as_bytes(), expected.as_bytes());
    if given.len() != expected.len() {
        return false;
    }
    given
        .iter()
        .zip(expected)
        .fold(0u8, |acc, (a, b)| acc | (a ^ b))
        == 0
}

fn verify_secret(req: &HttpRequest, config: &Config) -> Result<(), AppError> {
    let given = req
        .headers()
        .get(SECRET_HEADER)
        .and_then(|h| h.to_str().ok())
        .ok_or_else(|| AppError::Unauthorized("Missing webhook secret".to_string()))?;

    if config.webhook_secret.is_empty() || !secrets_match(given, &config.webhook_secret) {
        log::warn!("❌ Webhook call with an invalid secret");
        return Err(AppError::Unauthorized("Invalid webhook secret".to_string()));
    }
    Ok(())
}

/// POST /webhooks/approval
/// Receives approval events from the external workflow tool
pub async fn approval_event(
    req: HttpRequest,
    db: web::Data<DatabaseConnection>,
    config: web::Data<Config>,
    files: web::Data<LocalFileStore>,
    cache: web::Data<SheetCache>,
    event: web::Json<ApprovalEvent>,
) -> Result<impl Responder, actix_web::Error> {
    verify_secret(&req, &config)?;

    let event = event.into_inner();
    log::info!(
        "📨 Approval event for {} from {}",
        event.student_name.as_deref().unwrap_or("?"),
        event.faculty_name.as_deref().unwrap_or("?")
    );

    let outcome = ApprovalWebhook::new(
        db.get_ref().clone(),
        super::file_store(files),
        cache.get_ref().clone(),
    )
    .process(event)
    .await?;

    Ok(HttpResponse::Created().json(outcome))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_utils::*;
    use actix_web::{http::StatusCode, test, App};
    use serde_json::json;

    #[actix_web::test]
    async fn test_secrets_match() {
        assert!(secrets_match("hook-secret", "hook-secret"));
        assert!(!secrets_match("hook-secreT", "hook-secret"));
        assert!(!secrets_match("hook", "hook-secret"));
        assert!(!secrets_match("", "hook-secret"));
    }

    #[actix_web::test]
    async fn test_webhook_appends_to_public_sheet() {
        let db = setup_test_db().await;
        let student = insert_student(&db, "Asha", "CSE").await;
        let app = test::init_service(
            App::new()
                .app_data(web::Data::new(db.clone()))
                .app_data(web::Data::new(Config::for_tests()))
                .app_data(web::Data::new(LocalFileStore::new(std::env::temp_dir())))
                .app_data(web::Data::new(SheetCache::new()))
                .configure(crate::handlers::configure),
        )
        .await;

        let payload = json!({
            "student_id": student.user_id,
            "student_name": "Asha",
            "status": "Approved",
            "faculty_name": "Dr. Rao",
            "category": "Workshops"
        });

        let unsigned = test::TestRequest::post()
            .uri("/webhooks/approval")
            .set_json(payload.clone())
            .to_request();
        assert_eq!(test::call_service(&app, unsigned).await.status(), StatusCode::UNAUTHORIZED);

        let wrong = test::TestRequest::post()
            .uri("/webhooks/approval")
            .insert_header((SECRET_HEADER, "guess"))
            .set_json(payload.clone())
            .to_request();
        assert_eq!(test::call_service(&app, wrong).await.status(), StatusCode::UNAUTHORIZED);

        let signed = test::TestRequest::post()
            .uri("/webhooks/approval")
            .insert_header((SECRET_HEADER, "hook-secret"))
            .set_json(payload)
            .to_request();
        let receipt: serde_json::Value = test::call_and_read_body_json(&app, signed).await;
        let token = receipt["share_token"].as_str().unwrap().to_string();

        let sheet = test::TestRequest::get()
            .uri(&format!("/public/sheets/{}", token))
            .to_request();
        let sheet: serde_json::Value = test::call_and_read_body_json(&app, sheet).await;
        assert_eq!(sheet["entries"].as_array().unwrap().len(), 1);
        assert_eq!(sheet["entries"][0]["faculty_name"], "Dr. Rao");

        let missing = test::TestRequest::post()
            .uri("/webhooks/approval")
            .insert_header((SECRET_HEADER, "hook-secret"))
            .set_json(json!({ "student_id": student.user_id, "status": "Approved" }))
            .to_request();
        assert_eq!(test::call_service(&app, missing).await.status(), StatusCode::BAD_REQUEST);
    }
}
