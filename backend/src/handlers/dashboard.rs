use actix_web::{web, HttpResponse, Responder};
use sea_orm::DatabaseConnection;

use crate::services::aggregation::AggregationService;

/// GET /dashboard
/// Status counts and category breakdown over the caller's visible activities
pub async fn get_dashboard(
    db: web::Data<DatabaseConnection>,
    user_claims: web::ReqData<crate::middleware::auth::Claims>,
) -> Result<impl Responder, actix_web::Error> {
    let actor = super::actor(&user_claims)?;

    let dashboard = AggregationService::new(db.get_ref().clone())
        .dashboard(&actor)
        .await?;

    log::debug!(
        "📊 Dashboard for {} ({}): {} activities",
        actor.user_id,
        dashboard.scope,
        dashboard.counts.total
    );
    Ok(HttpResponse::Ok().json(dashboard))
}
