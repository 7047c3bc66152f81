use actix_web::{web, HttpResponse, Responder};
use chrono::Utc;
use sea_orm::sea_query::Expr;
use sea_orm::*;
use serde::Deserialize;

use crate::errors::AppError;
use crate::models::{activity, category};
use crate::services::capabilities::{require, Action, Resource};

#[derive(Debug, Deserialize)]
pub struct CreateCategoryRequest {
    pub name: String,
    pub description: Option<String>,
    pub points: i32,
}

/// Partial update; `is_active: false` deactivates the category
#[derive(Debug, Deserialize)]
pub struct UpdateCategoryRequest {
    pub name: Option<String>,
    pub description: Option<String>,
    pub points: Option<i32>,
    pub is_active: Option<bool>,
}

fn validate_points(points: i32) -> Result<(), AppError> {
    if points < 0 {
        return Err(AppError::validation("points cannot be negative"));
    }
    Ok(())
}

async fn ensure_unique_name(
    db: &DatabaseConnection,
    name: &str,
    except: Option<i32>,
) -> Result<(), AppError> {
    let mut query = category::Entity::find().filter(category::Column::Name.eq(name));
    if let Some(id) = except {
        query = query.filter(category::Column::Id.ne(id));
    }

    if query.one(db).await?.is_some() {
        return Err(AppError::validation(format!("Category '{}' already exists", name)));
    }
    Ok(())
}

/// GET /categories
pub async fn list_categories(
    db: web::Data<DatabaseConnection>,
    _user_claims: web::ReqData<crate::middleware::auth::Claims>,
) -> Result<impl Responder, actix_web::Error> {
    let categories = category::Entity::find()
        .filter(category::Column::IsActive.eq(true))
        .order_by_asc(category::Column::Name)
        .all(db.get_ref())
        .await
        .map_err(AppError::from)?;

    Ok(HttpResponse::Ok().json(categories))
}

/// POST /categories
pub async fn create_category(
    db: web::Data<DatabaseConnection>,
    user_claims: web::ReqData<crate::middleware::auth::Claims>,
    req: web::Json<CreateCategoryRequest>,
) -> Result<impl Responder, actix_web::Error> {
    let actor = super::actor(&user_claims)?;
    require(&actor, Action::ManageCategories, Resource::Any)?;

    let name = req.name.trim().to_string();
    if name.is_empty() {
        return Err(AppError::validation("name is required").into());
    }
    validate_points(req.points)?;
    ensure_unique_name(db.get_ref(), &name, None).await?;

    let created = category::ActiveModel {
        id: NotSet,
        name: Set(name),
        description: Set(req.description.clone().filter(|d| !d.trim().is_empty())),
        points: Set(req.points),
        is_active: Set(true),
        created_at: Set(Utc::now()),
    }
    .insert(db.get_ref())
    .await
    .map_err(AppError::from)?;

    log::info!("🏷️ Category '{}' created ({} points)", created.name, created.points);
    Ok(HttpResponse::Created().json(created))
}

/// PUT /categories/{id}
pub async fn update_category(
    db: web::Data<DatabaseConnection>,
    user_claims: web::ReqData<crate::middleware::auth::Claims>,
    path: web::Path<i32>,
    req: web::Json<UpdateCategoryRequest>,
) -> Result<impl Responder, actix_web::Error> {
    let actor = super::actor(&user_claims)?;
    require(&actor, Action::ManageCategories, Resource::Any)?;
    let category_id = path.into_inner();
    let req = req.into_inner();

    let existing = category::Entity::find_by_id(category_id)
        .one(db.get_ref())
        .await
        .map_err(AppError::from)?
        .ok_or_else(|| AppError::not_found("Category"))?;

    let old_name = existing.name.clone();
    let mut record: category::ActiveModel = existing.into();
    let mut renamed_to = None;

    if let Some(name) = req.name {
        let name = name.trim().to_string();
        if name.is_empty() {
            return Err(AppError::validation("name cannot be empty").into());
        }
        if name != old_name {
            ensure_unique_name(db.get_ref(), &name, Some(category_id)).await?;
            renamed_to = Some(name.clone());
        }
        record.name = Set(name);
    }
    if let Some(description) = req.description {
        record.description = Set(Some(description).filter(|d| !d.trim().is_empty()));
    }
    if let Some(points) = req.points {
        validate_points(points)?;
        record.points = Set(points);
    }
    if let Some(is_active) = req.is_active {
        record.is_active = Set(is_active);
    }

    let txn = db.begin().await.map_err(AppError::from)?;
    let updated = record.update(&txn).await.map_err(AppError::from)?;

    // Activities reference categories by name
    if let Some(new_name) = renamed_to {
        let moved = activity::Entity::update_many()
            .col_expr(activity::Column::Category, Expr::value(new_name.clone()))
            .filter(activity::Column::Category.eq(old_name.as_str()))
            .exec(&txn)
            .await
            .map_err(AppError::from)?;
        log::info!(
            "🏷️ Category '{}' renamed to '{}' ({} activities moved)",
            old_name,
            new_name,
            moved.rows_affected
        );
    }
    txn.commit().await.map_err(AppError::from)?;

    log::info!(
        "🏷️ Category {} updated (active: {})",
        updated.id,
        updated.is_active
    );
    Ok(HttpResponse::Ok().json(updated))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::user::Role;
    use crate::test_utils::*;
    use crate::utils::auth::create_jwt;
    use crate::utils::config::Config;
    use actix_web::{http::StatusCode, test, App};
    use serde_json::json;

    #[actix_web::test]
    async fn test_rename_keeps_earned_points() {
        use crate::services::activities::{ActivityService, Decision, NewActivity};
        use crate::services::aggregation::AggregationService;

        let db = setup_test_db().await;
        let competitions = insert_category(&db, "Competitions", 20).await;
        let admin = insert_user(&db, Role::Admin, "Registrar").await;
        let student = insert_student(&db, "Asha", "CSE").await;
        let faculty = insert_faculty(&db, "Dr. Rao", "CSE").await;

        let activities = ActivityService::new(db.clone(), recording_store());
        let hackathon = activities
            .create(
                &student,
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
            .unwrap();
        activities
            .decide(hackathon.id, &faculty, Decision::Approved, None)
            .await
            .unwrap();

        let aggregation = AggregationService::new(db.clone());
        assert_eq!(aggregation.approved_points(student.user_id).await.unwrap(), 20);

        let app = test::init_service(
            App::new()
                .app_data(web::Data::new(db.clone()))
                .app_data(web::Data::new(Config::for_tests()))
                .configure(crate::handlers::configure),
        )
        .await;
        let rename = test::TestRequest::put()
            .uri(&format!("/categories/{}", competitions.id))
            .insert_header((
                "Authorization",
                format!("Bearer {}", create_jwt(admin.user_id, Role::Admin, "test-secret", 1).unwrap()),
            ))
            .set_json(json!({ "name": "Contests" }))
            .to_request();
        let renamed: serde_json::Value = test::call_and_read_body_json(&app, rename).await;
        assert_eq!(renamed["name"], "Contests");

        assert_eq!(aggregation.approved_points(student.user_id).await.unwrap(), 20);
        let moved = activities.get(&student, hackathon.id).await.unwrap();
        assert_eq!(moved.category, "Contests");
    }

    #[actix_web::test]
    async fn test_admin_manages_categories() {
        let db = setup_test_db().await;
        let admin = insert_user(&db, Role::Admin, "Registrar").await;
        let student = insert_student(&db, "Asha", "CSE").await;
        let admin_auth = (
            "Authorization",
            format!("Bearer {}", create_jwt(admin.user_id, Role::Admin, "test-secret", 1).unwrap()),
        );
        let student_auth = (
            "Authorization",
            format!("Bearer {}", create_jwt(student.user_id, Role::Student, "test-secret", 1).unwrap()),
        );
        let app = test::init_service(
            App::new()
                .app_data(web::Data::new(db.clone()))
                .app_data(web::Data::new(Config::for_tests()))
                .configure(crate::handlers::configure),
        )
        .await;

        let by_student = test::TestRequest::post()
            .uri("/categories")
            .insert_header(student_auth.clone())
            .set_json(json!({ "name": "Sports", "points": 5 }))
            .to_request();
        assert_eq!(test::call_service(&app, by_student).await.status(), StatusCode::FORBIDDEN);

        let create = test::TestRequest::post()
            .uri("/categories")
            .insert_header(admin_auth.clone())
            .set_json(json!({ "name": "Sports", "points": 5 }))
            .to_request();
        let created: serde_json::Value = test::call_and_read_body_json(&app, create).await;
        let id = created["id"].as_i64().unwrap();

        let duplicate = test::TestRequest::post()
            .uri("/categories")
            .insert_header(admin_auth.clone())
            .set_json(json!({ "name": "Sports", "points": 10 }))
            .to_request();
        assert_eq!(test::call_service(&app, duplicate).await.status(), StatusCode::BAD_REQUEST);

        let deactivate = test::TestRequest::put()
            .uri(&format!("/categories/{}", id))
            .insert_header(admin_auth)
            .set_json(json!({ "is_active": false }))
            .to_request();
        assert_eq!(test::call_service(&app, deactivate).await.status(), StatusCode::OK);

        let list = test::TestRequest::get()
            .uri("/categories")
            .insert_header(student_auth)
            .to_request();
        let listed: serde_json::Value = test::call_and_read_body_json(&app, list).await;
        assert!(listed.as_array().unwrap().is_empty());
    }
}
