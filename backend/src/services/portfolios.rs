use chrono::{DateTime, Utc};
use sea_orm::sea_query::Expr;
use sea_orm::*;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::errors::{AppError, Result};
use crate::models::portfolio;
use crate::services::aggregation::{AggregationService, PortfolioData};
use crate::services::capabilities::{require, Action, Actor, Resource};

#[derive(Debug, Clone, Default, Deserialize)]
pub struct GeneratePortfolio {
    pub title: Option<String>,
    pub description: Option<String>,
    pub is_public: Option<bool>,
}

#[derive(Debug, Clone, Serialize)]
pub struct PortfolioView {
    pub portfolio: portfolio::Model,
    pub data: PortfolioData,
}

/// What a share-link holder sees. No ids, no token.
#[derive(Debug, Clone, Serialize)]
pub struct PublicPortfolio {
    pub title: String,
    pub description: Option<String>,
    pub view_count: i32,
    pub generated_at: DateTime<Utc>,
    pub data: PortfolioData,
}

pub struct PortfolioService {
    db: DatabaseConnection,
}

impl PortfolioService {
    pub fn new(db: DatabaseConnection) -> Self {
        Self { db }
    }

    /// Create the student's portfolio, or refresh it if one exists. The share
    /// token is only assigned on creation.
    pub async fn generate(&self, actor: &Actor, input: GeneratePortfolio) -> Result<PortfolioView> {
        require(actor, Action::ManagePortfolio, Resource::OwnedBy(actor.user_id))?;

        // Fails with not-found before anything is written if there is no profile
        let data = AggregationService::new(self.db.clone())
            .portfolio_data(actor.user_id)
            .await?;

        let now = Utc::now();
        let title = input
            .title
            .map(|t| t.trim().to_string())
            .filter(|t| !t.is_empty());
        let description = input
            .description
            .map(|d| d.trim().to_string())
            .filter(|d| !d.is_empty());

        let portfolio = match self.find_by_student(actor.user_id).await? {
            Some(existing) => {
                let mut record: portfolio::ActiveModel = existing.into();
                if let Some(title) = title {
                    record.title = Set(title);
                }
                if description.is_some() {
                    record.description = Set(description);
                }
                if let Some(is_public) = input.is_public {
                    record.is_public = Set(is_public);
                }
                record.generated_at = Set(now);
                record.updated_at = Set(now);
                record.update(&self.db).await?
            }
            None => {
                let created = portfolio::ActiveModel {
                    id: Set(Uuid::new_v4()),
                    student_id: Set(actor.user_id),
                    title: Set(title.unwrap_or_else(|| format!("{}'s Portfolio", data.student.full_name))),
                    description: Set(description),
                    is_public: Set(input.is_public.unwrap_or(false)),
                    share_token: Set(Uuid::new_v4().to_string()),
                    view_count: Set(0),
                    generated_at: Set(now),
                    updated_at: Set(now),
                }
                .insert(&self.db)
                .await?;
                log::info!("📁 Portfolio {} created for student {}", created.id, actor.user_id);
                created
            }
        };

        Ok(PortfolioView { portfolio, data })
    }

    pub async fn get_own(&self, actor: &Actor) -> Result<PortfolioView> {
        require(actor, Action::ManagePortfolio, Resource::OwnedBy(actor.user_id))?;

        let portfolio = self
            .find_by_student(actor.user_id)
            .await?
            .ok_or_else(|| AppError::not_found("Portfolio"))?;
        let data = AggregationService::new(self.db.clone())
            .portfolio_data(actor.user_id)
            .await?;

        Ok(PortfolioView { portfolio, data })
    }

    /// Public read path. Private portfolios and unknown tokens are
    /// indistinguishable to the caller.
    pub async fn get_by_token(&self, token: &str) -> Result<PublicPortfolio> {
        let token = token.trim();
        if token.is_empty() {
            return Err(AppError::not_found("Portfolio"));
        }

        let portfolio = portfolio::Entity::find()
            .filter(portfolio::Column::ShareToken.eq(token))
            .filter(portfolio::Column::IsPublic.eq(true))
            .one(&self.db)
            .await?
            .ok_or_else(|| AppError::not_found("Portfolio"))?;

        portfolio::Entity::update_many()
            .col_expr(
                portfolio::Column::ViewCount,
                Expr::col(portfolio::Column::ViewCount).add(1),
            )
            .filter(portfolio::Column::Id.eq(portfolio.id))
            .exec(&self.db)
            .await?;

        let view_count = portfolio::Entity::find_by_id(portfolio.id)
            .one(&self.db)
            .await?
            .map(|p| p.view_count)
            .unwrap_or(portfolio.view_count + 1);

        let data = AggregationService::new(self.db.clone())
            .portfolio_data(portfolio.student_id)
            .await?;

        Ok(PublicPortfolio {
            title: portfolio.title,
            description: portfolio.description,
            view_count,
            generated_at: portfolio.generated_at,
            data,
        })
    }

    pub async fn set_visibility(&self, actor: &Actor, is_public: bool) -> Result<portfolio::Model> {
        require(actor, Action::ManagePortfolio, Resource::OwnedBy(actor.user_id))?;

        let existing = self
            .find_by_student(actor.user_id)
            .await?
            .ok_or_else(|| AppError::not_found("Portfolio"))?;

        let mut record: portfolio::ActiveModel = existing.into();
        record.is_public = Set(is_public);
        record.updated_at = Set(Utc::now());
        let updated = record.update(&self.db).await?;

        log::info!(
            "Portfolio {} is now {}",
            updated.id,
            if is_public { "public" } else { "private" }
        );
        Ok(updated)
    }

    /// Replace the share token; links handed out before stop working
    pub async fn regenerate_token(&self, actor: &Actor) -> Result<String> {
        require(actor, Action::ManagePortfolio, Resource::OwnedBy(actor.user_id))?;

        let existing = self
            .find_by_student(actor.user_id)
            .await?
            .ok_or_else(|| AppError::not_found("Portfolio"))?;

        let token = Uuid::new_v4().to_string();
        let mut record: portfolio::ActiveModel = existing.into();
        record.share_token = Set(token.clone());
        record.updated_at = Set(Utc::now());
        record.update(&self.db).await?;

        log::info!("🔑 Portfolio share token regenerated for student {}", actor.user_id);
        Ok(token)
    }

    async fn find_by_student(&self, student_id: Uuid) -> Result<Option<portfolio::Model>> {
        Ok(portfolio::Entity::find()
            .filter(portfolio::Column::StudentId.eq(student_id))
            .one(&self.db)
            .await?)
    }
}
