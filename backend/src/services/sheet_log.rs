use chrono::{DateTime, Duration, Utc};
use sea_orm::*;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::errors::{AppError, Result};
use crate::models::{sheet, sheet_entry};
use crate::services::capabilities::{require, Action, Actor, Resource};
use crate::services::sheet_cache::SheetCache;

/// Approval event as delivered by the webhook collaborator
#[derive(Debug, Clone, Default, Deserialize)]
pub struct ApprovalEvent {
    pub student_id: Option<Uuid>,
    pub activity_id: Option<i32>,
    pub faculty_id: Option<Uuid>,
    pub student_name: Option<String>,
    pub status: Option<String>,
    pub faculty_name: Option<String>,
    pub category: Option<String>,
    pub certificate_id: Option<String>,
    pub validation_score: Option<String>,
    pub rejection_reason: Option<String>,
    pub date: Option<String>,
}

impl ApprovalEvent {
    /// Required fields must be present and non-blank before anything is written
    pub fn validate(&self) -> Result<()> {
        let missing: Vec<&str> = [
            ("student_name", &self.student_name),
            ("status", &self.status),
            ("faculty_name", &self.faculty_name),
        ]
        .into_iter()
        .filter(|(_, value)| value.as_deref().map_or(true, |v| v.trim().is_empty()))
        .map(|(field, _)| field)
        .collect();

        if !missing.is_empty() {
            return Err(AppError::validation(format!(
                "Missing required fields: {}",
                missing.join(", ")
            )));
        }
        Ok(())
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct AppendReceipt {
    pub sheet_id: Uuid,
    pub share_token: String,
    pub entry_id: i32,
}

/// Read view of a sheet. Carries no student id so it can be served publicly.
#[derive(Debug, Clone, Serialize)]
pub struct SheetSnapshot {
    pub sheet_id: Uuid,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    pub entries: Vec<sheet_entry::Model>,
}

#[derive(Debug, Clone, Serialize)]
pub struct OwnSheet {
    pub share_token: Option<String>,
    pub sheet: Option<SheetSnapshot>,
}

pub struct SheetLogService {
    db: DatabaseConnection,
    cache: SheetCache,
}

impl SheetLogService {
    pub fn new(db: DatabaseConnection, cache: SheetCache) -> Self {
        Self { db, cache }
    }

    /// Append one entry to the student's sheet, creating the sheet first if
    /// needed. Existing entries are never touched.
    pub async fn append(&self, student_id: Uuid, event: &ApprovalEvent) -> Result<AppendReceipt> {
        event.validate()?;

        let sheet = self.get_or_create(student_id).await?;
        let now = Utc::now();
        // updated_at must strictly advance even when two appends share a clock tick
        let bumped = now.max(sheet.updated_at + Duration::microseconds(1));

        let txn = self.db.begin().await?;

        let entry = sheet_entry::ActiveModel {
            id: NotSet,
            sheet_id: Set(sheet.id),
            student_name: Set(clean(&event.student_name).unwrap_or_default()),
            category: Set(clean(&event.category)),
            status: Set(clean(&event.status).unwrap_or_default()),
            faculty_name: Set(clean(&event.faculty_name).unwrap_or_default()),
            certificate_id: Set(clean(&event.certificate_id)),
            validation_score: Set(clean(&event.validation_score)),
            event_date: Set(clean(&event.date).unwrap_or_else(|| now.format("%d %b %Y").to_string())),
            created_at: Set(now),
        }
        .insert(&txn)
        .await?;

        let mut header: sheet::ActiveModel = sheet.clone().into();
        header.updated_at = Set(bumped);
        header.update(&txn).await?;

        txn.commit().await?;
        self.cache.invalidate(student_id).await;

        log::info!(
            "📒 Sheet {} entry {} appended ({} by {})",
            sheet.id,
            entry.id,
            entry.status,
            entry.faculty_name
        );

        Ok(AppendReceipt {
            sheet_id: sheet.id,
            share_token: sheet.share_token,
            entry_id: entry.id,
        })
    }

    /// Public read path. Unknown tokens all produce the same not-found.
    pub async fn get_by_token(&self, token: &str) -> Result<SheetSnapshot> {
        let token = token.trim();
        if token.is_empty() {
            return Err(AppError::not_found("Sheet"));
        }

        let sheet = sheet::Entity::find()
            .filter(sheet::Column::ShareToken.eq(token))
            .one(&self.db)
            .await?
            .ok_or_else(|| AppError::not_found("Sheet"))?;

        self.snapshot(sheet).await
    }

    pub async fn get_own(&self, actor: &Actor) -> Result<OwnSheet> {
        require(actor, Action::ViewSheet, Resource::OwnedBy(actor.user_id))?;

        match self.find_by_student(actor.user_id).await? {
            Some(sheet) => {
                let share_token = sheet.share_token.clone();
                Ok(OwnSheet {
                    share_token: Some(share_token),
                    sheet: Some(self.snapshot(sheet).await?),
                })
            }
            None => Ok(OwnSheet {
                share_token: None,
                sheet: None,
            }),
        }
    }

    /// Replace the share token, which revokes every previously shared link
    pub async fn regenerate_token(&self, actor: &Actor) -> Result<String> {
        require(actor, Action::ViewSheet, Resource::OwnedBy(actor.user_id))?;

        let sheet = self
            .find_by_student(actor.user_id)
            .await?
            .ok_or_else(|| AppError::not_found("Sheet"))?;

        let token = Uuid::new_v4().to_string();
        let mut header: sheet::ActiveModel = sheet.into();
        header.share_token = Set(token.clone());
        header.update(&self.db).await?;

        self.cache.invalidate(actor.user_id).await;
        log::info!("🔑 Sheet share token regenerated for student {}", actor.user_id);
        Ok(token)
    }

    async fn snapshot(&self, sheet: sheet::Model) -> Result<SheetSnapshot> {
        let generation = self.cache.generation(sheet.student_id).await;
        if let Some(cached) = self.cache.get(sheet.student_id).await {
            return Ok(cached);
        }

        // Header and entries are loaded after the generation is taken
        let sheet = sheet::Entity::find_by_id(sheet.id)
            .one(&self.db)
            .await?
            .ok_or_else(|| AppError::not_found("Sheet"))?;
        let entries = sheet_entry::Entity::find()
            .filter(sheet_entry::Column::SheetId.eq(sheet.id))
            .order_by_asc(sheet_entry::Column::Id)
            .all(&self.db)
            .await?;

        let snapshot = SheetSnapshot {
            sheet_id: sheet.id,
            created_at: sheet.created_at,
            updated_at: sheet.updated_at,
            entries,
        };
        self.cache
            .put(sheet.student_id, generation, snapshot.clone())
            .await;
        Ok(snapshot)
    }

    async fn find_by_student(&self, student_id: Uuid) -> Result<Option<sheet::Model>> {
        Ok(sheet::Entity::find()
            .filter(sheet::Column::StudentId.eq(student_id))
            .one(&self.db)
            .await?)
    }

    // The share token is assigned here and nowhere else on creation.
    async fn get_or_create(&self, student_id: Uuid) -> Result<sheet::Model> {
        if let Some(existing) = self.find_by_student(student_id).await? {
            return Ok(existing);
        }

        let now = Utc::now();
        let created = sheet::ActiveModel {
            id: Set(Uuid::new_v4()),
            student_id: Set(student_id),
            share_token: Set(Uuid::new_v4().to_string()),
            created_at: Set(now),
            updated_at: Set(now),
        }
        .insert(&self.db)
        .await;

        match created {
            Ok(sheet) => {
                log::info!("📒 Created sheet {} for student {}", sheet.id, student_id);
                Ok(sheet)
            }
            // A concurrent append may have created it first.
            Err(e) => match self.find_by_student(student_id).await? {
                Some(existing) => Ok(existing),
                None => Err(e.into()),
            },
        }
    }
}

fn clean(value: &Option<String>) -> Option<String> {
    value
        .as_deref()
        .map(str::trim)
        .filter(|v| !v.is_empty())
        .map(str::to_string)
}
