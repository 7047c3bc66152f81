use std::collections::{BTreeMap, HashMap};

use chrono::{DateTime, Utc};
use sea_orm::sea_query::Expr;
use sea_orm::*;
use serde::Serialize;
use uuid::Uuid;

use crate::errors::{AppError, Result};
use crate::models::activity::{self, ActivityStatus};
use crate::models::user::Role;
use crate::models::{category, faculty, student, user};
use crate::services::capabilities::{require, Action, Actor, Resource};

/// Which activities a read projection covers
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Scope {
    Student(Uuid),
    Department(String),
    Global,
}

impl Scope {
    /// Students see themselves, faculty their department, admins everything
    pub async fn for_actor(db: &DatabaseConnection, actor: &Actor) -> Result<Self> {
        match actor.role {
            Role::Student => Ok(Scope::Student(actor.user_id)),
            Role::Faculty => {
                let profile = faculty::Entity::find_by_id(actor.user_id)
                    .one(db)
                    .await?
                    .ok_or_else(|| AppError::not_found("Faculty profile"))?;
                Ok(Scope::Department(profile.department))
            }
            Role::Admin => Ok(Scope::Global),
            Role::Recruiter => Err(AppError::forbidden("Recruiters cannot view activity records")),
        }
    }

    pub fn apply(&self, query: Select<activity::Entity>) -> Select<activity::Entity> {
        match self {
            Scope::Student(student_id) => query.filter(activity::Column::StudentId.eq(*student_id)),
            Scope::Department(department) => query
                .join(JoinType::InnerJoin, activity::Relation::Student.def())
                .filter(student::Column::Department.eq(department.as_str())),
            Scope::Global => query,
        }
    }

    pub fn label(&self) -> String {
        match self {
            Scope::Student(_) => "student".to_string(),
            Scope::Department(department) => format!("department:{}", department),
            Scope::Global => "global".to_string(),
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct StatusCounts {
    pub pending: u64,
    pub approved: u64,
    pub rejected: u64,
    pub total: u64,
}

impl StatusCounts {
    fn add(&mut self, status: &str, count: u64) {
        match ActivityStatus::parse(status) {
            Some(ActivityStatus::Pending) => self.pending += count,
            Some(ActivityStatus::Approved) => self.approved += count,
            Some(ActivityStatus::Rejected) => self.rejected += count,
            None => log::warn!("Unknown activity status in store: {}", status),
        }
        self.total += count;
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CategoryStat {
    pub category: String,
    pub total: u64,
    pub approved: u64,
    /// Points earned by the approved activities in this category
    pub points: i64,
}

#[derive(Debug, Clone, Serialize)]
pub struct Dashboard {
    pub scope: String,
    pub counts: StatusCounts,
    pub categories: Vec<CategoryStat>,
    pub recent_activities: Vec<activity::Model>,
}

/// Sub-counts of approved work by activity type, as shown on a portfolio
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct ActivityTypeCounts {
    pub certification: u64,
    pub competition: u64,
    pub workshop: u64,
    pub internship: u64,
    pub project: u64,
    pub volunteering: u64,
    pub other: u64,
}

impl ActivityTypeCounts {
    pub fn record(&mut self, activity_type: &str) {
        let normalized = activity_type.trim().to_lowercase();
        let singular = normalized.strip_suffix('s').unwrap_or(&normalized);

        let slot = match singular {
            "certification" | "certificate" => &mut self.certification,
            "competition" => &mut self.competition,
            "workshop" => &mut self.workshop,
            "internship" => &mut self.internship,
            "project" => &mut self.project,
            "volunteering" | "volunteer" => &mut self.volunteering,
            _ => &mut self.other,
        };
        *slot += 1;
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CategoryPoints {
    pub category: String,
    pub count: u64,
    pub points_each: i32,
    pub points: i64,
}

#[derive(Debug, Clone, Serialize)]
pub struct StudentProfile {
    pub user_id: Uuid,
    pub full_name: String,
    pub roll_number: String,
    pub department: String,
    pub course: String,
    pub year_of_study: i32,
    pub bio: Option<String>,
}

#[derive(Debug, Clone, Serialize)]
pub struct PortfolioData {
    pub student: StudentProfile,
    pub activities: Vec<activity::Model>,
    pub type_counts: ActivityTypeCounts,
    pub categories: Vec<CategoryPoints>,
    pub total_points: i64,
    pub computed_at: DateTime<Utc>,
}

/// Read projections over the activity store. Everything is recomputed per
/// call; there is nothing to invalidate.
pub struct AggregationService {
    db: DatabaseConnection,
}

impl AggregationService {
    pub fn new(db: DatabaseConnection) -> Self {
        Self { db }
    }

    pub async fn status_counts(&self, scope: &Scope) -> Result<StatusCounts> {
        let rows: Vec<(String, i64)> = scope
            .apply(activity::Entity::find())
            .select_only()
            .column(activity::Column::Status)
            .column_as(Expr::col((activity::Entity, activity::Column::Id)).count(), "count")
            .group_by(activity::Column::Status)
            .into_tuple()
            .all(&self.db)
            .await?;

        let mut counts = StatusCounts::default();
        for (status, count) in rows {
            counts.add(&status, count.max(0) as u64);
        }
        Ok(counts)
    }

    pub async fn category_breakdown(&self, scope: &Scope) -> Result<Vec<CategoryStat>> {
        let rows: Vec<(String, String, i64)> = scope
            .apply(activity::Entity::find())
            .select_only()
            .column(activity::Column::Category)
            .column(activity::Column::Status)
            .column_as(Expr::col((activity::Entity, activity::Column::Id)).count(), "count")
            .group_by(activity::Column::Category)
            .group_by(activity::Column::Status)
            .into_tuple()
            .all(&self.db)
            .await?;

        let weights = self.category_weights().await?;
        let mut by_category: BTreeMap<String, (u64, u64)> = BTreeMap::new();

        for (category, status, count) in rows {
            let count = count.max(0) as u64;
            let entry = by_category.entry(category).or_default();
            entry.0 += count;
            if ActivityStatus::parse(&status) == Some(ActivityStatus::Approved) {
                entry.1 += count;
            }
        }

        let mut stats: Vec<CategoryStat> = by_category
            .into_iter()
            .map(|(category, (total, approved))| {
                let weight = weights.get(&category).copied().unwrap_or(0) as i64;
                CategoryStat {
                    points: approved as i64 * weight,
                    category,
                    total,
                    approved,
                }
            })
            .collect();

        stats.sort_by(|a, b| b.total.cmp(&a.total).then_with(|| a.category.cmp(&b.category)));
        Ok(stats)
    }

    pub async fn dashboard(&self, actor: &Actor) -> Result<Dashboard> {
        require(actor, Action::ViewDashboard, Resource::Any)?;
        let scope = Scope::for_actor(&self.db, actor).await?;

        let counts = self.status_counts(&scope).await?;
        let categories = self.category_breakdown(&scope).await?;
        let recent_activities = scope
            .apply(activity::Entity::find())
            .order_by_desc(activity::Column::CreatedAt)
            .order_by_desc(activity::Column::Id)
            .limit(5)
            .all(&self.db)
            .await?;

        Ok(Dashboard {
            scope: scope.label(),
            counts,
            categories,
            recent_activities,
        })
    }

    /// Profile plus approved activities only. Pending and rejected work never
    /// reaches a portfolio.
    pub async fn portfolio_data(&self, student_id: Uuid) -> Result<PortfolioData> {
        let (profile, owner) = student::Entity::find_by_id(student_id)
            .find_also_related(user::Entity)
            .one(&self.db)
            .await?
            .ok_or_else(|| AppError::not_found("Student"))?;
        let owner = owner.ok_or_else(|| AppError::not_found("Student"))?;

        let activities = self.approved_activities(student_id).await?;
        let weights = self.category_weights().await?;

        let mut type_counts = ActivityTypeCounts::default();
        let mut per_category: BTreeMap<String, u64> = BTreeMap::new();
        for activity in &activities {
            type_counts.record(&activity.activity_type);
            *per_category.entry(activity.category.clone()).or_default() += 1;
        }

        let categories: Vec<CategoryPoints> = per_category
            .into_iter()
            .map(|(category, count)| {
                let points_each = weights.get(&category).copied().unwrap_or(0);
                CategoryPoints {
                    points: count as i64 * points_each as i64,
                    category,
                    count,
                    points_each,
                }
            })
            .collect();
        let total_points = categories.iter().map(|c| c.points).sum();

        Ok(PortfolioData {
            student: StudentProfile {
                user_id: profile.user_id,
                full_name: owner.full_name,
                roll_number: profile.roll_number,
                department: profile.department,
                course: profile.course,
                year_of_study: profile.year_of_study,
                bio: profile.bio,
            },
            activities,
            type_counts,
            categories,
            total_points,
            computed_at: Utc::now(),
        })
    }

    /// Sum of category points over a student's approved activities
    pub async fn approved_points(&self, student_id: Uuid) -> Result<i64> {
        let categories: Vec<String> = activity::Entity::find()
            .select_only()
            .column(activity::Column::Category)
            .filter(activity::Column::StudentId.eq(student_id))
            .filter(activity::Column::Status.eq(ActivityStatus::Approved))
            .into_tuple()
            .all(&self.db)
            .await?;

        let weights = self.category_weights().await?;
        Ok(categories
            .iter()
            .map(|c| weights.get(c).copied().unwrap_or(0) as i64)
            .sum())
    }

    async fn approved_activities(&self, student_id: Uuid) -> Result<Vec<activity::Model>> {
        Ok(activity::Entity::find()
            .filter(activity::Column::StudentId.eq(student_id))
            .filter(activity::Column::Status.eq(ActivityStatus::Approved))
            .order_by_desc(activity::Column::CreatedAt)
            .order_by_desc(activity::Column::Id)
            .all(&self.db)
            .await?)
    }

    // Inactive categories still weigh historical activities.
    async fn category_weights(&self) -> Result<HashMap<String, i32>> {
        let categories = category::Entity::find().all(&self.db).await?;
        Ok(categories.into_iter().map(|c| (c.name, c.points)).collect())
    }
}
