use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};

#[derive(Clone, Debug, PartialEq, DeriveEntityModel, Serialize, Deserialize)]
#[sea_orm(table_name = "job_postings")]
pub struct Model {
    #[sea_orm(primary_key, auto_increment = false)]
    pub id: Uuid,
    pub recruiter_id: Uuid,
    pub title: String,
    pub company: String,
    #[sea_orm(column_type = "Text")]
    pub description: String,
    pub location: Option<String>,
    pub job_type: String,
    pub required_skills: Option<String>,
    /// Minimum approved activity points a student needs to be eligible
    pub min_points: i32,
    pub is_active: bool,
    pub created_at: ChronoDateTimeUtc,
    pub updated_at: ChronoDateTimeUtc,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {
    #[sea_orm(
        belongs_to = "super::user::Entity",
        from = "Column::RecruiterId",
        to = "super::user::Column::Id",
        on_delete = "Cascade"
    )]
    Recruiter,
}

impl Related<super::user::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::Recruiter.def()
    }
}

impl ActiveModelBehavior for ActiveModel {}
