#![allow(dead_code)]
use std::sync::{Arc, Mutex};

use anyhow::{anyhow, Result as AnyResult};
use async_trait::async_trait;
use chrono::Utc;
use sea_orm::{ActiveModelTrait, Database, DatabaseConnection, NotSet, Set};
use uuid::Uuid;

use crate::models::user::Role;
use crate::models::{category, faculty, student, user};
use crate::services::capabilities::Actor;
use crate::services::file_store::FileStore;
use crate::utils::db::create_schema;

pub(crate) fn init_test_logging() {
    let _ = env_logger::builder().is_test(true).try_init();
}

// Fresh in-memory SQLite database with every table created
pub(crate) async fn setup_test_db() -> DatabaseConnection {
    init_test_logging();
    let db = Database::connect("sqlite::memory:")
        .await
        .expect("in-memory sqlite");
    create_schema(&db).await.expect("schema");
    db
}

pub(crate) async fn insert_user(db: &DatabaseConnection, role: Role, full_name: &str) -> Actor {
    let id = Uuid::new_v4();
    user::ActiveModel {
        id: Set(id),
        email: Set(format!("{}@college.test", id.simple())),
        // Tests that log in hash their own password
        password_hash: Set("not-a-real-hash".to_string()),
        full_name: Set(full_name.to_string()),
        role: Set(role),
        created_at: Set(Utc::now()),
        updated_at: Set(Utc::now()),
    }
    .insert(db)
    .await
    .expect("insert user");

    Actor::new(id, role)
}

pub(crate) async fn insert_student(db: &DatabaseConnection, full_name: &str, department: &str) -> Actor {
    let actor = insert_user(db, Role::Student, full_name).await;
    student::ActiveModel {
        user_id: Set(actor.user_id),
        roll_number: Set(format!("R-{}", &actor.user_id.simple().to_string()[..8])),
        department: Set(department.to_string()),
        course: Set("B.Tech".to_string()),
        year_of_study: Set(2),
        phone: Set(None),
        bio: Set(None),
        created_at: Set(Utc::now()),
        updated_at: Set(Utc::now()),
    }
    .insert(db)
    .await
    .expect("insert student");
    actor
}

pub(crate) async fn insert_faculty(db: &DatabaseConnection, full_name: &str, department: &str) -> Actor {
    let actor = insert_user(db, Role::Faculty, full_name).await;
    faculty::ActiveModel {
        user_id: Set(actor.user_id),
        department: Set(department.to_string()),
        designation: Set("Assistant Professor".to_string()),
        created_at: Set(Utc::now()),
    }
    .insert(db)
    .await
    .expect("insert faculty");
    actor
}

pub(crate) async fn insert_category(db: &DatabaseConnection, name: &str, points: i32) -> category::Model {
    category::ActiveModel {
        id: NotSet,
        name: Set(name.to_string()),
        description: Set(None),
        points: Set(points),
        is_active: Set(true),
        created_at: Set(Utc::now()),
    }
    .insert(db)
    .await
    .expect("insert category")
}

/// Records removals instead of touching the filesystem
#[derive(Default)]
pub(crate) struct RecordingFileStore {
    pub(crate) removed: Mutex<Vec<String>>,
    pub(crate) fail: bool,
}

impl RecordingFileStore {
    pub(crate) fn failing() -> Self {
        Self {
            removed: Mutex::new(Vec::new()),
            fail: true,
        }
    }

    pub(crate) fn removed(&self) -> Vec<String> {
        self.removed.lock().unwrap().clone()
    }
}

#[async_trait]
impl FileStore for RecordingFileStore {
    async fn remove(&self, reference: &str) -> AnyResult<()> {
        self.removed.lock().unwrap().push(reference.to_string());
        if self.fail {
            return Err(anyhow!("disk unavailable"));
        }
        Ok(())
    }
}

pub(crate) fn recording_store() -> Arc<RecordingFileStore> {
    Arc::new(RecordingFileStore::default())
}
