use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::RwLock;
use uuid::Uuid;

use crate::services::sheet_log::SheetSnapshot;

#[derive(Default)]
struct CacheState {
    snapshots: HashMap<Uuid, SheetSnapshot>, // student_id -> snapshot
    // Bumped by every invalidation; a fill started under an older generation is dropped
    generations: HashMap<Uuid, u64>,
}

/// Last computed sheet snapshot per student.
/// - Process-local, never shared between instances
/// - Every write to a student's sheet must call `invalidate`
/// - Readers take `generation` before loading and hand it back to `put`
#[derive(Clone, Default)]
pub struct SheetCache {
    state: Arc<RwLock<CacheState>>,
}

impl SheetCache {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn get(&self, student_id: Uuid) -> Option<SheetSnapshot> {
        let state = self.state.read().await;
        state.snapshots.get(&student_id).cloned()
    }

    pub async fn generation(&self, student_id: Uuid) -> u64 {
        let state = self.state.read().await;
        state.generations.get(&student_id).copied().unwrap_or(0)
    }

    /// Store a snapshot loaded under `generation`. Returns false, storing
    /// nothing, when the student's sheet was invalidated in the meantime.
    pub async fn put(&self, student_id: Uuid, generation: u64, snapshot: SheetSnapshot) -> bool {
        let mut state = self.state.write().await;
        let current = state.generations.get(&student_id).copied().unwrap_or(0);
        if current != generation {
            log::debug!(
                "Dropped stale sheet snapshot for student {} (generation {} < {})",
                student_id,
                generation,
                current
            );
            return false;
        }
        state.snapshots.insert(student_id, snapshot);
        true
    }

    pub async fn invalidate(&self, student_id: Uuid) {
        let mut state = self.state.write().await;
        *state.generations.entry(student_id).or_insert(0) += 1;
        if state.snapshots.remove(&student_id).is_some() {
            log::debug!("Invalidated cached sheet snapshot for student {}", student_id);
        }
    }

    #[cfg(test)]
    pub async fn len(&self) -> usize {
        self.state.read().await.snapshots.len()
    }
}
