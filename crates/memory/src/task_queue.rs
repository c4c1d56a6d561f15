//! Durable research task table.
//!
//! Topics are queued by the agent (`queue_research`) and claimed by the
//! background research workers. Claiming is the only Pending → InProgress
//! transition and happens under the store mutex, so no two workers ever
//! receive the same task.

use chrono::{DateTime, Utc};
use issola_core::error::StoreError;
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use tokio::sync::Mutex;
use tracing::{debug, info};

use crate::json_file;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TaskStatus {
    Pending,
    InProgress,
    Completed,
    Failed,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ResearchTask {
    pub id: u64,
    pub topic: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub parent: Option<u64>,
    pub status: TaskStatus,
    /// Search queries issued while researching
    #[serde(default)]
    pub queries: Vec<String>,
    #[serde(default)]
    pub results: Vec<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Default, Serialize, Deserialize)]
struct TaskTable {
    next_id: u64,
    tasks: Vec<ResearchTask>,
}

pub struct TaskQueue {
    path: Option<PathBuf>,
    table: Mutex<TaskTable>,
}

impl TaskQueue {
    /// Load from `path`; missing or corrupt files start with an empty queue.
    ///
    /// Tasks left `InProgress` by a previous run are put back to `Pending`.
    pub fn open(path: impl Into<PathBuf>) -> Self {
        let path = path.into();
        let mut table: TaskTable = json_file::load_or_default(&path, "task queue");
        let mut requeued = 0;
        for task in table.tasks.iter_mut().filter(|t| t.status == TaskStatus::InProgress) {
            task.status = TaskStatus::Pending;
            requeued += 1;
        }
        if let Some(max) = table.tasks.iter().map(|t| t.id).max() {
            table.next_id = table.next_id.max(max + 1);
        }
        debug!(path = %path.display(), tasks = table.tasks.len(), requeued, "Task queue loaded");
        Self {
            path: Some(path),
            table: Mutex::new(table),
        }
    }

    pub fn ephemeral() -> Self {
        Self {
            path: None,
            table: Mutex::new(TaskTable::default()),
        }
    }

    fn flush(&self, table: &TaskTable) -> Result<(), StoreError> {
        match &self.path {
            Some(path) => json_file::write_pretty(path, table),
            None => Ok(()),
        }
    }

    /// Queue a new pending task.
    pub async fn enqueue(
        &self,
        topic: &str,
        parent: Option<u64>,
    ) -> Result<ResearchTask, StoreError> {
        let mut table = self.table.lock().await;
        if let Some(parent) = parent
            && !table.tasks.iter().any(|t| t.id == parent)
        {
            return Err(StoreError::UnknownTask(parent.to_string()));
        }

        table.next_id = table.next_id.max(1);
        let now = Utc::now();
        let task = ResearchTask {
            id: table.next_id,
            topic: topic.to_string(),
            parent,
            status: TaskStatus::Pending,
            queries: Vec::new(),
            results: Vec::new(),
            error: None,
            created_at: now,
            updated_at: now,
        };
        table.next_id += 1;
        table.tasks.push(task.clone());
        if let Err(e) = self.flush(&table) {
            table.tasks.pop();
            table.next_id -= 1;
            return Err(e);
        }
        info!(task_id = task.id, topic = %task.topic, "Research task queued");
        Ok(task)
    }

    /// Claim the next pending task: root topics first, then by id.
    ///
    /// The status change is flushed before the task is handed out.
    pub async fn claim_next(&self) -> Result<Option<ResearchTask>, StoreError> {
        let mut table = self.table.lock().await;
        let Some(index) = table
            .tasks
            .iter()
            .enumerate()
            .filter(|(_, t)| t.status == TaskStatus::Pending)
            .min_by_key(|(_, t)| (t.parent.unwrap_or(0), t.id))
            .map(|(i, _)| i)
        else {
            return Ok(None);
        };

        let previous = table.tasks[index].updated_at;
        table.tasks[index].status = TaskStatus::InProgress;
        table.tasks[index].updated_at = Utc::now();
        if let Err(e) = self.flush(&table) {
            table.tasks[index].status = TaskStatus::Pending;
            table.tasks[index].updated_at = previous;
            return Err(e);
        }
        Ok(Some(table.tasks[index].clone()))
    }

    async fn update(
        &self,
        id: u64,
        apply: impl FnOnce(&mut ResearchTask),
    ) -> Result<ResearchTask, StoreError> {
        let mut table = self.table.lock().await;
        let index = table
            .tasks
            .iter()
            .position(|t| t.id == id)
            .ok_or_else(|| StoreError::UnknownTask(id.to_string()))?;

        let previous = table.tasks[index].clone();
        let task = &mut table.tasks[index];
        apply(task);
        task.updated_at = Utc::now();
        let updated = task.clone();
        if let Err(e) = self.flush(&table) {
            table.tasks[index] = previous;
            return Err(e);
        }
        Ok(updated)
    }

    /// Remember the search queries a worker issued for a task.
    pub async fn record_queries(&self, id: u64, queries: Vec<String>) -> Result<(), StoreError> {
        self.update(id, |task| task.queries = queries).await.map(|_| ())
    }

    /// Store the findings and mark the task completed.
    pub async fn save_results(&self, id: u64, results: Vec<String>) -> Result<(), StoreError> {
        let task = self
            .update(id, |task| {
                task.results = results;
                task.error = None;
                task.status = TaskStatus::Completed;
            })
            .await?;
        info!(task_id = id, topic = %task.topic, results = task.results.len(), "Research task completed");
        Ok(())
    }

    pub async fn fail(&self, id: u64, reason: &str) -> Result<(), StoreError> {
        self.update(id, |task| {
            task.error = Some(reason.to_string());
            task.status = TaskStatus::Failed;
        })
        .await
        .map(|_| ())
    }

    pub async fn get(&self, id: u64) -> Option<ResearchTask> {
        self.table.lock().await.tasks.iter().find(|t| t.id == id).cloned()
    }

    /// All tasks in creation order.
    pub async fn list(&self) -> Vec<ResearchTask> {
        self.table.lock().await.tasks.clone()
    }

    pub async fn pending_count(&self) -> usize {
        self.table
            .lock()
            .await
            .tasks
            .iter()
            .filter(|t| t.status == TaskStatus::Pending)
            .count()
    }
}
