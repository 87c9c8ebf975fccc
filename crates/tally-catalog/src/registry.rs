//! Transactional task catalog.

use std::sync::Arc;

use tally_store::{LedgerStore, LedgerTransaction};
use tally_types::{Clock, Task, TaskId};

use crate::error::{CatalogError, Result};
use crate::slug::slugify;

/// Input for [`TaskRegistry::create_task`].
#[derive(Clone, Debug)]
pub struct NewTask {
    pub title: String,
    pub points: u64,
    pub description: Option<String>,
}

impl NewTask {
    pub fn new(title: impl Into<String>, points: u64) -> Self {
        Self {
            title: title.into(),
            points,
            description: None,
        }
    }

    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = Some(description.into());
        self
    }
}

/// Catalog of tasks backed by a [`LedgerStore`].
///
/// Tasks are read-mostly: created by operators, then only looked up.
pub struct TaskRegistry<S: LedgerStore> {
    store: Arc<S>,
    clock: Arc<dyn Clock>,
}

impl<S: LedgerStore> TaskRegistry<S> {
    pub fn new(store: Arc<S>, clock: Arc<dyn Clock>) -> Self {
        Self { store, clock }
    }

    /// Create a task whose slug is derived from its title.
    pub async fn create_task(&self, new: NewTask) -> Result<Task> {
        let slug = slugify(&new.title);
        if slug.is_empty() {
            return Err(CatalogError::InvalidTitle { title: new.title });
        }

        let mut tx = self.store.begin().await?;
        let existing = match tx.find_task_by_slug(&slug).await {
            Ok(existing) => existing,
            Err(e) => {
                tx.abort().await;
                return Err(e.into());
            }
        };
        if existing.is_some() {
            tx.abort().await;
            return Err(CatalogError::DuplicateSlug { slug });
        }

        let task = Task {
            id: TaskId::new(),
            slug,
            title: new.title.trim().to_string(),
            description: new.description,
            points: new.points,
            created_at: self.clock.now(),
        };
        if let Err(e) = tx.save_task(&task).await {
            tx.abort().await;
            return Err(e.into());
        }
        tx.commit().await?;

        tracing::info!(slug = %task.slug, points = task.points, "created task");
        Ok(task)
    }

    /// Look up a task. `slug` is normalized first, so a title works too.
    pub async fn find_task(&self, slug: &str) -> Result<Task> {
        let slug = slugify(slug);
        let mut tx = self.store.begin().await?;
        let found = tx.find_task_by_slug(&slug).await;
        tx.abort().await;
        found?.ok_or(CatalogError::NotFound { slug })
    }

    /// Every task, ordered by slug.
    pub async fn list_tasks(&self) -> Result<Vec<Task>> {
        let mut tx = self.store.begin().await?;
        let tasks = tx.list_tasks().await;
        tx.abort().await;
        Ok(tasks?)
    }
}
