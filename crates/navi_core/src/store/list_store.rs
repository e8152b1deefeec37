//! Task list templates (`users/{uid}/lists`).
//!
//! # Invariants
//! - Lists are mirrored newest first (`createdAt DESC`).
//! - Task mutations rewrite the whole `tasks` array of the parent list from
//!   the mirrored copy. Two writers racing on one list: last write wins.
//! - Deleting a task leaves the remaining `order` values untouched.

use super::{decode_all, not_found_as, StoreCore, StoreError, StoreResult, StoreState};
use crate::backend::{
    field, to_fields, BackendError, CollectionPath, DocumentStore, OrderBy, FIELD_CREATED_AT,
};
use crate::model::task_list::{
    NewTask, NewTaskList, Task, TaskId, TaskList, TaskListPatch, TaskPatch,
};
use crate::observe::Subscription;
use log::info;
use std::sync::Arc;

const LISTS_ORDER: OrderBy = OrderBy::desc(FIELD_CREATED_AT);

pub struct ListStore {
    backend: Arc<dyn DocumentStore>,
    core: StoreCore<Vec<TaskList>>,
}

impl ListStore {
    pub fn new(backend: Arc<dyn DocumentStore>) -> Self {
        Self {
            backend,
            core: StoreCore::new("lists"),
        }
    }

    /// Mirrors the user's lists, replacing any previous listener.
    pub fn subscribe(&self, user_id: &str) -> StoreResult<Subscription> {
        self.core.attach_collection(
            self.backend.as_ref(),
            &CollectionPath::lists(user_id),
            Some(LISTS_ORDER),
            decode_all::<TaskList>,
        )
    }

    pub fn state(&self) -> StoreState<Vec<TaskList>> {
        self.core.state()
    }

    pub fn lists(&self) -> Vec<TaskList> {
        self.core.data()
    }

    pub fn find_list(&self, list_id: &str) -> Option<TaskList> {
        self.core.data().into_iter().find(|list| list.id == list_id)
    }

    pub fn watch(
        &self,
        listener: impl Fn(&StoreState<Vec<TaskList>>) + Send + Sync + 'static,
    ) -> Subscription {
        self.core.watch(listener)
    }

    pub fn is_subscribed(&self) -> bool {
        self.core.is_attached()
    }

    pub fn clear_error(&self) {
        self.core.clear_error();
    }

    pub fn reset(&self) {
        self.core.reset();
    }

    /// Creates a list and returns its id.
    pub fn create_list(&self, user_id: &str, list: NewTaskList) -> StoreResult<String> {
        let list = NewTaskList {
            tasks: list.tasks,
            ..NewTaskList::new(&list.title, list.duration)
                .map_err(|err| self.core.fail("list_create", err.into()))?
        };
        let id = to_fields(&list)
            .and_then(|fields| {
                self.backend
                    .add_document(&CollectionPath::lists(user_id), fields)
            })
            .map_err(|err| self.core.fail("list_create", err.into()))?;
        info!("event=list_create module=store status=ok list_id={id}");
        Ok(id)
    }

    pub fn update_list(
        &self,
        user_id: &str,
        list_id: &str,
        patch: TaskListPatch,
    ) -> StoreResult<()> {
        let patch = patch
            .validated()
            .map_err(|err| self.core.fail("list_update", err.into()))?;
        if patch.is_empty() {
            return Ok(());
        }
        to_fields(&patch)
            .and_then(|fields| {
                self.backend
                    .update_document(&CollectionPath::lists(user_id).doc(list_id), fields)
            })
            .map_err(|err| {
                let err = not_found_as(err, || StoreError::ListNotFound(list_id.to_string()));
                self.core.fail("list_update", err)
            })?;
        info!("event=list_update module=store status=ok list_id={list_id}");
        Ok(())
    }

    pub fn delete_list(&self, user_id: &str, list_id: &str) -> StoreResult<()> {
        self.backend
            .delete_document(&CollectionPath::lists(user_id).doc(list_id))
            .map_err(|err| self.core.fail("list_delete", err.into()))?;
        info!("event=list_delete module=store status=ok list_id={list_id}");
        Ok(())
    }

    /// Appends a task with a fresh id and `order` equal to the task count.
    pub fn add_task(&self, user_id: &str, list_id: &str, task: NewTask) -> StoreResult<Task> {
        let task = NewTask::new(&task.title, task.reset_daily)
            .map_err(|err| self.core.fail("task_add", err.into()))?;
        let list = self.mirrored_list("task_add", list_id)?;
        let created = Task::new(task.title, task.reset_daily, list.next_task_order());
        let mut tasks = list.tasks;
        tasks.push(created.clone());
        self.write_tasks("task_add", user_id, list_id, &tasks)?;
        info!(
            "event=task_add module=store status=ok list_id={} task_id={}",
            list_id, created.id
        );
        Ok(created)
    }

    pub fn update_task(
        &self,
        user_id: &str,
        list_id: &str,
        task_id: &str,
        patch: TaskPatch,
    ) -> StoreResult<()> {
        let patch = patch
            .validated()
            .map_err(|err| self.core.fail("task_update", err.into()))?;
        let mut tasks = self.mirrored_tasks("task_update", list_id)?;
        let task = tasks
            .iter_mut()
            .find(|task| task.id == task_id)
            .ok_or_else(|| self.core.fail("task_update", task_missing(list_id, task_id)))?;
        patch.apply(task);
        self.write_tasks("task_update", user_id, list_id, &tasks)
    }

    pub fn delete_task(&self, user_id: &str, list_id: &str, task_id: &str) -> StoreResult<()> {
        let mut tasks = self.mirrored_tasks("task_delete", list_id)?;
        let before = tasks.len();
        tasks.retain(|task| task.id != task_id);
        if tasks.len() == before {
            return Err(self
                .core
                .fail("task_delete", task_missing(list_id, task_id)));
        }
        self.write_tasks("task_delete", user_id, list_id, &tasks)
    }

    /// Puts tasks in the order of `ordered_ids` and renumbers `order` to the
    /// position index. Tasks not named keep their relative order at the end.
    pub fn reorder_tasks(
        &self,
        user_id: &str,
        list_id: &str,
        ordered_ids: &[TaskId],
    ) -> StoreResult<()> {
        let mut remaining = self.mirrored_tasks("task_reorder", list_id)?;
        let mut reordered = Vec::with_capacity(remaining.len());
        for task_id in ordered_ids {
            let position = remaining
                .iter()
                .position(|task| &task.id == task_id)
                .ok_or_else(|| self.core.fail("task_reorder", task_missing(list_id, task_id)))?;
            reordered.push(remaining.remove(position));
        }
        reordered.append(&mut remaining);
        for (index, task) in reordered.iter_mut().enumerate() {
            task.order = i64::try_from(index).unwrap_or(i64::MAX);
        }
        self.write_tasks("task_reorder", user_id, list_id, &reordered)
    }

    fn mirrored_list(&self, operation: &'static str, list_id: &str) -> StoreResult<TaskList> {
        self.find_list(list_id).ok_or_else(|| {
            self.core
                .fail(operation, StoreError::ListNotFound(list_id.to_string()))
        })
    }

    fn mirrored_tasks(&self, operation: &'static str, list_id: &str) -> StoreResult<Vec<Task>> {
        Ok(self.mirrored_list(operation, list_id)?.tasks)
    }

    fn write_tasks(
        &self,
        operation: &'static str,
        user_id: &str,
        list_id: &str,
        tasks: &[Task],
    ) -> StoreResult<()> {
        serde_json::to_value(tasks)
            .map_err(BackendError::from)
            .and_then(|tasks| {
                self.backend.update_document(
                    &CollectionPath::lists(user_id).doc(list_id),
                    field("tasks", tasks),
                )
            })
            .map_err(|err| {
                let err = not_found_as(err, || StoreError::ListNotFound(list_id.to_string()));
                self.core.fail(operation, err)
            })
    }
}

fn task_missing(list_id: &str, task_id: &str) -> StoreError {
    StoreError::TaskNotFound {
        list_id: list_id.to_string(),
        task_id: task_id.to_string(),
    }
}
