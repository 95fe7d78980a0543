//! Batch queue engine.
//!
//! [`QueueEngine`] owns the workspace (face reference, dimensions, pending
//! targets, queue) and runs each item's variations on its own tokio task.
//! Items run concurrently with each other; within an item, attempts run
//! strictly in order. The server's admission controller is the only limit
//! on how many items are in flight.
//!
//! Locks are never held across a network call. Each attempt reads the face
//! reference, dimensions and upstream key fresh, so changes made while a
//! batch runs apply from the next attempt on.
//!
//! State changes are published as [`QueueEvent`]s on a
//! [`tokio::sync::broadcast`] channel. Call [`QueueEngine::subscribe`] to
//! receive them.

use std::sync::Arc;

use swapdeck_core::dimensions::Dimensions;
use swapdeck_core::error::CoreError;
use swapdeck_core::generation::{VariationResult, DEFAULT_VARIATION_COUNT, MAX_VARIATION_COUNT};
use swapdeck_core::uploads::check_face_reference_size;
use tokio::sync::{broadcast, Mutex, RwLock};
use tokio::task::JoinHandle;
use uuid::Uuid;

use crate::api::GenerationBackend;
use crate::blob::ImageBlob;
use crate::error::{QueueError, NOT_AUTHORIZED};
use crate::queue::{BatchQueue, ItemStatus, QueueItem, QueueStats};
use crate::session::SessionStore;

/// Capacity of the event channel. Slow subscribers lag rather than block.
const EVENT_CHANNEL_CAPACITY: usize = 256;

/// Confirmation text for deleting the selection.
pub fn delete_selected_prompt(count: usize) -> String {
    format!("DELETE {count} SELECTED ROWS?")
}

/// Confirmation text for clearing everything.
pub const CLEAR_ALL_PROMPT: &str = "CLEAR ALL ROWS AND RESET?";

/// Which screen the workspace is on.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Phase {
    /// Picking a face reference and targets.
    Setup,
    /// The queue has at least one item.
    Queue,
}

/// Published whenever the queue changes.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum QueueEvent {
    /// Items were added, removed, cleared or (de)selected.
    QueueChanged,
    /// An item entered `Processing`.
    ItemStarted { id: Uuid, total: u32 },
    /// One attempt finished and was recorded.
    VariationRecorded {
        id: Uuid,
        completed: u32,
        total: u32,
        success: bool,
    },
    /// An item left `Processing` with every attempt recorded.
    ItemFinished {
        id: Uuid,
        succeeded: usize,
        failed: usize,
    },
}

/// Per-session generation settings.
#[derive(Debug, Clone, Default)]
struct Settings {
    face_reference: Option<ImageBlob>,
    dimensions: Dimensions,
}

/// State shared between the engine handle and its item tasks.
struct Workspace {
    settings: RwLock<Settings>,
    pending: Mutex<Vec<ImageBlob>>,
    queue: Mutex<BatchQueue>,
}

/// Cheap to clone; clones share one workspace.
#[derive(Clone)]
pub struct QueueEngine {
    workspace: Arc<Workspace>,
    session: Arc<SessionStore>,
    backend: Arc<dyn GenerationBackend>,
    event_tx: broadcast::Sender<QueueEvent>,
}

impl QueueEngine {
    pub fn new(session: Arc<SessionStore>, backend: Arc<dyn GenerationBackend>) -> Self {
        let (event_tx, _) = broadcast::channel(EVENT_CHANNEL_CAPACITY);
        Self {
            workspace: Arc::new(Workspace {
                settings: RwLock::new(Settings::default()),
                pending: Mutex::new(Vec::new()),
                queue: Mutex::new(BatchQueue::default()),
            }),
            session,
            backend,
            event_tx,
        }
    }

    pub fn subscribe(&self) -> broadcast::Receiver<QueueEvent> {
        self.event_tx.subscribe()
    }

    pub fn session(&self) -> &Arc<SessionStore> {
        &self.session
    }

    // -----------------------------------------------------------------------
    // Setup
    // -----------------------------------------------------------------------

    /// Set the face reference. Files over the size limit are refused and the
    /// previous reference, if any, is kept.
    pub async fn set_face_reference(&self, blob: ImageBlob) -> Result<(), QueueError> {
        check_face_reference_size(blob.len())?;
        tracing::info!(name = %blob.name, bytes = blob.len(), "Face reference set");
        self.workspace.settings.write().await.face_reference = Some(blob);
        Ok(())
    }

    pub async fn clear_face_reference(&self) {
        self.workspace.settings.write().await.face_reference = None;
    }

    pub async fn face_reference(&self) -> Option<ImageBlob> {
        self.workspace.settings.read().await.face_reference.clone()
    }

    pub async fn set_dimensions(&self, dimensions: Dimensions) {
        self.workspace.settings.write().await.dimensions = dimensions;
    }

    pub async fn dimensions(&self) -> Dimensions {
        self.workspace.settings.read().await.dimensions
    }

    pub async fn add_targets(&self, targets: Vec<ImageBlob>) {
        self.workspace.pending.lock().await.extend(targets);
    }

    pub async fn remove_target(&self, index: usize) -> Result<ImageBlob, QueueError> {
        let mut pending = self.workspace.pending.lock().await;
        if index >= pending.len() {
            return Err(QueueError::TargetIndex(index));
        }
        Ok(pending.remove(index))
    }

    pub async fn pending_targets(&self) -> Vec<String> {
        self.workspace
            .pending
            .lock()
            .await
            .iter()
            .map(|t| t.name.clone())
            .collect()
    }

    /// A face reference is set and at least one target is pending.
    pub async fn can_create_queue(&self) -> bool {
        let has_face = self.workspace.settings.read().await.face_reference.is_some();
        has_face && !self.workspace.pending.lock().await.is_empty()
    }

    /// Turn every pending target into a `Ready` item.
    pub async fn create_queue(&self, variation_count: u32) -> Result<Vec<Uuid>, QueueError> {
        if self.session.api_key().await.is_none() {
            return Err(QueueError::NotAuthorized);
        }
        if self.face_reference().await.is_none() {
            return Err(QueueError::NoFaceReference);
        }
        check_variation_count(variation_count)?;

        let targets = {
            let mut pending = self.workspace.pending.lock().await;
            if pending.is_empty() {
                return Err(QueueError::NoTargets);
            }
            std::mem::take(&mut *pending)
        };

        let ids = self
            .workspace
            .queue
            .lock()
            .await
            .push_targets(targets, variation_count);
        tracing::info!(items = ids.len(), variation_count, "Queue created");
        self.publish(QueueEvent::QueueChanged);
        Ok(ids)
    }

    // -----------------------------------------------------------------------
    // Queue views
    // -----------------------------------------------------------------------

    pub async fn phase(&self) -> Phase {
        if self.workspace.queue.lock().await.is_empty() {
            Phase::Setup
        } else {
            Phase::Queue
        }
    }

    pub async fn items(&self) -> Vec<QueueItem> {
        self.workspace.queue.lock().await.items().to_vec()
    }

    pub async fn item(&self, id: Uuid) -> Option<QueueItem> {
        self.workspace.queue.lock().await.get(id).cloned()
    }

    pub async fn stats(&self) -> QueueStats {
        self.workspace.queue.lock().await.stats()
    }

    // -----------------------------------------------------------------------
    // Generation
    // -----------------------------------------------------------------------

    /// Start a `Ready` item.
    pub async fn generate(&self, id: Uuid) -> Result<JoinHandle<()>, QueueError> {
        self.start(id, |status| status == ItemStatus::Ready).await
    }

    /// Restart a `Complete` item from attempt 0, discarding its results.
    pub async fn regenerate(&self, id: Uuid) -> Result<JoinHandle<()>, QueueError> {
        self.start(id, |status| status == ItemStatus::Complete).await
    }

    /// Start every `Ready` item, each on its own task.
    pub async fn process_all_remaining(&self) -> Result<Vec<JoinHandle<()>>, QueueError> {
        let ready = self.workspace.queue.lock().await.ready_ids();
        if ready.is_empty() {
            return Err(QueueError::NothingReady);
        }

        tracing::info!(items = ready.len(), "Processing all remaining items");
        let mut handles = Vec::with_capacity(ready.len());
        for id in ready {
            // Another caller may have started it in between; skip those.
            match self.generate(id).await {
                Ok(handle) => handles.push(handle),
                Err(QueueError::InvalidState { .. } | QueueError::ItemNotFound(_)) => {}
                Err(other) => return Err(other),
            }
        }
        Ok(handles)
    }

    /// Move an item into `Processing` and spawn its loop. `allowed` decides
    /// which current statuses may start, which also keeps a second loop from
    /// starting on an item that is already running.
    async fn start(
        &self,
        id: Uuid,
        allowed: impl Fn(ItemStatus) -> bool,
    ) -> Result<JoinHandle<()>, QueueError> {
        if self.session.api_key().await.is_none() {
            return Err(QueueError::NotAuthorized);
        }

        let total = {
            let mut queue = self.workspace.queue.lock().await;
            let item = queue.get_mut(id).ok_or(QueueError::ItemNotFound(id))?;
            if !allowed(item.status) {
                return Err(QueueError::InvalidState {
                    id,
                    status: item.status.as_str(),
                });
            }
            if item.status == ItemStatus::Complete {
                item.results.clear();
            }
            item.status = ItemStatus::Processing;
            item.progress.completed = 0;
            item.progress.total = item.variation_count;
            item.variation_count
        };

        self.publish(QueueEvent::ItemStarted { id, total });
        let engine = self.clone();
        Ok(tokio::spawn(async move { engine.run_item(id, total).await }))
    }

    /// Issue `total` attempts for one item, recording each as it lands.
    async fn run_item(self, id: Uuid, total: u32) {
        let Some(target) = self.item(id).await.map(|item| item.target) else {
            return;
        };

        for attempt in 0..total {
            let result = self.attempt(&target).await;
            if !result.is_success() {
                tracing::warn!(%id, attempt, result = ?result, "Variation failed");
            }

            let mut queue = self.workspace.queue.lock().await;
            let Some(item) = queue.get_mut(id) else {
                tracing::debug!(%id, attempt, "Item removed while processing, discarding result");
                return;
            };
            let success = result.is_success();
            item.results.push(result);
            item.progress.completed = attempt + 1;
            drop(queue);

            self.publish(QueueEvent::VariationRecorded {
                id,
                completed: attempt + 1,
                total,
                success,
            });
        }

        // Complete regardless of how many attempts failed.
        let (succeeded, failed) = {
            let mut queue = self.workspace.queue.lock().await;
            let Some(item) = queue.get_mut(id) else {
                return;
            };
            item.status = ItemStatus::Complete;
            (item.success_count(), item.failure_count())
        };

        tracing::info!(%id, succeeded, failed, "Item finished");
        self.publish(QueueEvent::ItemFinished {
            id,
            succeeded,
            failed,
        });
    }

    /// One generation with the settings as they are right now.
    async fn attempt(&self, target: &ImageBlob) -> VariationResult {
        let (face, dimensions) = {
            let settings = self.workspace.settings.read().await;
            (settings.face_reference.clone(), settings.dimensions)
        };
        let Some(face) = face else {
            return VariationResult::failure("No face reference selected");
        };
        let Some(api_key) = self.session.api_key().await else {
            return VariationResult::failure(NOT_AUTHORIZED);
        };

        match self
            .backend
            .process_single(&face, target, &api_key, dimensions)
            .await
        {
            Ok(response) => response.into_variation_result(),
            Err(err) => VariationResult::failure(err.to_string()),
        }
    }

    // -----------------------------------------------------------------------
    // Bulk operations
    // -----------------------------------------------------------------------

    /// Append more targets using the first item's variation count.
    pub async fn add_more(&self, targets: Vec<ImageBlob>) -> Vec<Uuid> {
        let ids = {
            let mut queue = self.workspace.queue.lock().await;
            let count = queue.first_variation_count().unwrap_or(DEFAULT_VARIATION_COUNT);
            queue.push_targets(targets, count)
        };
        self.publish(QueueEvent::QueueChanged);
        ids
    }

    /// Remove one item. An in-flight loop for it stops after its current
    /// attempt. Returns the phase afterwards.
    pub async fn remove(&self, id: Uuid) -> Result<Phase, QueueError> {
        let now_empty = {
            let mut queue = self.workspace.queue.lock().await;
            queue.remove(id).ok_or(QueueError::ItemNotFound(id))?;
            queue.is_empty()
        };
        self.publish(QueueEvent::QueueChanged);
        Ok(if now_empty { Phase::Setup } else { Phase::Queue })
    }

    pub async fn toggle_selected(&self, id: Uuid) -> Result<bool, QueueError> {
        let selected = self
            .workspace
            .queue
            .lock()
            .await
            .toggle(id)
            .ok_or(QueueError::ItemNotFound(id))?;
        self.publish(QueueEvent::QueueChanged);
        Ok(selected)
    }

    pub async fn select_all(&self) {
        self.workspace.queue.lock().await.toggle_select_all();
        self.publish(QueueEvent::QueueChanged);
    }

    /// Delete the selected items after `confirm` accepts the prompt.
    /// Returns how many were deleted; zero if nothing was selected or the
    /// prompt was declined.
    ///
    /// The queue stays locked while `confirm` runs, so the count in the
    /// prompt is the count deleted.
    pub async fn delete_selected(&self, confirm: impl FnOnce(&str) -> bool) -> usize {
        let deleted = {
            let mut queue = self.workspace.queue.lock().await;
            let count = queue.selected_count();
            if count == 0 || !confirm(&delete_selected_prompt(count)) {
                return 0;
            }
            queue.delete_selected()
        };
        tracing::info!(deleted, "Deleted selected items");
        self.publish(QueueEvent::QueueChanged);
        deleted
    }

    /// Empty the queue and the pending targets and go back to setup. Asks
    /// `confirm` first when the queue has items. Returns whether it cleared.
    pub async fn clear_all(&self, confirm: impl FnOnce(&str) -> bool) -> bool {
        {
            let mut queue = self.workspace.queue.lock().await;
            if !queue.is_empty() && !confirm(CLEAR_ALL_PROMPT) {
                return false;
            }
            queue.clear();
        }
        self.workspace.pending.lock().await.clear();
        self.publish(QueueEvent::QueueChanged);
        true
    }

    fn publish(&self, event: QueueEvent) {
        // No subscribers is fine.
        let _ = self.event_tx.send(event);
    }
}

fn check_variation_count(count: u32) -> Result<(), CoreError> {
    if count == 0 || count > MAX_VARIATION_COUNT {
        return Err(CoreError::Validation(format!(
            "Variation count must be between 1 and {MAX_VARIATION_COUNT}, got {count}"
        )));
    }
    Ok(())
}
