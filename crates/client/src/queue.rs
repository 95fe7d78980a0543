//! Queue items and the operations on the item list itself.
//!
//! Nothing here touches the network or spawns tasks; see
//! [`crate::engine`] for that.

use std::fmt;

use serde::Serialize;
use swapdeck_core::generation::VariationResult;
use uuid::Uuid;

use crate::blob::ImageBlob;

/// Where an item is in its lifecycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum ItemStatus {
    Ready,
    Processing,
    /// Every attempt recorded, whether it succeeded or failed. Failures
    /// live in the item's results, not in its status.
    Complete,
}

impl ItemStatus {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Ready => "ready",
            Self::Processing => "processing",
            Self::Complete => "complete",
        }
    }
}

impl fmt::Display for ItemStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct Progress {
    pub completed: u32,
    pub total: u32,
}

/// One target image and everything generated for it.
#[derive(Debug, Clone)]
pub struct QueueItem {
    pub id: Uuid,
    pub target: ImageBlob,
    pub variation_count: u32,
    pub status: ItemStatus,
    /// One entry per finished attempt, in attempt order.
    pub results: Vec<VariationResult>,
    pub progress: Progress,
    pub selected: bool,
}

impl QueueItem {
    pub fn new(target: ImageBlob, variation_count: u32) -> Self {
        Self {
            id: Uuid::new_v4(),
            target,
            variation_count,
            status: ItemStatus::Ready,
            results: Vec::new(),
            progress: Progress {
                completed: 0,
                total: variation_count,
            },
            selected: false,
        }
    }

    /// URLs of the successful attempts, in attempt order.
    pub fn success_urls(&self) -> impl Iterator<Item = &str> {
        self.results.iter().filter_map(VariationResult::url)
    }

    pub fn success_count(&self) -> usize {
        self.success_urls().count()
    }

    pub fn failure_count(&self) -> usize {
        self.results.len() - self.success_count()
    }

    /// Row label: `READY`, `PROCESSING c/t` or `COMPLETE`.
    pub fn status_text(&self) -> String {
        match self.status {
            ItemStatus::Ready => "READY".into(),
            ItemStatus::Processing => {
                format!("PROCESSING {}/{}", self.progress.completed, self.progress.total)
            }
            ItemStatus::Complete => "COMPLETE".into(),
        }
    }
}

/// Counters shown above the queue.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct QueueStats {
    pub total: usize,
    pub ready: usize,
    pub processing: usize,
    pub complete: usize,
    /// Failed attempts recorded across all items.
    pub failed_variations: usize,
    /// Sum of `variation_count` across items.
    pub total_variations: u32,
}

/// Ordered list of queue items.
#[derive(Debug, Clone, Default)]
pub struct BatchQueue {
    items: Vec<QueueItem>,
}

impl BatchQueue {
    pub fn items(&self) -> &[QueueItem] {
        &self.items
    }

    pub fn len(&self) -> usize {
        self.items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    /// Append one `Ready` item per target. Returns the new ids in order.
    pub fn push_targets(&mut self, targets: Vec<ImageBlob>, variation_count: u32) -> Vec<Uuid> {
        let start = self.items.len();
        self.items
            .extend(targets.into_iter().map(|t| QueueItem::new(t, variation_count)));
        self.items[start..].iter().map(|item| item.id).collect()
    }

    pub fn get(&self, id: Uuid) -> Option<&QueueItem> {
        self.items.iter().find(|item| item.id == id)
    }

    pub fn get_mut(&mut self, id: Uuid) -> Option<&mut QueueItem> {
        self.items.iter_mut().find(|item| item.id == id)
    }

    pub fn remove(&mut self, id: Uuid) -> Option<QueueItem> {
        let index = self.items.iter().position(|item| item.id == id)?;
        Some(self.items.remove(index))
    }

    pub fn clear(&mut self) {
        self.items.clear();
    }

    /// Variation count of the first item, used when appending more targets.
    pub fn first_variation_count(&self) -> Option<u32> {
        self.items.first().map(|item| item.variation_count)
    }

    pub fn ready_ids(&self) -> Vec<Uuid> {
        self.items
            .iter()
            .filter(|item| item.status == ItemStatus::Ready)
            .map(|item| item.id)
            .collect()
    }

    pub fn selected_count(&self) -> usize {
        self.items.iter().filter(|item| item.selected).count()
    }

    pub fn all_selected(&self) -> bool {
        !self.items.is_empty() && self.items.iter().all(|item| item.selected)
    }

    /// Select everything, or deselect everything if all were selected.
    pub fn toggle_select_all(&mut self) {
        let target = !self.all_selected();
        for item in &mut self.items {
            item.selected = target;
        }
    }

    /// Flip one item's selection. Returns the new state.
    pub fn toggle(&mut self, id: Uuid) -> Option<bool> {
        let item = self.get_mut(id)?;
        item.selected = !item.selected;
        Some(item.selected)
    }

    /// Drop selected items, keeping the rest in order. Returns how many went.
    pub fn delete_selected(&mut self) -> usize {
        let before = self.items.len();
        self.items.retain(|item| !item.selected);
        before - self.items.len()
    }

    pub fn stats(&self) -> QueueStats {
        let mut stats = QueueStats {
            total: self.items.len(),
            ..QueueStats::default()
        };
        for item in &self.items {
            match item.status {
                ItemStatus::Ready => stats.ready += 1,
                ItemStatus::Processing => stats.processing += 1,
                ItemStatus::Complete => stats.complete += 1,
            }
            stats.failed_variations += item.failure_count();
            stats.total_variations += item.variation_count;
        }
        stats
    }
}

/// Position within an item's successful results for the preview pane.
///
/// Wraps at both ends.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PreviewCursor {
    urls: Vec<String>,
    index: usize,
}

impl PreviewCursor {
    /// `None` if the item has nothing to preview.
    pub fn open(item: &QueueItem) -> Option<Self> {
        let urls: Vec<String> = item.success_urls().map(str::to_string).collect();
        (!urls.is_empty()).then_some(Self { urls, index: 0 })
    }

    pub fn current(&self) -> &str {
        &self.urls[self.index]
    }

    pub fn next(&mut self) -> &str {
        self.index = (self.index + 1) % self.urls.len();
        self.current()
    }

    pub fn prev(&mut self) -> &str {
        self.index = (self.index + self.urls.len() - 1) % self.urls.len();
        self.current()
    }

    /// `"k / n"`, one-based.
    pub fn counter(&self) -> String {
        format!("{} / {}", self.index + 1, self.urls.len())
    }
}
