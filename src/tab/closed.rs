//! Bounded history of closed tabs for "reopen last closed tab"

use super::WorkspaceTab;
use std::collections::VecDeque;

/// LIFO stack of recently closed tabs with FIFO eviction once full.
#[derive(Debug, Clone)]
pub struct LastClosedStack {
    entries: VecDeque<WorkspaceTab>,
    capacity: usize,
}

impl LastClosedStack {
    pub fn new(capacity: usize) -> Self {
        Self {
            entries: VecDeque::with_capacity(capacity),
            capacity,
        }
    }

    /// Remember a closed tab. Unsaved changes are not carried over.
    pub fn push(&mut self, mut tab: WorkspaceTab) {
        if self.capacity == 0 {
            return;
        }
        tab.has_unsaved_changes = false;
        while self.entries.len() >= self.capacity {
            if let Some(evicted) = self.entries.pop_front() {
                log::debug!("Evicting closed tab {} from history", evicted.id);
            }
        }
        self.entries.push_back(tab);
    }

    /// Most recently closed tab, if any
    pub fn pop(&mut self) -> Option<WorkspaceTab> {
        self.entries.pop_back()
    }

    pub fn peek(&self) -> Option<&WorkspaceTab> {
        self.entries.back()
    }

    /// Forget everything (used on logout)
    pub fn clear(&mut self) {
        self.entries.clear();
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }
}

impl Default for LastClosedStack {
    fn default() -> Self {
        Self::new(worktab_config::defaults::closed_tab_history())
    }
}
