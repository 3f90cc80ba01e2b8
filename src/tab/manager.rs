//! Tab registry: the ordered set of open workspace tabs

use super::{TabId, WorkspaceTab};
use crate::session::TabSet;
use chrono::{DateTime, TimeDelta, Utc};
use std::collections::HashSet;

/// Owns the open tabs in display order plus the active tab.
///
/// The dashboard tab is always present and `active_tab_id` always refers to
/// an open tab.
#[derive(Debug, Clone)]
pub struct TabRegistry {
    /// All open tabs, in order
    tabs: Vec<WorkspaceTab>,
    /// Currently active tab ID
    active_tab_id: Option<TabId>,
    /// Route used when the dashboard has to be recreated
    dashboard_route: String,
    /// Most recent `last_active_at` handed out
    last_stamp: DateTime<Utc>,
}

impl TabRegistry {
    /// Create a registry holding only the (active) dashboard tab
    pub fn new(dashboard_route: impl Into<String>) -> Self {
        let mut registry = Self {
            tabs: Vec::new(),
            active_tab_id: None,
            dashboard_route: dashboard_route.into(),
            last_stamp: DateTime::<Utc>::UNIX_EPOCH,
        };
        registry.ensure_dashboard();
        registry.activate(&TabId::dashboard());
        registry
    }

    /// Open a tab, or focus it if already open.
    ///
    /// An existing tab matches by id first, then by route. Returns the id of
    /// the tab that ended up active.
    pub fn open_or_focus(&mut self, tab: WorkspaceTab) -> TabId {
        if let Some(id) = self.find_open(&tab) {
            log::debug!("Focusing already open tab {} for route {}", id, tab.route);
            self.activate(&id);
            return id;
        }

        let id = tab.id.clone();
        self.tabs.push(tab);
        self.activate(&id);
        log::info!("Opened tab {} (total: {})", id, self.tabs.len());
        id
    }

    /// Close a tab by ID
    ///
    /// No-op for the dashboard, for pinned tabs and for unknown ids. When the
    /// active tab closes, the remaining tab with the latest `last_active_at`
    /// takes over. Returns the removed tab.
    pub fn close_tab(&mut self, id: &TabId) -> Option<WorkspaceTab> {
        if id.is_dashboard() {
            log::debug!("Ignoring close of the dashboard tab");
            return None;
        }
        let idx = self.tabs.iter().position(|t| &t.id == id)?;
        if self.tabs[idx].is_pinned {
            log::debug!("Ignoring close of pinned tab {}", id);
            return None;
        }

        log::info!("Closing tab {} (index {})", id, idx);
        let tab = self.tabs.remove(idx);

        if self.active_tab_id.as_ref() == Some(id) {
            self.ensure_dashboard();
            let successor = self
                .tabs
                .iter()
                .max_by_key(|t| t.last_active_at)
                .map(|t| t.id.clone())
                .unwrap_or_else(TabId::dashboard);
            self.activate(&successor);
        }

        Some(tab)
    }

    /// Close every tab except `keep` and the dashboard.
    ///
    /// Pinned tabs are closed too. `keep` becomes active; if it is not open
    /// the dashboard does. Returns the removed tabs in their previous order.
    pub fn close_all_except(&mut self, keep: &TabId) -> Vec<WorkspaceTab> {
        let keep_open = self.tabs.iter().any(|t| &t.id == keep);
        let (kept, removed): (Vec<_>, Vec<_>) = self
            .tabs
            .drain(..)
            .partition(|t| &t.id == keep || t.is_dashboard());
        self.tabs = kept;
        self.ensure_dashboard();

        let target = if keep_open {
            keep.clone()
        } else {
            TabId::dashboard()
        };
        self.activate(&target);

        log::info!(
            "Closed {} tabs, kept {} (total: {})",
            removed.len(),
            target,
            self.tabs.len()
        );
        removed
    }

    /// Make a tab active. Returns false if it is not open.
    pub fn focus_tab(&mut self, id: &TabId) -> bool {
        if self.get_tab(id).is_none() {
            return false;
        }
        self.activate(id);
        true
    }

    pub fn pin_tab(&mut self, id: &TabId) -> bool {
        self.set_pinned(id, true)
    }

    pub fn unpin_tab(&mut self, id: &TabId) -> bool {
        self.set_pinned(id, false)
    }

    /// Flip the pinned flag. Returns the new state, or `None` for unknown ids.
    pub fn toggle_pin(&mut self, id: &TabId) -> Option<bool> {
        let tab = self.get_tab_mut(id)?;
        tab.is_pinned = !tab.is_pinned;
        Some(tab.is_pinned)
    }

    /// Returns true if the flag actually changed.
    fn set_pinned(&mut self, id: &TabId, pinned: bool) -> bool {
        match self.get_tab_mut(id) {
            Some(tab) if tab.is_pinned != pinned => {
                tab.is_pinned = pinned;
                log::debug!("Tab {} pinned={}", id, pinned);
                true
            }
            _ => false,
        }
    }

    /// Set or clear the unsaved-changes flag. Returns false for unknown ids.
    pub fn mark_dirty(&mut self, id: &TabId, dirty: bool) -> bool {
        match self.get_tab_mut(id) {
            Some(tab) => {
                tab.has_unsaved_changes = dirty;
                true
            }
            None => false,
        }
    }

    /// Rebuild the order from `new_order`.
    ///
    /// Unknown ids are ignored and open tabs missing from `new_order` are
    /// appended in their previous relative order, so no tab is ever lost.
    /// Returns true if the order changed.
    pub fn reorder(&mut self, new_order: &[TabId]) -> bool {
        if self.tabs.is_empty() || new_order.is_empty() {
            return false;
        }

        let old_order: Vec<TabId> = self.tabs.iter().map(|t| t.id.clone()).collect();

        let mut remaining: Vec<Option<WorkspaceTab>> = self.tabs.drain(..).map(Some).collect();
        let mut reordered = Vec::with_capacity(remaining.len());
        for id in new_order {
            if let Some(slot) = remaining
                .iter_mut()
                .find(|slot| slot.as_ref().is_some_and(|t| &t.id == id))
            {
                reordered.extend(slot.take());
            }
        }
        reordered.extend(remaining.into_iter().flatten());
        self.tabs = reordered;

        let changed = self.tabs.iter().map(|t| &t.id).ne(old_order.iter());
        if changed {
            log::debug!("Reordered {} tabs", self.tabs.len());
        }
        changed
    }

    /// Re-insert a previously closed tab at the end and focus it.
    ///
    /// If a tab with the same id, or else the same route, is already open
    /// it is just focused. The tab comes back clean.
    pub fn reopen(&mut self, mut tab: WorkspaceTab) -> TabId {
        if let Some(id) = self.find_open(&tab) {
            log::debug!("Reopen of {} focuses open tab {}", tab.id, id);
            self.activate(&id);
            return id;
        }
        let id = tab.id.clone();
        tab.has_unsaved_changes = false;
        self.tabs.push(tab);
        self.activate(&id);
        log::info!("Reopened tab {} (total: {})", id, self.tabs.len());
        id
    }

    /// Replace the contents with a stored tab set.
    ///
    /// Duplicate ids are dropped, a missing dashboard is re-inserted at the
    /// front and an unknown `active_tab_id` falls back to the dashboard.
    /// Returns false (leaving the registry untouched) for an empty set.
    pub fn restore(&mut self, set: TabSet) -> bool {
        if set.tabs.is_empty() {
            return false;
        }

        let mut seen = HashSet::new();
        let mut tabs = Vec::with_capacity(set.tabs.len() + 1);
        for persisted in set.tabs {
            if !seen.insert(persisted.id.clone()) {
                log::warn!("Dropping duplicate tab {} from stored tab set", persisted.id);
                continue;
            }
            tabs.push(WorkspaceTab::from_persisted(persisted));
        }
        if !tabs.iter().any(WorkspaceTab::is_dashboard) {
            tabs.insert(0, WorkspaceTab::dashboard(self.dashboard_route.clone()));
        }
        for tab in &mut tabs {
            tab.last_active_at = self.stamp();
        }
        self.tabs = tabs;

        let active = set
            .active_tab_id
            .filter(|id| self.get_tab(id).is_some())
            .unwrap_or_else(TabId::dashboard);
        self.activate(&active);

        log::info!(
            "Restored {} tabs (active: {})",
            self.tabs.len(),
            active
        );
        true
    }

    /// The persisted form of the current state.
    pub fn snapshot(&self) -> TabSet {
        TabSet {
            tabs: self.tabs.iter().map(WorkspaceTab::to_persisted).collect(),
            active_tab_id: self.active_tab_id.clone(),
        }
    }

    /// Move focus one tab forward or back in display order (wraps around).
    ///
    /// Returns the newly active id, or `None` when there is nothing to cycle to.
    pub fn cycle(&mut self, forward: bool) -> Option<TabId> {
        if self.tabs.len() <= 1 {
            return None;
        }
        let current_idx = self.active_tab_index().unwrap_or(0);
        let len = self.tabs.len();
        let next_idx = if forward {
            (current_idx + 1) % len
        } else if current_idx == 0 {
            len - 1
        } else {
            current_idx - 1
        };
        let next_id = self.tabs[next_idx].id.clone();
        self.activate(&next_id);
        Some(next_id)
    }

    /// Switch to the next tab (wraps around)
    pub fn next_tab(&mut self) -> Option<TabId> {
        self.cycle(true)
    }

    /// Switch to the previous tab (wraps around)
    pub fn prev_tab(&mut self) -> Option<TabId> {
        self.cycle(false)
    }

    /// Tab at a 1-based position
    pub fn tab_at(&self, ordinal: usize) -> Option<&WorkspaceTab> {
        ordinal.checked_sub(1).and_then(|idx| self.tabs.get(idx))
    }

    /// Switch to the tab at a 1-based position
    pub fn switch_to_index(&mut self, ordinal: usize) -> Option<TabId> {
        let id = self.tab_at(ordinal)?.id.clone();
        self.activate(&id);
        Some(id)
    }

    pub fn active_tab(&self) -> Option<&WorkspaceTab> {
        self.active_tab_id.as_ref().and_then(|id| self.get_tab(id))
    }

    pub fn active_tab_id(&self) -> Option<&TabId> {
        self.active_tab_id.as_ref()
    }

    pub fn active_tab_index(&self) -> Option<usize> {
        let id = self.active_tab_id.as_ref()?;
        self.tabs.iter().position(|t| &t.id == id)
    }

    pub fn tabs(&self) -> &[WorkspaceTab] {
        &self.tabs
    }

    pub fn get_tab(&self, id: &TabId) -> Option<&WorkspaceTab> {
        self.tabs.iter().find(|t| &t.id == id)
    }

    fn get_tab_mut(&mut self, id: &TabId) -> Option<&mut WorkspaceTab> {
        self.tabs.iter_mut().find(|t| &t.id == id)
    }

    pub fn tab_count(&self) -> usize {
        self.tabs.len()
    }

    /// Tabs with unsaved changes, in display order
    pub fn dirty_tabs(&self) -> impl Iterator<Item = &WorkspaceTab> {
        self.tabs.iter().filter(|t| t.has_unsaved_changes)
    }

    pub fn dashboard_route(&self) -> &str {
        &self.dashboard_route
    }

    /// Open tab matching `tab` by id, then by route.
    fn find_open(&self, tab: &WorkspaceTab) -> Option<TabId> {
        self.tabs
            .iter()
            .find(|t| t.id == tab.id)
            .or_else(|| self.tabs.iter().find(|t| t.route == tab.route))
            .map(|t| t.id.clone())
    }

    fn activate(&mut self, id: &TabId) {
        let stamp = self.stamp();
        if let Some(tab) = self.get_tab_mut(id) {
            tab.last_active_at = stamp;
            self.active_tab_id = Some(id.clone());
        }
    }

    fn ensure_dashboard(&mut self) {
        if !self.tabs.iter().any(WorkspaceTab::is_dashboard) {
            log::debug!("Recreating dashboard tab");
            self.tabs
                .insert(0, WorkspaceTab::dashboard(self.dashboard_route.clone()));
        }
    }

    /// Wall-clock stamp, nudged forward so stamps never repeat.
    fn stamp(&mut self) -> DateTime<Utc> {
        let now = Utc::now();
        let next = if now > self.last_stamp {
            now
        } else {
            self.last_stamp + TimeDelta::microseconds(1)
        };
        self.last_stamp = next;
        next
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::session::PersistedTab;

    fn tab(id: &str) -> WorkspaceTab {
        WorkspaceTab::new(format!("/records/{id}"), id.to_uppercase(), "records").with_id(id)
    }

    fn registry_with(ids: &[&str]) -> TabRegistry {
        let mut registry = TabRegistry::new("/dashboard");
        for id in ids {
            registry.open_or_focus(tab(id));
        }
        registry
    }

    fn order(registry: &TabRegistry) -> Vec<&str> {
        registry.tabs().iter().map(|t| t.id.as_str()).collect()
    }

    fn active(registry: &TabRegistry) -> &str {
        registry.active_tab_id().map(TabId::as_str).unwrap_or_default()
    }

    #[test]
    fn new_registry_has_active_dashboard() {
        let registry = TabRegistry::new("/dashboard");
        assert_eq!(order(&registry), vec!["dashboard"]);
        assert_eq!(active(&registry), "dashboard");
        assert_eq!(registry.tabs()[0].route, "/dashboard");
    }

    #[test]
    fn open_or_focus_matches_id_then_route() {
        let mut registry = registry_with(&["a", "b"]);

        let again = registry.open_or_focus(tab("a"));
        assert_eq!(again.as_str(), "a");
        assert_eq!(registry.tab_count(), 3);

        let same_route = WorkspaceTab::new("/records/b", "B again", "records");
        let focused = registry.open_or_focus(same_route);
        assert_eq!(focused.as_str(), "b");
        assert_eq!(registry.tab_count(), 3);
        assert_eq!(active(&registry), "b");
    }

    #[test]
    fn stamps_strictly_increase() {
        let mut registry = registry_with(&["a", "b", "c"]);
        registry.focus_tab(&"a".into());
        let mut stamps: Vec<_> = registry.tabs().iter().map(|t| t.last_active_at).collect();
        let len = stamps.len();
        stamps.sort();
        stamps.dedup();
        assert_eq!(stamps.len(), len);
    }

    #[test]
    fn close_active_picks_most_recently_active() {
        let mut registry = registry_with(&["a", "b", "c"]);
        registry.focus_tab(&"a".into());
        registry.focus_tab(&"c".into());

        let closed = registry.close_tab(&"c".into());
        assert_eq!(closed.map(|t| t.id), Some("c".into()));
        assert_eq!(active(&registry), "a");
    }

    #[test]
    fn close_inactive_keeps_active() {
        let mut registry = registry_with(&["a", "b"]);
        registry.close_tab(&"a".into());
        assert_eq!(active(&registry), "b");
        assert_eq!(order(&registry), vec!["dashboard", "b"]);
    }

    #[test]
    fn close_last_regular_tab_falls_back_to_dashboard() {
        let mut registry = registry_with(&["a"]);
        registry.close_tab(&"a".into());
        assert_eq!(active(&registry), "dashboard");
    }

    #[test]
    fn dashboard_and_pinned_tabs_are_protected() {
        let mut registry = registry_with(&["a"]);
        registry.pin_tab(&"a".into());

        assert!(registry.close_tab(&TabId::dashboard()).is_none());
        assert!(registry.close_tab(&"a".into()).is_none());
        assert!(registry.close_tab(&"missing".into()).is_none());
        assert_eq!(order(&registry), vec!["dashboard", "a"]);
    }

    #[test]
    fn close_all_except_dashboard_removes_pinned() {
        let mut registry = registry_with(&["a", "b"]);
        registry.pin_tab(&"a".into());

        let removed = registry.close_all_except(&TabId::dashboard());
        assert_eq!(removed.len(), 2);
        assert_eq!(order(&registry), vec!["dashboard"]);
        assert_eq!(active(&registry), "dashboard");
    }

    #[test]
    fn close_all_except_keeps_target_and_dashboard() {
        let mut registry = registry_with(&["a", "b", "c"]);
        registry.close_all_except(&"b".into());
        assert_eq!(order(&registry), vec!["dashboard", "b"]);
        assert_eq!(active(&registry), "b");
    }

    #[test]
    fn toggle_pin_reports_new_state() {
        let mut registry = registry_with(&["a"]);
        assert_eq!(registry.toggle_pin(&"a".into()), Some(true));
        assert_eq!(registry.toggle_pin(&"a".into()), Some(false));
        assert_eq!(registry.toggle_pin(&"zz".into()), None);
        assert!(!registry.unpin_tab(&"a".into()));
    }

    #[test]
    fn reorder_appends_missing_and_ignores_unknown() {
        let mut registry = registry_with(&["a", "b", "c"]);
        let changed = registry.reorder(&["c".into(), "ghost".into(), "a".into()]);
        assert!(changed);
        assert_eq!(order(&registry), vec!["c", "a", "dashboard", "b"]);
    }

    #[test]
    fn reorder_same_order_is_unchanged() {
        let mut registry = registry_with(&["a", "b"]);
        assert!(!registry.reorder(&["dashboard".into(), "a".into(), "b".into()]));
        assert!(!registry.reorder(&[]));
    }

    #[test]
    fn reopen_focuses_existing_or_appends_clean() {
        let mut registry = registry_with(&["a", "b"]);
        let mut closed = registry.close_tab(&"b".into()).unwrap_or_else(|| tab("b"));
        closed.has_unsaved_changes = true;

        registry.reopen(closed);
        assert_eq!(order(&registry), vec!["dashboard", "a", "b"]);
        assert_eq!(active(&registry), "b");
        assert_eq!(registry.dirty_tabs().count(), 0);

        registry.reopen(tab("a"));
        assert_eq!(registry.tab_count(), 3);
        assert_eq!(active(&registry), "a");
    }

    #[test]
    fn reopen_focuses_a_tab_open_on_the_same_route() {
        let mut registry = registry_with(&["a", "b"]);
        let closed = registry.close_tab(&"b".into()).unwrap_or_else(|| tab("b"));
        let fresh = WorkspaceTab::new(closed.route.clone(), "B again", "records");
        let fresh_id = registry.open_or_focus(fresh);
        registry.focus_tab(&"a".into());

        assert_eq!(registry.reopen(closed), fresh_id);
        assert_eq!(registry.tab_count(), 3);
        assert_eq!(active(&registry), fresh_id.as_str());
    }

    #[test]
    fn cycle_wraps_both_directions() {
        let mut registry = registry_with(&["a", "b"]);
        assert_eq!(registry.next_tab(), Some(TabId::dashboard()));
        assert_eq!(registry.prev_tab(), Some("b".into()));
        assert_eq!(registry.prev_tab(), Some("a".into()));
    }

    #[test]
    fn ordinal_lookup_is_one_based() {
        let mut registry = registry_with(&["a", "b"]);
        assert_eq!(registry.tab_at(0), None);
        assert_eq!(registry.switch_to_index(2), Some("a".into()));
        assert_eq!(registry.switch_to_index(9), None);
        assert_eq!(active(&registry), "a");
    }

    #[test]
    fn restore_normalizes_stored_set() {
        let persisted = |id: &str| tab(id).to_persisted();
        let set = TabSet {
            tabs: vec![persisted("a"), persisted("b"), persisted("a")],
            active_tab_id: Some("gone".into()),
        };

        let mut registry = TabRegistry::new("/dashboard");
        assert!(registry.restore(set));
        assert_eq!(order(&registry), vec!["dashboard", "a", "b"]);
        assert_eq!(active(&registry), "dashboard");
    }

    #[test]
    fn restore_snapshot_is_stable() {
        let set = TabSet {
            tabs: vec![
                WorkspaceTab::dashboard("/dashboard").to_persisted(),
                PersistedTab {
                    is_pinned: true,
                    ..tab("a").to_persisted()
                },
            ],
            active_tab_id: Some("a".into()),
        };

        let mut registry = TabRegistry::new("/dashboard");
        registry.restore(set.clone());
        assert_eq!(registry.snapshot(), set);
        assert_eq!(registry.snapshot().content_hash(), set.content_hash());
    }

    #[test]
    fn restore_rejects_empty_set() {
        let mut registry = registry_with(&["a"]);
        assert!(!registry.restore(TabSet::default()));
        assert_eq!(order(&registry), vec!["dashboard", "a"]);
    }
}
