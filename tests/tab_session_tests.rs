//! End-to-end behaviour of a `TabSession`: tab lifecycle, shortcuts, the
//! unsaved changes guard and logout.

use std::collections::HashSet;
use std::sync::Arc;
use worktab::services::{HistoryNavigator, LocalAuth, ScratchStorage};
use worktab::session::{MemoryTabStore, SyncPhase, UserId};
use worktab::shortcuts::{ShortcutDispatcher, TabAction};
use worktab::tab_session::{ActionOutcome, Collaborators, TabSession};
use worktab::{TabId, WorkspaceTab};
use worktab_config::Config;
use worktab_keybindings::{KeyInput, Platform, parse_key_combo};

struct Fixture {
    session: TabSession<MemoryTabStore>,
    store: Arc<MemoryTabStore>,
    nav: HistoryNavigator,
    auth: LocalAuth,
    scratch: ScratchStorage,
}

fn fixture() -> Fixture {
    let store = Arc::new(MemoryTabStore::new());
    let nav = HistoryNavigator::new();
    let auth = LocalAuth::signed_in(UserId::new("alice"));
    let scratch = ScratchStorage::new();
    let config = Config::default();
    let session = TabSession::with_shortcuts(
        &config,
        Arc::clone(&store),
        Collaborators {
            navigator: Box::new(nav.clone()),
            auth: Box::new(auth.clone()),
            scratch: Box::new(scratch.clone()),
        },
        ShortcutDispatcher::for_platform(&config, Platform::Other),
    );
    Fixture {
        session,
        store,
        nav,
        auth,
        scratch,
    }
}

fn tab(id: &str) -> WorkspaceTab {
    WorkspaceTab::new(format!("/records/{id}"), id.to_uppercase(), "records").with_id(id)
}

fn key(combo: &str) -> KeyInput {
    KeyInput::from_combo(&parse_key_combo(combo).unwrap(), Platform::Other)
}

fn ids(session: &TabSession<MemoryTabStore>) -> Vec<String> {
    session
        .tabs()
        .iter()
        .map(|t| t.id.as_str().to_string())
        .collect()
}

fn active(session: &TabSession<MemoryTabStore>) -> Option<String> {
    session.active_tab().map(|t| t.id.as_str().to_string())
}

fn assert_well_formed(session: &TabSession<MemoryTabStore>) {
    let tabs = session.tabs();
    let unique: HashSet<_> = tabs.iter().map(|t| &t.id).collect();
    assert_eq!(unique.len(), tabs.len(), "duplicate tab ids: {:?}", ids(session));
    assert_eq!(
        tabs.iter().filter(|t| t.id.is_dashboard()).count(),
        1,
        "dashboard must be present exactly once"
    );
    let active = session.active_tab().expect("an active tab");
    assert!(tabs.iter().any(|t| t.id == active.id));
}

// ---------------------------------------------------------------------------
// Tab lifecycle
// ---------------------------------------------------------------------------

#[test]
fn close_then_reopen_restores_the_closed_tab_at_the_end() {
    let mut f = fixture();
    for id in ["a", "b", "c"] {
        f.session.open_or_focus(tab(id));
    }
    assert_eq!(active(&f.session).as_deref(), Some("c"));

    assert_eq!(f.session.close_tab(&"c".into()), ActionOutcome::Done);
    assert_eq!(ids(&f.session), vec!["dashboard", "a", "b"]);
    assert_eq!(active(&f.session).as_deref(), Some("b"));
    assert_eq!(f.nav.current().as_deref(), Some("/records/b"));

    assert_eq!(f.session.reopen_last_closed(), Some("c".into()));
    assert_eq!(ids(&f.session), vec!["dashboard", "a", "b", "c"]);
    assert_eq!(active(&f.session).as_deref(), Some("c"));
    assert!(f.session.closed_tabs().is_empty());
    assert_eq!(f.session.reopen_last_closed(), None);
}

#[test]
fn closing_the_active_tab_focuses_the_most_recently_used() {
    let mut f = fixture();
    for id in ["a", "b", "c"] {
        f.session.open_or_focus(tab(id));
    }
    f.session.focus_tab(&"a".into());
    f.session.focus_tab(&"c".into());

    f.session.close_tab(&"c".into());
    assert_eq!(active(&f.session).as_deref(), Some("a"));
}

#[test]
fn closing_a_background_tab_keeps_focus() {
    let mut f = fixture();
    f.session.open_or_focus(tab("a"));
    f.session.open_or_focus(tab("b"));
    let before = f.nav.history().len();

    f.session.close_tab(&"a".into());
    assert_eq!(active(&f.session).as_deref(), Some("b"));
    assert_eq!(f.nav.history().len(), before);
}

#[test]
fn protected_tabs_ignore_close() {
    let mut f = fixture();
    f.session.open_or_focus(tab("a"));
    f.session.pin_tab(&"a".into());

    assert_eq!(f.session.close_tab(&TabId::dashboard()), ActionOutcome::Ignored);
    assert_eq!(f.session.close_tab(&"a".into()), ActionOutcome::Ignored);
    assert_eq!(f.session.close_tab(&"ghost".into()), ActionOutcome::Ignored);
    assert_eq!(ids(&f.session), vec!["dashboard", "a"]);
    assert!(f.session.closed_tabs().is_empty());
}

#[test]
fn reopening_a_route_focuses_the_existing_tab() {
    let mut f = fixture();
    f.session.open_or_focus(tab("a"));
    f.session.open_or_focus(tab("b"));

    let again = WorkspaceTab::new("/records/a", "Another title", "records");
    assert_eq!(f.session.open_or_focus(again), "a".into());
    assert_eq!(f.session.tabs().len(), 3);
    assert_eq!(active(&f.session).as_deref(), Some("a"));
}

#[test]
fn reorder_keeps_tabs_missing_from_the_new_order() {
    let mut f = fixture();
    for id in ["a", "b", "c"] {
        f.session.open_or_focus(tab(id));
    }
    assert!(f.session.reorder(&["c".into(), "dashboard".into()]));
    assert_eq!(ids(&f.session), vec!["c", "dashboard", "a", "b"]);
    assert_eq!(active(&f.session).as_deref(), Some("c"));
}

#[test]
fn mixed_operation_sequences_stay_well_formed() {
    let mut f = fixture();
    // Small LCG so the sequence is varied but reproducible
    let mut state: u64 = 0x5eed;
    let mut next = move |bound: u64| {
        state = state
            .wrapping_mul(6364136223846793005)
            .wrapping_add(1442695040888963407);
        (state >> 33) % bound
    };

    for _ in 0..400 {
        let target: TabId = format!("t{}", next(6)).into();
        match next(9) {
            0 | 1 => {
                f.session.open_or_focus(tab(target.as_str()));
            }
            2 => {
                f.session.close_tab(&target);
            }
            3 => {
                f.session.reopen_last_closed();
            }
            4 => {
                f.session.toggle_pin(&target);
            }
            5 => {
                let mut order: Vec<TabId> =
                    f.session.tabs().iter().map(|t| t.id.clone()).rev().collect();
                order.truncate(next(4) as usize);
                f.session.reorder(&order);
            }
            6 => {
                f.session.next_tab();
            }
            7 => {
                f.session.switch_to_ordinal(next(10) as usize);
            }
            _ => {
                f.session.focus_tab(&target);
            }
        }
        assert_well_formed(&f.session);
        assert!(f.session.closed_tabs().len() <= f.session.closed_tabs().capacity());
    }
}

// ---------------------------------------------------------------------------
// Shortcuts
// ---------------------------------------------------------------------------

#[test]
fn shortcuts_drive_tab_actions() {
    let mut f = fixture();
    for id in ["a", "b", "c"] {
        f.session.open_or_focus(tab(id));
    }

    let (action, outcome) = f.session.handle_key(&key("Ctrl+2")).unwrap();
    assert_eq!(action, TabAction::SwitchToTab(2));
    assert_eq!(outcome, ActionOutcome::Done);
    assert_eq!(active(&f.session).as_deref(), Some("a"));

    f.session.handle_key(&key("Ctrl+Shift+Tab"));
    assert_eq!(active(&f.session).as_deref(), Some("dashboard"));
    f.session.handle_key(&key("Ctrl+Shift+Tab"));
    assert_eq!(active(&f.session).as_deref(), Some("c"));
    f.session.handle_key(&key("Ctrl+Tab"));
    assert_eq!(active(&f.session).as_deref(), Some("dashboard"));

    f.session.handle_key(&key("Ctrl+4"));
    let (action, _) = f.session.handle_key(&key("Ctrl+W")).unwrap();
    assert_eq!(action, TabAction::CloseActiveTab);
    assert_eq!(ids(&f.session), vec!["dashboard", "a", "b"]);

    f.session.handle_key(&key("Ctrl+Shift+T"));
    assert_eq!(ids(&f.session), vec!["dashboard", "a", "b", "c"]);
}

#[test]
fn out_of_range_ordinal_and_unbound_keys_do_nothing() {
    let mut f = fixture();
    f.session.open_or_focus(tab("a"));

    let (_, outcome) = f.session.handle_key(&key("Ctrl+9")).unwrap();
    assert_eq!(outcome, ActionOutcome::Ignored);
    assert_eq!(active(&f.session).as_deref(), Some("a"));
    assert!(f.session.handle_key(&key("Ctrl+K")).is_none());
}

#[test]
fn close_shortcut_on_the_dashboard_is_ignored() {
    let mut f = fixture();
    let (_, outcome) = f.session.handle_key(&key("Ctrl+W")).unwrap();
    assert_eq!(outcome, ActionOutcome::Ignored);
    assert_eq!(f.session.tabs().len(), 1);
}

// ---------------------------------------------------------------------------
// Unsaved changes
// ---------------------------------------------------------------------------

#[tokio::test]
async fn closing_a_dirty_tab_waits_for_confirmation() {
    let mut f = fixture();
    f.session.open_or_focus(tab("a"));
    f.session.mark_dirty(&"a".into(), true);

    let ActionOutcome::NeedsConfirmation(affected) = f.session.handle_key(&key("Ctrl+W")).unwrap().1
    else {
        panic!("expected a confirmation request");
    };
    assert_eq!(affected.len(), 1);
    assert_eq!(affected[0].title, "A");
    assert_eq!(f.session.tabs().len(), 2);

    assert!(f.session.cancel_pending());
    assert_eq!(f.session.tabs().len(), 2);

    f.session.close_tab(&"a".into());
    assert_eq!(f.session.confirm_pending().await, ActionOutcome::Done);
    assert_eq!(ids(&f.session), vec!["dashboard"]);

    // The discarded changes do not come back with the tab
    f.session.reopen_last_closed();
    assert!(!f.session.tabs()[1].has_unsaved_changes);
}

#[tokio::test]
async fn confirmed_close_of_a_tab_pinned_meanwhile_keeps_its_changes() {
    let mut f = fixture();
    f.session.open_or_focus(tab("a"));
    f.session.mark_dirty(&"a".into(), true);
    assert!(matches!(
        f.session.close_tab(&"a".into()),
        ActionOutcome::NeedsConfirmation(_)
    ));

    f.session.pin_tab(&"a".into());
    assert_eq!(f.session.confirm_pending().await, ActionOutcome::Ignored);

    let a = f.session.registry().get_tab(&"a".into()).expect("still open");
    assert!(a.has_unsaved_changes);
    assert!(f.session.closed_tabs().is_empty());
    assert!(!f.session.guard().is_pending());
}

#[tokio::test]
async fn clean_close_replaces_a_pending_confirmation() {
    let mut f = fixture();
    f.session.open_or_focus(tab("a"));
    f.session.mark_dirty(&"a".into(), true);
    f.session.close_tab(&"a".into());

    f.session.mark_dirty(&"a".into(), false);
    assert_eq!(f.session.close_tab(&"a".into()), ActionOutcome::Done);
    // The second request replaced the pending one and went through
    assert_eq!(f.session.confirm_pending().await, ActionOutcome::Ignored);
    assert_eq!(f.session.closed_tabs().len(), 1);
}

#[tokio::test]
async fn confirm_without_request_is_ignored() {
    let mut f = fixture();
    assert_eq!(f.session.confirm_pending().await, ActionOutcome::Ignored);
    assert!(!f.session.cancel_pending());
}

// ---------------------------------------------------------------------------
// Logout
// ---------------------------------------------------------------------------

#[tokio::test]
async fn logout_lists_only_unpinned_dirty_tabs_and_closes_everything() {
    let mut f = fixture();
    f.session.sign_in().await;
    f.session.open_or_focus(tab("a"));
    f.session.open_or_focus(tab("b"));
    f.session.open_or_focus(tab("c"));
    f.session.pin_tab(&"b".into());
    f.session.mark_dirty(&"a".into(), true);
    f.session.mark_dirty(&"b".into(), true);
    f.session.close_tab(&"c".into());
    f.scratch.put("a".into(), "draft");

    let ActionOutcome::NeedsConfirmation(affected) = f.session.request_logout().await else {
        panic!("expected a confirmation request");
    };
    let listed: Vec<_> = affected.iter().map(|t| t.id.as_str()).collect();
    assert_eq!(listed, vec!["a"]);
    assert_eq!(f.auth.sign_out_count(), 0);

    assert_eq!(f.session.confirm_pending().await, ActionOutcome::Done);

    assert_eq!(ids(&f.session), vec!["dashboard"]);
    assert!(f.session.closed_tabs().is_empty());
    assert!(f.scratch.is_empty());
    assert_eq!(f.auth.sign_out_count(), 1);
    assert_eq!(f.nav.current().as_deref(), Some("/login"));
    assert_eq!(f.session.sync().phase(), SyncPhase::Idle);

    // The pre-logout state was flushed, pinned tab included
    let stored = f.store.stored(&UserId::new("alice")).expect("flushed");
    let stored_ids: Vec<_> = stored.tabs.iter().map(|t| t.id.as_str()).collect();
    assert_eq!(stored_ids, vec!["dashboard", "a", "b"]);
}

#[tokio::test]
async fn logout_with_only_a_pinned_dirty_tab_skips_confirmation() {
    let mut f = fixture();
    f.session.open_or_focus(tab("a").pinned());
    f.session.mark_dirty(&"a".into(), true);

    assert_eq!(f.session.request_logout().await, ActionOutcome::Done);
    assert_eq!(ids(&f.session), vec!["dashboard"]);
    assert_eq!(f.auth.sign_out_count(), 1);
}

#[tokio::test]
async fn signing_back_in_restores_the_flushed_tabs() {
    let mut f = fixture();
    f.session.sign_in().await;
    f.session.open_or_focus(tab("a"));
    f.session.open_or_focus(tab("b"));
    f.session.focus_tab(&"a".into());
    f.session.logout().await;
    assert_eq!(f.store.save_count(), 1);

    f.auth.sign_in(UserId::new("alice"));
    assert_eq!(f.session.sign_in().await, Some(UserId::new("alice")));
    assert_eq!(ids(&f.session), vec!["dashboard", "a", "b"]);
    assert_eq!(active(&f.session).as_deref(), Some("a"));
    assert_eq!(f.nav.current().as_deref(), Some("/records/a"));
}

#[tokio::test]
async fn sign_in_requires_an_authenticated_user() {
    let mut f = fixture();
    f.session.logout().await;
    assert_eq!(f.session.sign_in().await, None);
    assert_eq!(f.session.sync().phase(), SyncPhase::Idle);
}
