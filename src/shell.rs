//! Line-oriented shell over a [`TabSession`].
//!
//! Each stdin line is one command. Between commands the loop waits for the
//! pending write deadline and for background saves to finish, so debounced
//! persistence behaves exactly as it would under a UI event loop.

use crate::services::{HistoryNavigator, LocalAuth, ScratchStorage};
use crate::session::{PendingWrite, StoreError, TabStore, UserId, WriteOutcome};
use crate::tab::{TabId, WorkspaceTab};
use crate::tab_session::{ActionOutcome, Collaborators, SaveResult, TabSession};
use anyhow::{Context, Result};
use std::fmt::Write as _;
use tokio::io::{AsyncBufReadExt, BufReader};
use tokio::task::{JoinError, JoinSet};
use tokio::time::{Instant, sleep_until};
use worktab_keybindings::{KeyInput, parse_key_combo};

const HELP: &str = "\
commands:
  open <route> [title] [module]   open a tab or focus the one showing <route>
  close [tab]                     close a tab (default: active)
  focus <tab>                     focus a tab
  pin <tab> | unpin <tab>         toggle close protection
  dirty <tab> | clean <tab>       set or clear unsaved changes
  reorder <tab>...                reorder tabs (missing tabs are appended)
  key <combo>                     press a shortcut, e.g. key CmdOrCtrl+Shift+T
  reopen                          reopen the last closed tab
  next | prev                     cycle tabs
  confirm | cancel                resolve a pending confirmation
  logout                          log out (asks first if work would be lost)
  login <user>                    sign in and restore stored tabs
  scratch <tab> <text>            store scratch data for a tab
  list                            show tabs and sync state
  flush                           write pending changes now
  help | quit
tabs are referenced by id or by position as #1, #2, ...";

/// A tab reference as typed by the user
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TabRef {
    Id(TabId),
    /// 1-based position
    Position(usize),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Command {
    Open {
        route: String,
        title: Option<String>,
        module: Option<String>,
    },
    Close(Option<TabRef>),
    Focus(TabRef),
    Pin(TabRef),
    Unpin(TabRef),
    Dirty(TabRef, bool),
    Reorder(Vec<TabRef>),
    Key(String),
    Reopen,
    Next,
    Prev,
    Confirm,
    Cancel,
    Logout,
    Login(String),
    Scratch(TabRef, String),
    List,
    Flush,
    Help,
    Quit,
}

fn parse_tab_ref(arg: &str) -> Result<TabRef, String> {
    match arg.strip_prefix('#') {
        Some(n) => n
            .parse::<usize>()
            .ok()
            .filter(|n| *n > 0)
            .map(TabRef::Position)
            .ok_or_else(|| format!("bad tab position '{arg}'")),
        None => Ok(TabRef::Id(TabId::new(arg))),
    }
}

/// Parse one input line. Blank lines and `#` comments yield `None`.
pub fn parse_command(line: &str) -> Result<Option<Command>, String> {
    let line = line.trim();
    if line.is_empty() || line.starts_with("# ") || line == "#" {
        return Ok(None);
    }

    let mut words = line.split_whitespace();
    let Some(name) = words.next() else {
        return Ok(None);
    };
    let args: Vec<&str> = words.collect();

    let one_tab = |args: &[&str]| -> Result<TabRef, String> {
        match args {
            [arg] => parse_tab_ref(arg),
            _ => Err(format!("usage: {name} <tab>")),
        }
    };

    let command = match name {
        "open" => match args.as_slice() {
            [route, rest @ ..] => Command::Open {
                route: route.to_string(),
                title: rest.first().map(|s| s.to_string()),
                module: rest.get(1).map(|s| s.to_string()),
            },
            [] => return Err("usage: open <route> [title] [module]".to_string()),
        },
        "close" => match args.as_slice() {
            [] => Command::Close(None),
            [arg] => Command::Close(Some(parse_tab_ref(arg)?)),
            _ => return Err("usage: close [tab]".to_string()),
        },
        "focus" => Command::Focus(one_tab(&args)?),
        "pin" => Command::Pin(one_tab(&args)?),
        "unpin" => Command::Unpin(one_tab(&args)?),
        "dirty" => Command::Dirty(one_tab(&args)?, true),
        "clean" => Command::Dirty(one_tab(&args)?, false),
        "reorder" => Command::Reorder(
            args.iter()
                .map(|a| parse_tab_ref(a))
                .collect::<Result<_, _>>()?,
        ),
        "key" => match args.as_slice() {
            [combo] => Command::Key(combo.to_string()),
            _ => return Err("usage: key <combo>".to_string()),
        },
        "login" => match args.as_slice() {
            [user] => Command::Login(user.to_string()),
            _ => return Err("usage: login <user>".to_string()),
        },
        "scratch" => match args.as_slice() {
            [tab, text @ ..] if !text.is_empty() => {
                Command::Scratch(parse_tab_ref(tab)?, text.join(" "))
            }
            _ => return Err("usage: scratch <tab> <text>".to_string()),
        },
        "reopen" => Command::Reopen,
        "next" => Command::Next,
        "prev" => Command::Prev,
        "confirm" => Command::Confirm,
        "cancel" => Command::Cancel,
        "logout" => Command::Logout,
        "list" | "ls" => Command::List,
        "flush" => Command::Flush,
        "help" | "?" => Command::Help,
        "quit" | "exit" => Command::Quit,
        other => return Err(format!("unknown command '{other}' (try 'help')")),
    };
    Ok(Some(command))
}

/// What the loop should do after a command
#[derive(Debug, PartialEq, Eq)]
pub enum Flow {
    Continue(String),
    Quit,
}

/// Handles on the collaborators the shell manipulates directly
#[derive(Debug, Clone, Default)]
pub struct ShellHandles {
    pub navigator: HistoryNavigator,
    pub auth: LocalAuth,
    pub scratch: ScratchStorage,
}

impl ShellHandles {
    /// Boxed clones for a [`TabSession`]
    pub fn collaborators(&self) -> Collaborators {
        Collaborators {
            navigator: Box::new(self.navigator.clone()),
            auth: Box::new(self.auth.clone()),
            scratch: Box::new(self.scratch.clone()),
        }
    }
}

pub struct Shell<S: TabStore> {
    session: TabSession<S>,
    handles: ShellHandles,
    saves: JoinSet<SaveResult>,
    /// Copy of the write being saved, for when the save task dies
    in_flight: Option<PendingWrite>,
}

impl<S: TabStore> Shell<S> {
    pub fn new(session: TabSession<S>, handles: ShellHandles) -> Self {
        Self {
            session,
            handles,
            saves: JoinSet::new(),
            in_flight: None,
        }
    }

    pub fn session(&self) -> &TabSession<S> {
        &self.session
    }

    /// Read commands from stdin until `quit` or EOF.
    pub async fn run(&mut self) -> Result<()> {
        let mut lines = BufReader::new(tokio::io::stdin()).lines();
        println!("worktab {} - type 'help' for commands", crate::VERSION);

        loop {
            let deadline = self.session.next_flush_at();

            tokio::select! {
                line = lines.next_line() => {
                    let Some(line) = line.context("Failed to read from stdin")? else {
                        break;
                    };
                    match parse_command(&line) {
                        Ok(Some(command)) => match self.execute(command).await {
                            Flow::Continue(output) => {
                                if !output.is_empty() {
                                    println!("{output}");
                                }
                            }
                            Flow::Quit => break,
                        },
                        Ok(None) => {}
                        Err(message) => println!("error: {message}"),
                    }
                }
                _ = wait_until(deadline) => {
                    self.start_due_save();
                }
                Some(joined) = self.saves.join_next(), if !self.saves.is_empty() => {
                    self.finish_save(joined);
                }
            }
        }

        self.shutdown().await;
        Ok(())
    }

    /// Wait for running saves, then write whatever is still pending.
    pub async fn shutdown(&mut self) {
        self.drain_saves().await;
        if let Some(outcome) = self.session.flush_now().await {
            log::info!("Final flush on exit: {:?}", outcome);
        }
    }

    fn start_due_save(&mut self) {
        if let Some(write) = self.session.take_due_write(Instant::now()) {
            log::debug!("Starting background save of {}", write.hash);
            self.in_flight = Some(write.clone());
            self.session.spawn_save(write, &mut self.saves);
        }
    }

    fn finish_save(&mut self, joined: Result<SaveResult, JoinError>) {
        let in_flight = self.in_flight.take();
        let (write, result) = match joined {
            Ok(done) => done,
            Err(e) => {
                log::error!("Save task failed: {}", e);
                let Some(write) = in_flight else {
                    return;
                };
                (write, Err(StoreError::Unavailable(e.to_string())))
            }
        };
        let outcome = self.session.complete_write(write, result, Instant::now());
        log::debug!("Background save finished: {:?}", outcome);
    }

    async fn drain_saves(&mut self) {
        while let Some(joined) = self.saves.join_next().await {
            self.finish_save(joined);
        }
    }

    fn resolve(&self, tab: &TabRef) -> Result<TabId, String> {
        match tab {
            TabRef::Id(id) => Ok(id.clone()),
            TabRef::Position(n) => self
                .session
                .registry()
                .tab_at(*n)
                .map(|t| t.id.clone())
                .ok_or_else(|| format!("no tab at #{n}")),
        }
    }

    /// Run one command and describe the result.
    pub async fn execute(&mut self, command: Command) -> Flow {
        match self.execute_inner(command).await {
            Ok(Some(output)) => Flow::Continue(output),
            Ok(None) => Flow::Quit,
            Err(message) => Flow::Continue(format!("error: {message}")),
        }
    }

    async fn execute_inner(&mut self, command: Command) -> Result<Option<String>, String> {
        let output = match command {
            Command::Open {
                route,
                title,
                module,
            } => {
                let title = title.unwrap_or_else(|| route.clone());
                let module = module.unwrap_or_else(|| "general".to_string());
                let id = self
                    .session
                    .open_or_focus(WorkspaceTab::new(route, title, module));
                format!("active: {id}")
            }
            Command::Close(tab) => {
                let id = match tab {
                    Some(tab) => self.resolve(&tab)?,
                    None => self
                        .session
                        .registry()
                        .active_tab_id()
                        .cloned()
                        .ok_or("no active tab")?,
                };
                describe(self.session.close_tab(&id))
            }
            Command::Focus(tab) => {
                let id = self.resolve(&tab)?;
                flag(self.session.focus_tab(&id), "focused", "no such tab")
            }
            Command::Pin(tab) => {
                let id = self.resolve(&tab)?;
                flag(self.session.pin_tab(&id), "pinned", "unchanged")
            }
            Command::Unpin(tab) => {
                let id = self.resolve(&tab)?;
                flag(self.session.unpin_tab(&id), "unpinned", "unchanged")
            }
            Command::Dirty(tab, dirty) => {
                let id = self.resolve(&tab)?;
                flag(self.session.mark_dirty(&id, dirty), "ok", "no such tab")
            }
            Command::Reorder(tabs) => {
                let ids = tabs
                    .iter()
                    .map(|t| self.resolve(t))
                    .collect::<Result<Vec<_>, _>>()?;
                flag(self.session.reorder(&ids), "reordered", "order unchanged")
            }
            Command::Key(combo) => {
                let combo = parse_key_combo(&combo).map_err(|e| e.to_string())?;
                let input = KeyInput::from_combo(&combo, self.session.platform());
                match self.session.handle_key(&input) {
                    Some((action, outcome)) => format!("{}: {}", action.name(), describe(outcome)),
                    None => format!("{combo} is not bound"),
                }
            }
            Command::Reopen => match self.session.reopen_last_closed() {
                Some(id) => format!("reopened {id}"),
                None => "nothing to reopen".to_string(),
            },
            Command::Next => active_or(self.session.next_tab()),
            Command::Prev => active_or(self.session.prev_tab()),
            Command::Confirm => {
                // A logout flush must land after any save still running
                self.drain_saves().await;
                describe(self.session.confirm_pending().await)
            }
            Command::Cancel => flag(self.session.cancel_pending(), "cancelled", "nothing pending"),
            Command::Logout => {
                self.drain_saves().await;
                describe(self.session.request_logout().await)
            }
            Command::Login(user) => {
                if let Some(current) = self.session.user() {
                    return Err(format!("already signed in as {current}"));
                }
                self.handles.auth.sign_in(UserId::new(user));
                match self.session.sign_in().await {
                    Some(user) => format!(
                        "signed in as {user} ({} tabs)",
                        self.session.tabs().len()
                    ),
                    None => "sign-in failed".to_string(),
                }
            }
            Command::Scratch(tab, text) => {
                let id = self.resolve(&tab)?;
                self.handles.scratch.put(id, text);
                format!("{} scratch entries", self.handles.scratch.len())
            }
            Command::List => self.render_list(),
            Command::Flush => {
                self.drain_saves().await;
                match self.session.flush_now().await {
                    Some(WriteOutcome::Saved) => "saved".to_string(),
                    Some(outcome) => format!("{outcome:?}"),
                    None => "nothing to save".to_string(),
                }
            }
            Command::Help => HELP.to_string(),
            Command::Quit => return Ok(None),
        };
        Ok(Some(output))
    }

    fn render_list(&self) -> String {
        let registry = self.session.registry();
        let active = registry.active_tab_id();
        let mut out = String::new();

        for (idx, tab) in registry.tabs().iter().enumerate() {
            let marker = if Some(&tab.id) == active { '*' } else { ' ' };
            let mut flags = String::new();
            if tab.is_pinned {
                flags.push_str(" [pinned]");
            }
            if tab.has_unsaved_changes {
                flags.push_str(" [unsaved]");
            }
            let _ = writeln!(
                out,
                "{marker} #{} {} {:?} {}{}",
                idx + 1,
                tab.id,
                tab.title,
                tab.route,
                flags
            );
        }

        let sync = self.session.sync();
        let user = sync
            .user()
            .map(ToString::to_string)
            .unwrap_or_else(|| "-".to_string());
        let route = self
            .handles
            .navigator
            .current()
            .unwrap_or_else(|| "-".to_string());
        let _ = write!(
            out,
            "route: {route}  user: {user}  phase: {:?}  pending: {}  closed: {}",
            sync.phase(),
            if sync.pending().is_some() { "yes" } else { "no" },
            self.session.closed_tabs().len()
        );
        if self.session.guard().is_pending() {
            let _ = write!(
                out,
                "\nawaiting confirmation for {:?}",
                self.session.guard().pending_action()
            );
        }
        out
    }
}

fn describe(outcome: ActionOutcome) -> String {
    match outcome {
        ActionOutcome::Done => "done".to_string(),
        ActionOutcome::Ignored => "ignored".to_string(),
        ActionOutcome::NeedsConfirmation(tabs) => {
            let titles: Vec<_> = tabs.iter().map(|t| t.title.as_str()).collect();
            format!(
                "unsaved changes in {}; 'confirm' to discard or 'cancel'",
                titles.join(", ")
            )
        }
    }
}

fn flag(ok: bool, yes: &str, no: &str) -> String {
    let text = if ok { yes } else { no };
    text.to_string()
}

fn active_or(id: Option<TabId>) -> String {
    match id {
        Some(id) => format!("active: {id}"),
        None => "only one tab open".to_string(),
    }
}

async fn wait_until(deadline: Option<Instant>) {
    match deadline {
        Some(deadline) => sleep_until(deadline).await,
        None => std::future::pending().await,
    }
}
