use anyhow::{Context, Result};
use std::sync::Arc;
use worktab::cli::{self, RuntimeOptions};
use worktab::session::{FileTabStore, MemoryTabStore, TabStore};
use worktab::shell::{Command, Flow, Shell, ShellHandles};
use worktab::tab_session::TabSession;
use worktab_config::Config;

fn main() -> Result<()> {
    // Process CLI arguments first (before logging init for cleaner output)
    let options = match cli::process_cli() {
        cli::CliResult::Exit(code) => {
            if code == 0 {
                return Ok(());
            }
            std::process::exit(code);
        }
        cli::CliResult::Continue(options) => options,
    };

    // Routes all log::info!() etc. to the debug log file.
    // CLI --log-level takes precedence, then RUST_LOG, then config (applied below).
    worktab::debug::init_log_bridge(options.log_level);
    log::info!("Starting worktab {}", worktab::VERSION);

    let mut config = match &options.config_path {
        Some(path) => Config::load_from(path),
        None => Config::load(),
    }
    .context("Failed to load configuration")?;
    worktab::debug::apply_config_level(config.log_level);
    if let Some(dir) = options.data_dir.clone() {
        config.storage_dir = Some(dir);
    }

    // Single-threaded: the session is owned by the shell loop
    let runtime = tokio::runtime::Builder::new_current_thread()
        .enable_all()
        .build()
        .context("Failed to start async runtime")?;

    let result = if options.ephemeral {
        log::info!("Using in-memory tab store");
        runtime.block_on(run_shell(config, options, Arc::new(MemoryTabStore::new())))
    } else {
        let store = FileTabStore::new(config.tab_store_dir());
        log::info!("Using tab store at {:?}", store.dir());
        runtime.block_on(run_shell(config, options, Arc::new(store)))
    };

    log::info!("Shell exited");
    if let Err(ref e) = result {
        eprintln!("worktab: error: {e:#}");
    }
    result
}

async fn run_shell<S: TabStore>(
    config: Config,
    options: RuntimeOptions,
    store: Arc<S>,
) -> Result<()> {
    let handles = ShellHandles::default();
    let session = TabSession::new(&config, store, handles.collaborators());
    let mut shell = Shell::new(session, handles);

    if let Some(user) = options.user
        && let Flow::Continue(output) = shell.execute(Command::Login(user)).await
    {
        println!("{output}");
    }

    shell.run().await
}
