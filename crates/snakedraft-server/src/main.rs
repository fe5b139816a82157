// Snake draft server entry point.
//
// Startup sequence:
// 1. Initialize tracing (log to file)
// 2. Load config
// 3. Open database, recover or seed the draft
// 4. Spawn persistence, WebSocket server and app tasks
// 5. Wait for Ctrl+C, then shut down

use snakedraft_core::config;
use snakedraft_core::db::Database;
use snakedraft_server::app;
use snakedraft_server::ws_server;

use anyhow::Context;
use tokio::sync::mpsc;
use tracing::{error, info};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    init_tracing()?;
    info!("Snake draft server starting up");

    let config = config::load_config().context("failed to load configuration")?;
    info!(
        "Config loaded: draft='{}', {} admins, admin override {}",
        config.draft.name,
        config.draft.admins.len(),
        if config.draft.allow_admin_override { "on" } else { "off" }
    );

    let db_path = config
        .database
        .resolve_path()
        .context("failed to resolve database path")?;
    if let Some(parent) = db_path.parent().filter(|p| !p.as_os_str().is_empty()) {
        std::fs::create_dir_all(parent)
            .with_context(|| format!("failed to create {}", parent.display()))?;
    }
    let db_path = db_path.to_string_lossy().into_owned();
    let db = Database::open(&db_path).context("failed to open database")?;
    info!("Database opened at {}", db_path);

    let base_dir = std::env::current_dir()?;
    let (engine, resumed) = match app::recover_from_db(&db, &config, &base_dir) {
        Ok(r) => r,
        Err(e) => {
            error!("Crash recovery failed: {:#}", e);
            return Err(e.context("crash recovery failed"));
        }
    };
    if resumed {
        info!("Draft state restored from previous session");
    } else {
        info!("Starting fresh draft session");
    }

    let (ws_tx, ws_rx) = mpsc::channel(256);
    let (persist_tx, persist_rx) = mpsc::channel(256);

    let persister = app::Persister::new(db).context("failed to prepare persistence")?;
    let persist_handle = tokio::spawn(app::run_persistence(persister, persist_rx));

    let listener = ws_server::bind(config.server.port)
        .await
        .with_context(|| format!("failed to bind port {}", config.server.port))?;
    let ws_handle = tokio::spawn(async move {
        if let Err(e) = ws_server::run(listener, ws_tx).await {
            error!("WebSocket server error: {}", e);
        }
    });

    let app_state = app::AppState::new(engine, config.draft.lookahead, persist_tx);
    let mut app_handle = tokio::spawn(async move {
        if let Err(e) = app::run(ws_rx, app_state).await {
            error!("Application loop error: {}", e);
        }
    });

    println!(
        "snakedraft '{}' listening on ws://127.0.0.1:{} (Ctrl+C to stop)",
        config.draft.name, config.server.port
    );

    let app_finished = tokio::select! {
        _ = tokio::signal::ctrl_c() => {
            info!("Ctrl+C received, shutting down");
            false
        }
        _ = &mut app_handle => {
            info!("Application loop ended");
            true
        }
    };

    // Open connections keep the app loop alive, so the wait is bounded.
    ws_handle.abort();
    let _ = tokio::time::timeout(std::time::Duration::from_secs(5), async {
        if !app_finished {
            let _ = app_handle.await;
        }
        let _ = persist_handle.await;
    })
    .await;

    info!("Snake draft server shut down cleanly");
    Ok(())
}

/// Initialize tracing to log to `logs/snakedraft.log`.
fn init_tracing() -> anyhow::Result<()> {
    use tracing_subscriber::fmt;
    use tracing_subscriber::EnvFilter;

    let log_dir = std::env::current_dir()?.join("logs");
    std::fs::create_dir_all(&log_dir)?;

    let log_file = std::fs::File::create(log_dir.join("snakedraft.log"))?;

    let subscriber = fmt::Subscriber::builder()
        .with_env_filter(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new("snakedraft=info,warn")),
        )
        .with_writer(log_file)
        .with_ansi(false)
        .with_target(true)
        .with_thread_ids(true)
        .with_line_number(true)
        .finish();

    tracing::subscriber::set_global_default(subscriber)
        .context("failed to set tracing subscriber")?;

    Ok(())
}
