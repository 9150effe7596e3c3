// Forbid accidental stdout/stderr writes in the *library* portion of the TUI.
// Anything printed while the alternate screen is active corrupts the UI.
#![deny(clippy::print_stdout, clippy::print_stderr)]

use app::App;
use log_layer::TuiLogLayer;
use std::fs::OpenOptions;
use tracing_appender::non_blocking;
use tracing_subscriber::EnvFilter;
use tracing_subscriber::prelude::*;
use wangr_core::config::Config;
use wangr_core::config::ConfigOverrides;
use wangr_core::config::log_dir;

mod app;
mod app_event;
mod app_event_sender;
mod chatwidget;
mod cli;
mod conversation_history_widget;
mod diff_render;
mod history_cell;
mod log_layer;
mod slash_command;
mod status_indicator_widget;
mod text_formatting;
mod tui;
mod user_approval_widget;

pub use cli::Cli;

/// Longest log line forwarded to the status indicator.
const STATUS_LOG_LINE_LEN: usize = 120;

pub async fn run_main(cli: Cli) -> std::io::Result<()> {
    let config = {
        // Load configuration and support CLI overrides.
        let overrides = ConfigOverrides {
            chat_api_url: cli.chat_api_url.clone(),
            api_key: cli.api_key.clone(),
            cwd: cli.cwd.clone().map(|p| p.canonicalize().unwrap_or(p)),
        };
        #[allow(clippy::print_stderr)]
        match Config::load_with_overrides(overrides) {
            Ok(config) => config,
            Err(err) => {
                eprintln!("Error loading configuration: {err}");
                std::process::exit(1);
            }
        }
    };

    let log_dir = log_dir(&config);
    std::fs::create_dir_all(&log_dir)?;
    // Open (or create) the log file, appending to it.
    let mut log_file_opts = OpenOptions::new();
    log_file_opts.create(true).append(true);

    // Ensure the file is only readable and writable by the current user.
    #[cfg(unix)]
    {
        use std::os::unix::fs::OpenOptionsExt;
        log_file_opts.mode(0o600);
    }

    let log_file = log_file_opts.open(log_dir.join("wangr-tui.log"))?;

    // Wrap file in non‑blocking writer.
    let (non_blocking, _guard) = non_blocking(log_file);

    // use RUST_LOG env var, default to info for wangr crates.
    let env_filter = || {
        EnvFilter::try_from_default_env()
            .unwrap_or_else(|_| EnvFilter::new("wangr_core=info,wangr_tui=info"))
    };

    let file_layer = tracing_subscriber::fmt::layer()
        .with_writer(non_blocking)
        .with_target(false)
        .with_filter(env_filter());

    // Channel that carries formatted log lines to the UI.
    let (log_tx, log_rx) = tokio::sync::mpsc::unbounded_channel::<String>();
    let tui_layer = TuiLogLayer::new(log_tx, STATUS_LOG_LINE_LEN).with_filter(env_filter());

    let _ = tracing_subscriber::registry()
        .with(file_layer)
        .with(tui_layer)
        .try_init();

    try_run_ratatui_app(cli, config, log_rx).await;
    Ok(())
}

#[expect(
    clippy::print_stderr,
    reason = "Resort to stderr in exceptional situations."
)]
async fn try_run_ratatui_app(
    cli: Cli,
    config: Config,
    log_rx: tokio::sync::mpsc::UnboundedReceiver<String>,
) {
    if let Err(report) = run_ratatui_app(cli, config, log_rx).await {
        eprintln!("Error: {report:?}");
    }
}

async fn run_ratatui_app(
    cli: Cli,
    config: Config,
    mut log_rx: tokio::sync::mpsc::UnboundedReceiver<String>,
) -> color_eyre::Result<()> {
    color_eyre::install()?;

    tracing::info!(
        cwd = %config.cwd.display(),
        chat_api_url = %config.chat_api_url,
        "starting session"
    );
    let Cli { prompt, .. } = cli;
    let mut app = App::new(config, prompt)?;

    // Forward panic reports through the tracing stack so that they appear in
    // the status indicator instead of breaking the alternate screen. The
    // normal colour‑eyre hook writes to stderr which would corrupt the UI.
    std::panic::set_hook(Box::new(|info| {
        tracing::error!("panic: {info}");
    }));
    let mut terminal = tui::init()?;

    // Bridge log receiver into the AppEvent channel so latest log lines update the UI.
    {
        let app_event_tx = app.event_sender();
        tokio::spawn(async move {
            while let Some(line) = log_rx.recv().await {
                if app_event_tx.is_closed() {
                    break;
                }
                app_event_tx.send(crate::app_event::AppEvent::LatestLog(line));
            }
        });
    }

    let app_result = app.run(&mut terminal).await;

    restore();
    app_result
}

#[expect(
    clippy::print_stderr,
    reason = "TUI should no longer be displayed, so we can write to stderr."
)]
fn restore() {
    if let Err(err) = tui::restore() {
        eprintln!(
            "failed to restore terminal. Run `reset` or restart your terminal to recover: {err}"
        );
    }
}
