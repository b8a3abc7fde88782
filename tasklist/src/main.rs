//! `tasklist`: interactive demo of the task list client.
//!
//! Reads commands from stdin, one per line. Tasks are kept in memory unless
//! a data file is configured. Configuration via CLI flags, environment
//! variables, or config file (`~/.config/tasklist/config.toml`).
//!
//! ```bash
//! # In-memory tasks, demo account demo@example.com / demo
//! cargo run --bin tasklist
//!
//! # Persist tasks to a file
//! cargo run --bin tasklist -- --data-file ~/tasks.bin
//! ```

mod repl;

use std::io;
use std::path::Path;
use std::sync::Arc;

use clap::Parser;
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};
use tracing_appender::non_blocking::WorkerGuard;

use tasklist::app::App;
use tasklist::auth::InMemoryAuthProvider;
use tasklist::config::{CliArgs, ClientConfig};
use tasklist::edit::CommitOutcome;
use tasklist::persist::{FileBackend, InMemoryBackend};

use repl::Command;

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = CliArgs::parse();

    // Load and resolve configuration (CLI args > env > config file > defaults).
    let config = match ClientConfig::load(&cli) {
        Ok(c) => c,
        Err(e) => {
            eprintln!("Warning: failed to load config file: {e}");
            ClientConfig::default()
        }
    };

    // Logs go to a file; stdout belongs to the prompt.
    let _log_guard = init_logging(&cli.log_level, cli.log_file.as_deref());

    tracing::info!("tasklist starting");

    let account = &config.demo_account;
    let provider = Arc::new(
        InMemoryAuthProvider::with_buffer(config.notification_buffer).with_account(
            &account.email,
            &account.password,
            account.name.as_deref(),
        ),
    );
    let app_config = config.to_app_config();
    let app = match &config.data_file {
        Some(path) => {
            tracing::info!(path = %path.display(), "using file storage");
            App::start(provider, Arc::new(FileBackend::new(path)), &app_config).await?
        }
        None => App::start(provider, Arc::new(InMemoryBackend::new()), &app_config).await?,
    };

    let result = run_repl(&app, &account.email).await;

    app.shutdown().await;
    tracing::info!("tasklist exiting");
    result?;
    Ok(())
}

/// Initialize file-based logging.
///
/// Logs are written to a file (never stdout, which carries the prompt).
/// Returns a [`WorkerGuard`] that must be held until shutdown to ensure all
/// buffered log entries are flushed.
fn init_logging(level: &str, file_path: Option<&Path>) -> Option<WorkerGuard> {
    let default_path = std::env::temp_dir().join("tasklist.log");
    let log_path = file_path.unwrap_or(&default_path);

    let log_dir = log_path.parent()?;
    let file_name = log_path.file_name()?.to_str()?;

    let file_appender = tracing_appender::rolling::never(log_dir, file_name);
    let (non_blocking, guard) = tracing_appender::non_blocking(file_appender);

    let env_filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(level));

    tracing_subscriber::fmt()
        .with_writer(non_blocking)
        .with_env_filter(env_filter)
        .with_ansi(false)
        .init();

    Some(guard)
}

/// Reads and executes commands until `quit` or end of input.
async fn run_repl(app: &App<InMemoryAuthProvider>, demo_email: &str) -> io::Result<()> {
    let mut stdout = tokio::io::stdout();
    let mut lines = BufReader::new(tokio::io::stdin()).lines();

    let session = app.wait_until_known().await;
    let greeting =
        format!("tasklist ({session}). Demo account: {demo_email}. Type `help` for commands.\n");
    stdout.write_all(greeting.as_bytes()).await?;

    loop {
        stdout.write_all(b"> ").await?;
        stdout.flush().await?;
        let Some(line) = lines.next_line().await? else {
            break;
        };

        let output = match Command::parse(&line) {
            Ok(None) => String::new(),
            Ok(Some(Command::Quit)) => break,
            Ok(Some(command)) => execute(app, command).await,
            Err(msg) => format!("{msg}\n"),
        };
        stdout.write_all(output.as_bytes()).await?;

        for event in app.drain_events() {
            stdout
                .write_all(format!("{}\n", repl::render_event(&event)).as_bytes())
                .await?;
        }
    }
    Ok(())
}

/// Runs one command and returns the text to print.
async fn execute(app: &App<InMemoryAuthProvider>, command: Command) -> String {
    let task_id = |n: usize| {
        app.store()
            .tasks()
            .get(n - 1)
            .map(|t| t.id.clone())
            .ok_or_else(|| format!("no task {n}\n"))
    };

    let result: Result<String, String> = match command {
        Command::SignIn { email, password } => app
            .sign_in(&email, &password)
            .await
            .map(|user| format!("signed in as {}\n", user.name))
            .map_err(|e| format!("error: {e}\n")),
        Command::SignOut => app
            .sign_out()
            .await
            .map(|()| "signed out\n".to_string())
            .map_err(|e| format!("error: {e}\n")),
        Command::Add(title) => app
            .add_task(&title)
            .map(|t| format!("added: {}\n", t.title))
            .map_err(|e| format!("error: {e}\n")),
        Command::Toggle(n) => task_id(n).and_then(|id| {
            app.toggle_task_status(&id)
                .map(|t| format!("{}: {}\n", t.title, t.status))
                .map_err(|e| format!("error: {e}\n"))
        }),
        Command::Edit(n) => task_id(n).and_then(|id| {
            app.open_edit(&id)
                .map(|()| "editing; use set-title / set-desc, then save or cancel\n".to_string())
                .map_err(|e| format!("error: {e}\n"))
        }),
        Command::SetTitle(text) => Ok(if app.set_edit_title(&text) {
            String::new()
        } else {
            "no edit open\n".to_string()
        }),
        Command::SetDescription(text) => Ok(if app.set_edit_description(&text) {
            String::new()
        } else {
            "no edit open\n".to_string()
        }),
        Command::Save => match app.commit_edit_buffer() {
            Ok(CommitOutcome::Committed(task)) => Ok(format!("saved: {}\n", task.title)),
            Ok(CommitOutcome::Ignored) => Ok("no edit open\n".to_string()),
            Err(e) => Err(format!("error: {e}\n")),
        },
        Command::Cancel => {
            app.cancel_edit();
            Ok(String::new())
        }
        Command::Remove(n) => task_id(n).and_then(|id| {
            app.remove_task(&id)
                .map(|()| "removed\n".to_string())
                .map_err(|e| format!("error: {e}\n"))
        }),
        Command::List => Ok(repl::render_list(&app.snapshot())),
        Command::Json => serde_json::to_string_pretty(&app.snapshot())
            .map(|json| format!("{json}\n"))
            .map_err(|e| format!("error: {e}\n")),
        Command::Retry => Ok(format!("retrying {} write(s)\n", app.retry_failed())),
        Command::Help => Ok(repl::HELP.to_string()),
        Command::Quit => Ok(String::new()),
    };

    result.unwrap_or_else(|msg| msg)
}
