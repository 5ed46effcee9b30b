use std::time::Duration;

use clap::Parser;
use colored::*;
use tokio::io::{AsyncBufReadExt, BufReader};
use tokio_stream::wrappers::LinesStream;
use tokio_stream::StreamExt;
use tracing::warn;
use tracing_subscriber::EnvFilter;

use webinar_chat::cli::Args;
use webinar_chat::error::SessionError;
use webinar_chat::session::{ChatSession, SessionHandle};
use webinar_chat::{relay, render};

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let args = Args::parse();

    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .with_writer(std::io::stderr)
        .init();

    // Relay mode
    if args.relay {
        relay::serve(args.port).await?;
        return Ok(());
    }

    let config = args.resolve_config()?;
    let handle = ChatSession::builder().config(config).mount()?;
    if args.hide_participants {
        handle.set_participants_visible(false)?;
    }

    eprintln!(
        "{}",
        "Type a message and press Enter. /invest, /hide, /show act as buttons. Ctrl+C leaves.".dimmed()
    );
    run_terminal(&handle, args.duration.map(Duration::from_secs)).await?;

    let summary = handle.unmount().await?;
    println!(
        "\n{} {} messages, {} timers cancelled, {} submissions ignored",
        "Session closed:".bold(),
        summary.messages,
        summary.tasks_cancelled,
        summary.submissions_ignored
    );
    Ok(())
}

/// Print snapshot updates and forward stdin lines until Ctrl+C or the time
/// limit. `/invest`, `/hide` and `/show` map to the view's buttons.
async fn run_terminal(handle: &SessionHandle, limit: Option<Duration>) -> Result<(), SessionError> {
    let mut updates = handle.subscribe();
    let mut lines = LinesStream::new(BufReader::new(tokio::io::stdin()).lines());
    let mut stdin_open = true;

    let deadline = async move {
        match limit {
            Some(limit) => tokio::time::sleep(limit).await,
            None => std::future::pending::<()>().await,
        }
    };
    tokio::pin!(deadline);

    let mut last_id = 0u64;
    let mut last_toast = 0u64;
    let mut last_status = String::new();

    loop {
        tokio::select! {
            _ = tokio::signal::ctrl_c() => break,
            _ = &mut deadline => break,
            line = lines.next(), if stdin_open => match line {
                Some(Ok(text)) => match text.trim() {
                    "/invest" => handle.invest()?,
                    "/hide" => handle.set_participants_visible(false)?,
                    "/show" => handle.set_participants_visible(true)?,
                    _ => handle.submit(text.as_str())?,
                },
                Some(Err(e)) => {
                    warn!(error = %e, "stdin read failed, input disabled");
                    stdin_open = false;
                }
                None => stdin_open = false,
            },
            changed = updates.changed() => {
                if changed.is_err() {
                    break;
                }
                let snapshot = updates.borrow_and_update().clone();
                for line in render::new_lines(&snapshot, &mut last_id) {
                    println!("{line}");
                }
                for line in render::new_toasts(&snapshot, &mut last_toast) {
                    println!("{line}");
                }
                let status = render::status_line(&snapshot);
                if status != last_status {
                    eprintln!("{status}");
                    last_status = status;
                }
                if let Some(url) = &snapshot.navigation {
                    println!("{} {}", "Opening".bold(), url.underline());
                    break;
                }
            }
        }
    }
    Ok(())
}
