//! chatlink binary entry point.

use std::process::ExitCode;

use chatlink::cli::{self, Args};
use chatlink::config::Config;
use chatlink::{logging, Session};
use tokio::io::{AsyncBufReadExt, BufReader};
use tracing::{error, info, warn};

#[tokio::main]
async fn main() -> ExitCode {
    let args = match cli::parse_args() {
        Ok(args) => args,
        Err(e) => {
            eprintln!("error: {}", e);
            eprintln!("Run with --help for usage.");
            return ExitCode::from(2);
        }
    };

    if args.help {
        cli::print_help();
        return ExitCode::SUCCESS;
    }
    if args.version {
        cli::print_version();
        return ExitCode::SUCCESS;
    }

    match run(&args).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            error!("{}", e);
            eprintln!("error: {}", e);
            ExitCode::FAILURE
        }
    }
}

async fn run(args: &Args) -> Result<(), Box<dyn std::error::Error>> {
    let config = Config::load(args)?;
    let _ = logging::init_with_level(config.log_filter());

    info!("chatlink v{}", env!("CARGO_PKG_VERSION"));

    let secret = config.secret()?;
    let (session, events) = Session::start(
        config.connection.user_id.clone(),
        secret,
        config.connection.endpoint.clone(),
        config.to_session_options(),
    )
    .await?;

    info!(
        conversation = %session.conversation_id(),
        mode = %session.mode(),
        "connected"
    );

    let user_id = session.user_id().to_string();
    let mut activities = events.activities;
    let printer = tokio::spawn(async move {
        while let Some(batch) = activities.recv().await {
            for activity in batch.iter().filter(|a| !a.is_from(&user_id)) {
                let sender = activity.sender_id().unwrap_or("?");
                match activity.text.as_deref() {
                    Some(text) => println!("{}> {}", sender, text),
                    None => println!("{}> [{}]", sender, activity.kind),
                }
            }
        }
    });

    let mut errors = events.errors;
    let reporter = tokio::spawn(async move {
        while let Some(err) = errors.recv().await {
            warn!(error = %err, "session error");
        }
    });

    let mut closed = events.closed;
    let mut lines = BufReader::new(tokio::io::stdin()).lines();

    loop {
        tokio::select! {
            line = lines.next_line() => {
                let Some(line) = line? else {
                    break;
                };
                let line = line.trim();
                if line.is_empty() {
                    continue;
                }
                if line == "/quit" {
                    break;
                }
                if let Err(e) = session.send_message(line).await {
                    warn!(error = %e, "send failed");
                }
            }
            Some(code) = closed.recv() => {
                info!(code, "channel closed");
            }
            _ = tokio::signal::ctrl_c() => {
                info!("interrupted");
                break;
            }
        }
    }

    if let Err(e) = session.end(true).await {
        warn!(error = %e, "failed to end conversation");
        session.cleanup();
    }

    let _ = printer.await;
    let _ = reporter.await;

    info!("chatlink shutdown complete");
    Ok(())
}
