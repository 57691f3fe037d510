use std::io::{self, IsTerminal, Write};
use std::path::PathBuf;

use anyhow::Result;
use clap::Parser;
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;

use openclaw_tail::config::{CliOptions, load_config, resolve};
use openclaw_tail::logs::{TailEvent, Tailer, list_agents, state_dir};
use openclaw_tail::ui::{FeedOptions, Theme, format_record};

#[derive(Parser)]
#[command(name = "openclaw-tail", version)]
#[command(about = "Tail OpenClaw session logs in real time")]
#[command(after_help = "Examples:
  openclaw-tail                    # Tail all agents
  openclaw-tail -a main            # Tail only the \"main\" agent
  openclaw-tail -n 20              # Show last 20 messages, then follow
  openclaw-tail -n 10 --no-follow  # Show last 10 messages and exit")]
struct Args {
    /// Agent ID(s) to tail. Defaults to all agents
    #[arg(short, long = "agent", value_name = "AGENT")]
    agents: Vec<String>,

    /// Show last N messages before tailing
    #[arg(short = 'n', long = "last", value_name = "N", default_value_t = 0)]
    last: usize,

    /// Print recent messages and exit (don't follow)
    #[arg(long)]
    no_follow: bool,

    /// Include deleted session files
    #[arg(long)]
    deleted: bool,

    /// How often to check session files for new lines
    #[arg(long, value_name = "MS")]
    poll_interval_ms: Option<u64>,

    /// Config file (default: ~/.config/openclaw-tail/config.yaml)
    #[arg(long, value_name = "PATH")]
    config: Option<PathBuf>,

    /// Enable logging to ~/.openclaw/logs/openclaw-tail.log (off by default)
    /// Levels: trace, debug, info, warn, error. Can also set via RUST_LOG env var.
    #[arg(long, value_name = "LEVEL")]
    log_level: Option<String>,
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();

    // Only enabled if --log-level is specified or RUST_LOG env var is set
    init_logging(args.log_level.as_deref());

    let file_config = load_config(args.config.as_deref())?;
    let root = state_dir(file_config.state_dir.as_deref())?;

    let known_agents = list_agents(&root)?;
    let agents = if args.agents.is_empty() {
        known_agents.clone()
    } else {
        args.agents.clone()
    };
    if agents.is_empty() {
        eprintln!("No agents found in {}", root.display());
        std::process::exit(1);
    }
    for agent in &args.agents {
        if !known_agents.contains(agent) {
            eprintln!("Warning: agent '{}' has no sessions in {}", agent, root.display());
        }
    }

    let cli = CliOptions {
        agents: args.agents.clone(),
        last: args.last,
        no_follow: args.no_follow,
        include_deleted: args.deleted,
        poll_interval_ms: args.poll_interval_ms,
    };
    let config = resolve(root, &cli, &file_config)?;

    let theme = if io::stdout().is_terminal() && std::env::var_os("NO_COLOR").is_none() {
        Theme::new()
    } else {
        Theme::plain()
    };

    let (tx, rx) = mpsc::channel(256);
    let cancel = CancellationToken::new();

    let ctrl_c = cancel.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            ctrl_c.cancel();
        }
    });

    let tailer = tokio::spawn(Tailer::new(config).run(tx, cancel.clone()));

    let result = print_feed(rx, &theme).await;
    if let Err(e) = &result {
        // Output is gone (e.g. closed pipe); stop the tailer
        tracing::debug!("Output closed: {}", e);
        cancel.cancel();
    }
    tailer.await?;

    if cancel.is_cancelled() && result.is_ok() {
        println!("\n{}", theme.notice.apply("Stopped."));
    }

    Ok(())
}

async fn print_feed(mut rx: mpsc::Receiver<TailEvent>, theme: &Theme) -> io::Result<()> {
    while let Some(event) = rx.recv().await {
        let mut stdout = io::stdout().lock();
        match event {
            TailEvent::Record(record) => {
                let options = FeedOptions {
                    show_session: true,
                    width: terminal_width(),
                };
                writeln!(stdout, "{}", format_record(&record, theme, &options))?;
            }
            TailEvent::ReplayComplete { emitted } => {
                if emitted > 0 {
                    writeln!(stdout)?;
                }
            }
            TailEvent::Started { sessions, agents } => {
                let agent_str = if agents.is_empty() {
                    "none".to_string()
                } else {
                    agents.join(", ")
                };
                let header = format!("Tailing {sessions} sessions across agents: {agent_str}");
                writeln!(stdout, "{}", theme.header.apply(header))?;
                writeln!(stdout, "{}\n", theme.notice.apply("Press Ctrl+C to stop"))?;
            }
            TailEvent::SessionsAdded(count) => {
                let notice = format!("  + {count} new session(s)");
                writeln!(stdout, "{}", theme.notice.apply(notice))?;
            }
            TailEvent::Error(message) => {
                eprintln!("{}", theme.error.apply(format!("Error: {message}")));
            }
        }
        stdout.flush()?;
    }
    Ok(())
}

fn terminal_width() -> usize {
    crossterm::terminal::size()
        .map(|(cols, _)| cols as usize)
        .unwrap_or(120)
}

fn init_logging(log_level: Option<&str>) {
    use tracing_subscriber::{EnvFilter, fmt, prelude::*};

    // Determine log level:
    // 1. Check RUST_LOG environment variable first
    // 2. Then use --log-level argument
    // 3. Default to off (no logging)
    let filter = if let Ok(env_filter) = EnvFilter::try_from_default_env() {
        env_filter
    } else if let Some(level) = log_level {
        EnvFilter::new(format!("openclaw_tail={}", level))
    } else {
        EnvFilter::new("off")
    };

    if logging_disabled(&filter) {
        tracing_subscriber::registry().with(filter).init();
        return;
    }

    // Log to a file so diagnostics never interleave with the feed on stdout
    if let Some(log_dir) = log_dir()
        && std::fs::create_dir_all(&log_dir).is_ok()
    {
        let file_appender = tracing_appender::rolling::never(&log_dir, "openclaw-tail.log");

        tracing_subscriber::registry()
            .with(fmt::layer().with_writer(file_appender).with_ansi(false))
            .with(filter)
            .init();

        return;
    }

    // Fallback: no logging if we can't create the log directory
    tracing_subscriber::registry()
        .with(EnvFilter::new("off"))
        .init();
}

fn logging_disabled(filter: &tracing_subscriber::EnvFilter) -> bool {
    filter.max_level_hint() == Some(tracing_subscriber::filter::LevelFilter::OFF)
}

fn log_dir() -> Option<PathBuf> {
    dirs::home_dir().map(|home| home.join(".openclaw").join("logs"))
}
