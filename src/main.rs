//! viewbar - interactive view-bar driver
//!
//! Line-oriented front end for the pipeline machine over the in-memory mock
//! backend. Each input line is one event:
//!
//! - `:Enter`, `:Shift+ArrowLeft`, ... press a key chord (resolved through the key map)
//! - `/retry`, `/dismiss`, `/export`, `/load <json>`, `/focus <n|tail>`, `/quit`
//! - anything else replaces the text of the focused field

use anyhow::Context;
use std::io::{BufRead, Write};
use std::time::{Duration, Instant};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};
use viewbar::{
    config::{log_dir, ViewBarConfig},
    pipeline::{KeyChord, Notice, PipelineEvent, PipelineMachine},
    session::{parse_pipeline_json, ChannelSession, MockBackend},
    types::{DatasetId, SessionStatus},
};

/// Upper bound on waiting for the backend after each line
const SETTLE_WAIT: Duration = Duration::from_millis(500);

fn main() -> anyhow::Result<()> {
    let config = ViewBarConfig::load_or_default();

    // Initialize logging
    let filter = config
        .logging
        .filter
        .clone()
        .unwrap_or_else(|| "info,viewbar=debug".to_string());
    let (file_layer, _log_guard) = match (config.logging.log_to_file, log_dir()) {
        (true, Some(dir)) => {
            let appender = tracing_appender::rolling::daily(dir, "viewbar.log");
            let (writer, guard) = tracing_appender::non_blocking(appender);
            let layer = tracing_subscriber::fmt::layer()
                .with_ansi(false)
                .with_writer(writer);
            (Some(layer), Some(guard))
        }
        _ => (None, None),
    };
    tracing_subscriber::registry()
        .with(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(filter)))
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .with(file_layer)
        .init();

    tracing::info!("Starting viewbar");

    let dataset = std::env::args().nth(1).unwrap_or_else(|| "quickstart".to_string());
    let backend = MockBackend::new().with_latency(Duration::from_millis(20));
    let session = ChannelSession::spawn(Box::new(backend), &config.session)
        .context("Failed to start session worker")?;

    let mut machine = PipelineMachine::new(Box::new(session), &config);
    machine
        .attach(DatasetId::new(dataset))
        .context("Failed to attach")?;
    settle(&mut machine);
    println!("{}", machine.snapshot());

    let stdin = std::io::stdin();
    for line in stdin.lock().lines() {
        let line = line.context("Failed to read input")?;
        let notices = match run_line(&mut machine, line.trim_end()) {
            Ok(Some(notices)) => notices,
            Ok(None) => break,
            Err(e) => {
                eprintln!("error: {:#}", e);
                continue;
            }
        };
        report(&notices);
        report(&settle(&mut machine));
        println!("{}", machine.snapshot());
        std::io::stdout().flush()?;
    }

    tracing::info!("Shutting down...");
    machine.detach();
    Ok(())
}

/// Apply one input line. `None` means quit.
fn run_line(machine: &mut PipelineMachine, line: &str) -> anyhow::Result<Option<Vec<Notice>>> {
    if let Some(chord) = line.strip_prefix(':') {
        let chord: KeyChord = chord.parse().map_err(anyhow::Error::msg)?;
        return Ok(Some(machine.key(&chord)));
    }

    let Some(command) = line.strip_prefix('/') else {
        return Ok(Some(machine.handle(PipelineEvent::Input(line.to_string()))));
    };
    let (name, arg) = command.split_once(' ').unwrap_or((command, ""));
    let notices = match name {
        "quit" | "q" => return Ok(None),
        "retry" => {
            machine.retry()?;
            Vec::new()
        }
        "dismiss" => {
            machine.dismiss_error();
            Vec::new()
        }
        "export" => {
            let json = serde_json::to_string_pretty(&machine.export_serialized())?;
            println!("{}", json);
            Vec::new()
        }
        "load" => {
            let stages = parse_pipeline_json(arg)?;
            machine.load_serialized(&stages)?
        }
        "focus" => {
            let event = match arg.trim() {
                "tail" => PipelineEvent::FocusTail,
                index => {
                    let index: usize = index.parse().context("expected a stage index")?;
                    let id = machine
                        .list()
                        .get(index)
                        .map(|s| s.id())
                        .with_context(|| format!("no stage at {}", index))?;
                    PipelineEvent::FocusStage(id)
                }
            };
            machine.handle(event)
        }
        "blur" => machine.handle(PipelineEvent::Blur),
        other => anyhow::bail!("unknown command '/{}'", other),
    };
    Ok(Some(notices))
}

/// Poll until nothing is pending or the wait runs out.
fn settle(machine: &mut PipelineMachine) -> Vec<Notice> {
    let deadline = Instant::now() + SETTLE_WAIT;
    let mut notices = Vec::new();
    loop {
        notices.extend(machine.poll());
        let pending = matches!(
            machine.status(),
            SessionStatus::Connecting | SessionStatus::Syncing
        );
        if !pending || Instant::now() >= deadline {
            return notices;
        }
        std::thread::sleep(Duration::from_millis(5));
    }
}

fn report(notices: &[Notice]) {
    for notice in notices {
        match notice {
            Notice::StageInvalid { stage, reason } => println!("! stage {} invalid: {}", stage, reason),
            Notice::FocusBlocked { stage } => {
                println!("! stage {} has unsaved text (:Enter to commit, :Escape to discard)", stage)
            }
            Notice::SyncRejected { stage, reason } => {
                println!("! backend rejected stage {}: {}", stage, reason)
            }
            Notice::Fault { message } => println!("! session fault: {} (/retry)", message),
        }
    }
}
