use anyhow::Result;
use console::style;
use std::sync::Arc;
use std::time::Duration;
use tracing::info;

use super::Runtime;
use crate::core::scheduler::ReminderScheduler;
use crate::core::terminal::{self, ROCKET};
use crate::interfaces::web::{ApiServer, AppState};

pub(crate) fn parse_serve_flags(
    args: &[String],
    start: usize,
    mut host: String,
    mut port: u16,
) -> (String, u16) {
    let mut i = start;
    while i < args.len() {
        match args[i].as_str() {
            "--port" | "-p" => {
                if i + 1 < args.len() {
                    port = args[i + 1].parse().unwrap_or(port);
                    i += 2;
                } else {
                    i += 1;
                }
            }
            "--host" => {
                if i + 1 < args.len() {
                    host = args[i + 1].clone();
                    i += 2;
                } else {
                    i += 1;
                }
            }
            _ => i += 1,
        }
    }
    (host, port)
}

fn reminder_scheduler(runtime: &Runtime) -> Arc<ReminderScheduler> {
    Arc::new(ReminderScheduler::new(
        runtime.store.clone(),
        runtime.constants.timezone(),
        runtime.settings.scheduler.poll_limit,
    ))
}

fn poll_interval(runtime: &Runtime) -> Duration {
    Duration::from_secs(runtime.settings.scheduler.poll_interval_seconds.max(1))
}

pub(crate) async fn run_server(runtime: Runtime, host: String, port: u16) -> Result<()> {
    let reminders = reminder_scheduler(&runtime);
    let mut scheduler = reminders.spawn(poll_interval(&runtime)).await?;

    let state = AppState::new(
        runtime.orchestrator.clone(),
        runtime.store.clone(),
        runtime.tools.clone(),
        runtime.settings.llm.clone(),
        runtime.llm_configured,
        runtime.constants.timezone(),
    );
    println!(
        "{} {} {}",
        ROCKET,
        style("companion API listening on").bold(),
        style(format!("http://{}:{}", host, port)).underlined().cyan()
    );
    if !runtime.llm_configured {
        terminal::print_warn("No [llm] provider configured; using heuristic extraction only.");
    }

    let server = ApiServer::new(state, host, port);
    tokio::select! {
        res = server.serve() => res?,
        _ = tokio::signal::ctrl_c() => info!("Shutdown requested"),
    }
    scheduler.shutdown().await?;
    Ok(())
}

pub(crate) async fn run_scheduler(runtime: Runtime, once: bool) -> Result<()> {
    let reminders = reminder_scheduler(&runtime);
    if once {
        let report = reminders.tick().await?;
        terminal::print_json(&serde_json::to_value(report)?);
        return Ok(());
    }

    let every = poll_interval(&runtime);
    let mut scheduler = reminders.spawn(every).await?;
    terminal::print_info(&format!(
        "Scheduler started. Poll interval: {}s. Press Ctrl+C to stop.",
        every.as_secs()
    ));
    tokio::signal::ctrl_c().await?;
    scheduler.shutdown().await?;
    Ok(())
}
