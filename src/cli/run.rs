//! CLI command: `fleetops run`
//!
//! Submits a task in-process, prints its events as they arrive and finishes
//! with the per-host report.

use anyhow::{bail, Context};
use clap::Args;
use fleetops_core::{
    DispatchMode, DispatchOutcome, Event, FailurePolicy, HostStatus, SubmitTask, TaskState,
    TaskStatusReport,
};
use std::collections::HashMap;
use uuid::Uuid;

use crate::server::config::AppConfig;
use crate::server::AppContext;

#[derive(Args, Debug)]
pub struct RunArgs {
    /// Target host ID (repeatable; dispatch follows this order)
    #[arg(long = "host", required = true)]
    pub hosts: Vec<Uuid>,
    /// single, broadcast or batch
    #[arg(long, default_value = "broadcast", value_parser = parse_mode)]
    pub mode: DispatchMode,
    /// Hosts per batch in batch mode
    #[arg(long)]
    pub batch_size: Option<u32>,
    /// Seconds to wait between batches
    #[arg(long, value_name = "SECS")]
    pub batch_interval: Option<u64>,
    /// Stop before the next batch when a host fails
    #[arg(long)]
    pub pause_on_fail: bool,
    /// Command line to run
    #[arg(required = true, trailing_var_arg = true, allow_hyphen_values = true)]
    pub command: Vec<String>,
}

fn parse_mode(value: &str) -> Result<DispatchMode, String> {
    value.parse().map_err(|e: fleetops_core::Error| e.to_string())
}

impl RunArgs {
    fn into_request(self) -> SubmitTask {
        SubmitTask {
            mode: self.mode,
            batch_size: self.batch_size,
            batch_interval_secs: self.batch_interval,
            failure_policy: self.pause_on_fail.then_some(FailurePolicy::PauseOnFail),
            ..SubmitTask::new(self.command.join(" "), self.hosts)
        }
    }
}

/// Run the run subcommand.
pub async fn run(args: RunArgs, config: AppConfig) -> anyhow::Result<()> {
    let ctx = AppContext::from_config(&config).await?;
    let names: HashMap<Uuid, String> = ctx
        .store
        .list_hosts()
        .await?
        .into_iter()
        .map(|host| (host.id, host.name))
        .collect();

    // the task id is only known after launch, so listen to everything and filter
    let mut events = ctx.bus.subscribe(None);
    let (task_id, mut dispatch) = ctx.tasks.launch(args.into_request()).await?;
    println!("Task {} submitted", task_id);

    let outcome = loop {
        tokio::select! {
            Some(event) = events.recv() => print_event(&event, task_id, &names),
            joined = &mut dispatch => break joined.context("Dispatch task failed")?,
        }
    };
    while let Some(event) = events.try_recv() {
        print_event(&event, task_id, &names);
    }

    let report = ctx.tasks.get_task_status(task_id).await?;
    print_report(&report, &outcome, &names);

    let failed = report.count(HostStatus::Failed);
    if failed > 0 {
        bail!("{} of {} hosts failed", failed, report.hosts.len());
    }
    Ok(())
}

fn host_label(host_id: Uuid, names: &HashMap<Uuid, String>) -> String {
    names
        .get(&host_id)
        .cloned()
        .unwrap_or_else(|| host_id.to_string())
}

fn print_event(event: &Event, task_id: Uuid, names: &HashMap<Uuid, String>) {
    if event.task_id() != Some(task_id) {
        return;
    }
    let source = event
        .host_id
        .map(|id| host_label(id, names))
        .unwrap_or_else(|| "task".to_string());
    for line in event.line.lines() {
        println!("[{}] {}", source, line);
    }
}

fn print_report(
    report: &TaskStatusReport,
    outcome: &DispatchOutcome,
    names: &HashMap<Uuid, String>,
) {
    println!();
    println!(
        "  Task {} ({}): {:?}, {}/{} batches run",
        report.task.id, report.task.mode, report.state, outcome.batches_run, outcome.batches_total
    );
    println!("  {}", "-".repeat(72));
    println!("  {:<24} {:<10} {:<6} Error", "Host", "Status", "Exit");
    println!("  {}", "-".repeat(72));
    for row in &report.hosts {
        println!(
            "  {:<24} {:<10} {:<6} {}",
            host_label(row.host_id, names),
            row.status.as_str(),
            row.exit_code
                .map(|c| c.to_string())
                .unwrap_or_else(|| "-".into()),
            row.error.as_deref().unwrap_or("")
        );
    }
    if report.state == TaskState::Paused {
        println!("  Paused after a failed batch; pending hosts were not run.");
    }
    println!();
}
