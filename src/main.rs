//! modpilot - interactive moderation console
//!
//! Reads requests from stdin, turns each into a plan and runs it against a
//! dry-run executor. Pending approvals are answered with `y`/`n` (or ✅/❌).

use clap::Parser;
use modpilot::approval::{AckStatus, Acknowledgement};
use modpilot::command::DryRunExecutor;
use modpilot::core::config::PipelineConfig;
use modpilot::core::error::Result;
use modpilot::events::{topics, Event, SubscribeOptions};
use modpilot::llm::{CompletionBackend, LlmClient};
use modpilot::pipeline::{Outcome, Pipeline, PipelineReport};
use std::path::PathBuf;
use std::sync::Arc;
use tokio::io::{AsyncBufReadExt, BufReader};
use tokio::runtime::Runtime;
use tokio::task::JoinSet;
use tracing_subscriber::EnvFilter;

/// Natural-language moderation console
#[derive(Parser, Debug)]
#[command(name = "modpilot")]
#[command(about = "Turn moderation requests into executable plans")]
struct Args {
    /// TOML configuration file
    #[arg(long)]
    config: Option<PathBuf>,

    /// User id the requests are attributed to
    #[arg(long, default_value = "console")]
    requester: String,

    /// Skip the language model and use rule-based interpretation only
    #[arg(long)]
    offline: bool,
}

fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("modpilot=info")),
        )
        .init();

    let args = Args::parse();
    let config = match &args.config {
        Some(path) => PipelineConfig::load(path)?,
        None => PipelineConfig::default(),
    };

    let rt = Runtime::new()?;
    rt.block_on(run(args, config))
}

async fn run(args: Args, config: PipelineConfig) -> Result<()> {
    let backend: Option<Arc<dyn CompletionBackend>> = if args.offline {
        None
    } else {
        match LlmClient::from_env(&config.generation) {
            Ok(client) => {
                tracing::info!(model = client.model(), "using language model backend");
                Some(Arc::new(client) as Arc<dyn CompletionBackend>)
            }
            Err(e) => {
                tracing::warn!(error = %e, "no language model configured - using rule-based interpretation");
                None
            }
        }
    };

    let pipeline = Arc::new(Pipeline::new(config, backend, Arc::new(DryRunExecutor))?);
    pipeline.bus().subscribe(topics::ALL, print_event, SubscribeOptions::default());

    println!("\n=== MODPILOT ===");
    println!("Type a moderation request, e.g. \"timeout @bob for 10 minutes for spamming\".");
    println!("Answer approval prompts with y/n. Type quit to exit.\n");

    let requester = args.requester;
    let mut requests = JoinSet::new();
    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    while let Some(line) = lines.next_line().await? {
        let input = line.trim();
        if input.is_empty() {
            continue;
        }
        if input == "quit" || input == "q" {
            if !requests.is_empty() {
                println!("Cancelling outstanding requests.");
            }
            requests.shutdown().await;
            return Ok(());
        }

        if let Some(ack) = Acknowledgement::from_reply(input) {
            let gate = pipeline.gate();
            match gate.pending_for(&requester).first() {
                Some(session) => match gate.acknowledge(*session, &requester, ack) {
                    AckStatus::Recorded => {}
                    status => println!("Acknowledgement not recorded: {:?}", status),
                },
                None => println!("Nothing is waiting for approval."),
            }
            continue;
        }

        // Requests run concurrently so approvals can be answered while one waits
        let pipeline = pipeline.clone();
        let requester = requester.clone();
        let request = input.to_string();
        requests.spawn(async move {
            let report = pipeline.handle(&request, &requester).await;
            print_report(&request, &report);
        });
    }

    // End of input: let in-flight requests report; pending approvals run out their window
    while let Some(joined) = requests.join_next().await {
        if let Err(e) = joined {
            tracing::error!(error = %e, "request task failed");
        }
    }
    Ok(())
}

fn print_event(event: &Event) -> modpilot::events::HandlerResult {
    match event {
        Event::Notice { message, .. } => println!("note: {}", message),
        Event::ApprovalRequested {
            summary, window_secs, ..
        } => {
            println!("Approval needed ({}s to answer):\n{}", window_secs, summary);
            println!("Reply y to run it, n to cancel.");
        }
        Event::StepCompleted {
            step_id,
            action,
            success,
            ..
        } => println!(
            "  [{}] {} {}",
            step_id,
            action,
            if *success { "ok" } else { "FAILED" }
        ),
        other => tracing::debug!(topic = other.topic(), "event"),
    }
    Ok(true)
}

fn print_report(request: &str, report: &PipelineReport) {
    match report.outcome {
        Outcome::Executed => {
            if let Some(workflow) = &report.workflow {
                println!(
                    "\"{}\": {:?} ({}/{} steps succeeded)",
                    request, workflow.status, workflow.succeeded, workflow.total_steps
                );
            }
        }
        Outcome::Rejected => println!("\"{}\": cancelled", request),
        Outcome::Expired => println!("\"{}\": approval window expired, nothing was done", request),
        Outcome::NotUnderstood => println!("\"{}\": not understood", request),
    }
    for message in &report.messages {
        println!("  {}", message);
    }
}
