use anyhow::Context;
use clap::Parser;
use dotenv::dotenv;
use drago_rs::drago::server::{self, AppState};
use drago_rs::drago::workflow::graph::{ExecutionMode, Scheduler};
use drago_rs::drago::workflow::loader::WorkflowLoader;
use drago_rs::drago::workflow::registry::HandlerRegistry;
use drago_rs::engine::event::LogReporter;

use std::sync::Arc;

#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Args {
    /// Maximum nodes executing at once
    #[arg(long, default_value_t = 2)]
    workers: usize,

    /// Wait for Enter before each node (implies --once)
    #[arg(long, default_value_t = false)]
    step: bool,

    /// Path to the workflow definition
    #[arg(long, default_value = "workflow.json")]
    workflow: String,

    /// Port for the trigger server
    #[arg(long, default_value_t = 8080)]
    port: u16,

    /// Bind address for the trigger server
    #[arg(long, default_value = "127.0.0.1")]
    host: String,

    /// Run the workflow once and exit instead of serving
    #[arg(long, default_value_t = false)]
    once: bool,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenv().ok();
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    let args = Args::parse();
    let workers = args.workers.max(1);

    let (specs, graph) = WorkflowLoader::new()
        .load_graph(&args.workflow)
        .await
        .with_context(|| format!("failed to load workflow {}", args.workflow))?;
    let graph = Arc::new(graph);
    log::info!("Loaded {} nodes from {}", specs.len(), args.workflow);

    let registry = HandlerRegistry::simulated();

    if args.step || args.once {
        let mode = if args.step {
            ExecutionMode::Step
        } else {
            ExecutionMode::Parallel { workers }
        };
        let summary = Scheduler::new(graph, registry, Arc::new(LogReporter))
            .run(mode)
            .await?;

        for id in &summary.order {
            if let Some(outcome) = summary.nodes.get(id) {
                println!("{}: {} (retries={})", id, outcome.state, outcome.retry_count);
            }
        }
        println!(
            "Run {} finished in {:?}: {} succeeded, {} failed",
            summary.run_id,
            summary.elapsed,
            summary.succeeded(),
            summary.failed()
        );
        return Ok(());
    }

    let state = AppState::new(specs, registry, workers);
    server::serve(&args.host, args.port, state).await?;

    Ok(())
}
