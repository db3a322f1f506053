//! Runs one parallel-add workflow against the in-memory substrate and store.
//!
//! ```text
//! cargo run --example parallel_add -- --num-calculations 4
//! cargo run --example parallel_add -- --num-calculations 4 --fail-index 2
//! cargo run --example parallel_add -- --config workflow.toml --json
//! ```

use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};
use clap::Parser;
use scatter_gather::constants::task_id_for;
use scatter_gather::store::memory::InMemoryScalarStore;
use scatter_gather::substrate::memory::InMemorySubstrate;
use scatter_gather::{init_logging, ParallelAddWorkflow, WorkflowConfig};

/// Fan out N additions and report the aggregate
#[derive(Parser, Debug)]
#[command(name = "parallel_add")]
#[command(version)]
struct Cli {
    /// Load the workflow inputs from a TOML file instead of the flags below
    #[arg(long)]
    config: Option<PathBuf>,

    /// Executable reference every calculation runs
    #[arg(long, default_value = "add@localhost")]
    code: String,

    /// Number of calculations to submit in parallel
    #[arg(long, default_value = "4")]
    num_calculations: i64,

    /// Base value for x
    #[arg(long, default_value = "1")]
    base_x: i64,

    /// Base value for y
    #[arg(long, default_value = "10")]
    base_y: i64,

    /// Make the calculation at this index fail with exit status 1 (repeatable)
    #[arg(long)]
    fail_index: Vec<usize>,

    /// Simulated run time of each calculation, in milliseconds
    #[arg(long, default_value = "50")]
    delay_ms: u64,

    /// Give up waiting after this many milliseconds
    #[arg(long)]
    barrier_timeout_ms: Option<u64>,

    /// Print the whole run result as JSON
    #[arg(long)]
    json: bool,
}

impl Cli {
    fn workflow_config(&self) -> Result<WorkflowConfig> {
        if let Some(path) = &self.config {
            return WorkflowConfig::load(path)
                .with_context(|| format!("loading {}", path.display()));
        }
        let mut config = WorkflowConfig::new(self.code.clone())
            .with_num_calculations(self.num_calculations)
            .with_base_x(self.base_x)
            .with_base_y(self.base_y);
        if let Some(ms) = self.barrier_timeout_ms {
            config = config.with_barrier_timeout(Duration::from_millis(ms));
        }
        Ok(config)
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    init_logging();
    let cli = Cli::parse();
    let config = cli.workflow_config()?;

    let mut substrate = InMemorySubstrate::new()
        .with_arithmetic_add(config.code.trim())
        .with_default_delay(Duration::from_millis(cli.delay_ms));
    for index in &cli.fail_index {
        substrate = substrate.with_failure(task_id_for(*index), 1);
    }

    let workflow = ParallelAddWorkflow::new(Arc::new(substrate), Arc::new(InMemoryScalarStore::new()));
    let result = workflow.run(&config).await.context("workflow aborted")?;

    if cli.json {
        println!("{}", serde_json::to_string_pretty(&result)?);
        return Ok(());
    }

    println!("Run:     {}", result.run_id);
    println!("Status:  {}", result.decision);
    match &result.outputs {
        Some(outputs) => {
            for (name, scalar) in outputs.iter() {
                println!("  {name:<15} = {:<6} (pk {}, uuid {})", scalar.value(), scalar.pk(), scalar.uuid());
            }
        },
        None => println!("  no outputs"),
    }
    println!();
    println!("Report:");
    for entry in result.report.entries() {
        println!("  {} {}", entry.at.format("%H:%M:%S%.3f"), entry.message);
    }
    Ok(())
}
