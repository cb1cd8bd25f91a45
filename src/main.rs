use anyhow::Result;
use clap::{Parser, Subcommand};
use serde_json::json;
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use formicary::registry::BeliefRegistry;
use formicary::runtime::ScriptedRuntime;
use formicary::types::{Specialty, StrategicDirective, Task};
use formicary::{Orchestrator, SwarmConfig};

#[derive(Parser)]
#[command(name = "formicary")]
#[command(about = "Hierarchical supervision runtime for agent swarms", long_about = None)]
#[command(version)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    Run {
        #[arg(help = "Project goal")]
        goal: String,
        #[arg(long, default_value_t = 2, help = "Number of supervisors")]
        supervisors: usize,
        #[arg(long, default_value_t = 4, help = "Workers per supervisor")]
        workers: usize,
        #[arg(long, default_value_t = 6, help = "Decision rounds before exit")]
        rounds: usize,
        #[arg(
            long,
            default_value = "code_generation",
            help = "Tuning profile: code_generation, research, rapid_prototyping"
        )]
        profile: String,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    match cli.command {
        Commands::Run {
            goal,
            supervisors,
            workers,
            rounds,
            profile,
        } => run_swarm(&goal, supervisors, workers, rounds, &profile).await?,
    }

    Ok(())
}

async fn run_swarm(
    goal: &str,
    supervisors: usize,
    workers: usize,
    rounds: usize,
    profile: &str,
) -> Result<()> {
    let mut constraints = HashMap::new();
    constraints.insert("goal".to_string(), json!(goal));
    constraints.insert("max_cost_usd".to_string(), json!(50));

    let registry = Arc::new(BeliefRegistry::new("demo-project", constraints));
    let runtime = Arc::new(ScriptedRuntime::new(Duration::from_millis(200)));

    let mut config = match profile {
        "code_generation" => SwarmConfig::code_generation(),
        "research" => SwarmConfig::research(),
        "rapid_prototyping" => SwarmConfig::rapid_prototyping(),
        other => anyhow::bail!("unknown profile: {}", other),
    };
    // Demo timings: sample fast, short warm-up, quick backoff.
    config.supervisor.monitor.interval = Duration::from_millis(500);
    config.supervisor.monitor.warmup = Duration::from_secs(1);
    config.supervisor.monitor.global_timeout = Duration::from_secs(20);
    config.supervisor.respawn.backoff_base = Duration::from_millis(500);
    config.supervisor.max_workers = workers + 2;

    let orchestrator = Orchestrator::new(registry.clone(), runtime, config);

    let mut monitors = Vec::new();
    for s in 0..supervisors {
        let supervisor = orchestrator.create_supervisor();
        monitors.push(supervisor.start_monitor());

        for w in 0..workers {
            let worker = supervisor
                .spawn(Specialty::from("code"))
                .await
                .map_err(anyhow::Error::from)?;

            let mut task = Task::new(format!("{} (shard {}.{})", goal, s, w), 4);
            // One deliberately stuck worker per supervisor to exercise the
            // kill-and-respawn path.
            if w == workers - 1 {
                task = task.with_constraint("stall", json!(true));
            }
            supervisor.assign(worker, task).await?;
        }
        println!("supervisor {} online with {} workers", supervisor.id(), workers);
    }

    let mut phase = 0;
    for round in 1..=rounds {
        tokio::time::sleep(Duration::from_secs(2)).await;

        let pulses = orchestrator.collect_pulses().await;
        for pulse in &pulses {
            println!(
                "[round {}] supervisor {}: {}/{} complete, {} failed, {} respawned, health {}",
                round,
                pulse.supervisor,
                pulse.workers_completed,
                pulse.workers_total,
                pulse.workers_failed,
                pulse.workers_respawned,
                pulse.health.as_str(),
            );
        }

        let directive = orchestrator.decide(&pulses).await;
        println!("[round {}] directive: {}", round, directive.as_str());

        match directive {
            StrategicDirective::AdvancePhase => {
                phase += 1;
                let turn = orchestrator.advance_phase(&format!("phase_{}", phase)).await?;
                println!("advanced to phase_{} at turn {}", phase, turn);
            }
            StrategicDirective::Abort => {
                println!("aborting run");
                break;
            }
            StrategicDirective::Pause | StrategicDirective::Continue => {}
        }
    }

    let view = orchestrator.overview().await?;
    println!(
        "\nfinal state: phase {}, turn {}, {} agents registered across {} supervisors",
        view.phase, view.turn, view.registered_agents, view.supervisors
    );
    if let Some(decision) = view.last_decision {
        println!("last decision: {} ({})", decision.directive.as_str(), decision.reason);
    }

    for monitor in monitors {
        monitor.abort();
    }
    Ok(())
}
