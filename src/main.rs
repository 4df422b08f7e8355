use ben_or::cluster::LocalNetwork;
use ben_or::config::NetworkSettings;
use ben_or::consensus::simulation::InMemoryNetwork;
use ben_or::logger;
use ben_or::network::StateReport;
use std::env;
use std::error::Error;
use std::time::Duration;
use tracing::{error, info};

fn init_logging() {
    #[cfg(feature = "json")]
    {
        if env::var("BEN_OR_LOG_FORMAT").as_deref() == Ok("json") {
            logger::init_logger_json();
            return;
        }
    }
    logger::init_logger();
}

fn print_states(states: &[StateReport], faulty: &[usize]) {
    println!("\n{}", "=".repeat(60));
    for (node_id, state) in states.iter().enumerate() {
        let label = if faulty.contains(&node_id) { "faulty" } else { "live" };
        println!(
            "Node {} [{}] | killed: {} | x: {} | decided: {} | k: {}",
            node_id,
            label,
            state.killed,
            state.x.map(|v| v.to_string()).unwrap_or_else(|| "null".to_string()),
            state.decided.map(|d| d.to_string()).unwrap_or_else(|| "null".to_string()),
            state.k.map(|k| k.to_string()).unwrap_or_else(|| "null".to_string()),
        );
    }
    println!("{}", "=".repeat(60));
}

fn run_simulation(settings: &NetworkSettings, seed: u64) {
    info!(seed, peers = settings.total_nodes, "Running in-process simulation");

    let mut network = InMemoryNetwork::new(settings.peer_configs(), seed);
    network.start_all();
    let report = network.run(1_000_000);

    let states: Vec<StateReport> = report.states.iter().copied().map(StateReport::from).collect();
    print_states(&states, &settings.faulty_peers);
    println!(
        "Delivered {} messages, {} left undelivered, agreed value: {}",
        report.delivered,
        report.undelivered,
        report
            .agreed_value()
            .map(|v| v.to_string())
            .unwrap_or_else(|| "none".to_string())
    );
}

async fn run_network(settings: NetworkSettings, timeout: Duration) -> Result<(), Box<dyn Error>> {
    let faulty = settings.faulty_peers.clone();
    let network = LocalNetwork::launch(settings).await?;

    network.start_consensus().await?;
    match network
        .wait_for_decision(timeout, Duration::from_millis(200))
        .await
    {
        Ok(states) => print_states(&states, &faulty),
        Err(e) => {
            error!(error = %e, "Consensus did not finish");
            if let Ok(states) = network.states().await {
                print_states(&states, &faulty);
            }
        }
    }

    network.stop_consensus().await;
    network.shutdown().await;
    Ok(())
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn Error>> {
    init_logging();

    let args: Vec<String> = env::args().collect();
    let simulate = args.contains(&"--simulate".to_string()) || args.contains(&"-s".to_string());
    let positional: Vec<&String> = args.iter().skip(1).filter(|a| !a.starts_with('-')).collect();

    let mut settings = NetworkSettings::from_env()?;
    if let Some(nodes) = positional.first().and_then(|s| s.parse().ok()) {
        settings = NetworkSettings {
            total_nodes: nodes,
            initial_values: vec![ben_or::Value::One; nodes],
            ..settings
        };
    }
    if let Some(max_faulty) = positional.get(1).and_then(|s| s.parse().ok()) {
        settings.max_faulty = max_faulty;
    }
    settings.validate()?;

    let timeout_secs: u64 = env::var("BEN_OR_TIMEOUT_SECS")
        .ok()
        .and_then(|s| s.parse().ok())
        .unwrap_or(30);

    if simulate {
        let seed = env::var("BEN_OR_SEED")
            .ok()
            .and_then(|s| s.parse().ok())
            .unwrap_or_else(rand::random);
        run_simulation(&settings, seed);
        return Ok(());
    }

    run_network(settings, Duration::from_secs(timeout_secs)).await
}
