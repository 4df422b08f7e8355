//! Local network launcher
//!
//! Brings up N peers in this process, each behind its own HTTP server on
//! `base_port + i`, and drives them through the same routes an external
//! harness would use.

use crate::config::{AddressBook, NetworkSettings};
use crate::consensus::{ConsensusEngine, RandomCoin};
use crate::error::{NetworkError, TransportError};
use crate::network::client::{build_client, fetch_state, request_start, request_stop};
use crate::network::{start_server, HttpBroadcaster, PeerEndpoint, ReadinessTracker, StateReport};
use actix_web::dev::ServerHandle;
use reqwest::Client;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::runtime::Handle;
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

pub struct LocalNetwork {
    settings: NetworkSettings,
    addresses: AddressBook,
    client: Client,
    engines: Vec<Arc<ConsensusEngine>>,
    servers: Vec<ServerHandle>,
    tasks: Vec<JoinHandle<std::io::Result<()>>>,
    readiness: ReadinessTracker,
}

impl LocalNetwork {
    /// Binds every peer and marks it ready. Must run inside a tokio runtime.
    pub async fn launch(settings: NetworkSettings) -> Result<Self, NetworkError> {
        settings.validate()?;

        let client = build_client()?;
        let addresses = settings.address_book();
        let readiness = ReadinessTracker::new(settings.total_nodes);
        let runtime = Handle::current();

        let mut engines = Vec::with_capacity(settings.total_nodes);
        let mut servers = Vec::with_capacity(settings.total_nodes);
        let mut tasks = Vec::with_capacity(settings.total_nodes);

        for config in settings.peer_configs() {
            let node_id = config.node_id;
            let broadcaster = Arc::new(HttpBroadcaster::new(
                node_id,
                client.clone(),
                addresses.clone(),
                runtime.clone(),
            ));
            let engine = Arc::new(ConsensusEngine::new(config, broadcaster, Arc::new(RandomCoin)));
            let endpoint = PeerEndpoint::new(engine.clone(), Arc::new(readiness.clone()))
                .with_readiness_poll(settings.readiness_poll);

            let port = settings.base_port + node_id as u16;
            let server = start_server(&settings.host, port, endpoint)?;
            servers.push(server.handle());
            tasks.push(tokio::spawn(server));
            readiness.mark_ready(node_id);
            engines.push(engine);
        }

        info!(
            peers = settings.total_nodes,
            max_faulty = settings.max_faulty,
            faulty = ?settings.faulty_peers,
            "Network launched"
        );

        Ok(LocalNetwork {
            settings,
            addresses,
            client,
            engines,
            servers,
            tasks,
            readiness,
        })
    }

    pub fn settings(&self) -> &NetworkSettings {
        &self.settings
    }

    pub fn addresses(&self) -> &AddressBook {
        &self.addresses
    }

    pub fn engine(&self, node_id: usize) -> Option<&Arc<ConsensusEngine>> {
        self.engines.get(node_id)
    }

    pub fn is_ready(&self) -> bool {
        self.readiness.is_ready()
    }

    /// Sends `/start` to every peer.
    pub async fn start_consensus(&self) -> Result<(), TransportError> {
        for (node_id, url) in self.addresses.iter() {
            request_start(&self.client, url).await?;
            debug!(node_id, "Start acknowledged");
        }
        Ok(())
    }

    /// Sends `/stop` to every peer. Unreachable peers are logged and skipped.
    pub async fn stop_consensus(&self) {
        for (node_id, url) in self.addresses.iter() {
            if let Err(e) = request_stop(&self.client, url).await {
                warn!(node_id, error = %e, "Failed to stop peer");
            }
        }
    }

    /// `/getState` of every peer, in peer order
    pub async fn states(&self) -> Result<Vec<StateReport>, TransportError> {
        let mut states = Vec::with_capacity(self.addresses.len());
        for (_, url) in self.addresses.iter() {
            states.push(fetch_state(&self.client, url).await?);
        }
        Ok(states)
    }

    /// Polls peer states until every non-faulty peer has decided.
    pub async fn wait_for_decision(
        &self,
        timeout: Duration,
        poll: Duration,
    ) -> Result<Vec<StateReport>, NetworkError> {
        let started = Instant::now();
        loop {
            let states = self.states().await?;
            let all_decided = states
                .iter()
                .enumerate()
                .filter(|(i, _)| !self.settings.faulty_peers.contains(i))
                .all(|(_, s)| s.decided == Some(true));
            if all_decided {
                info!(elapsed = ?started.elapsed(), "All live peers decided");
                return Ok(states);
            }
            if started.elapsed() >= timeout {
                return Err(NetworkError::Timeout(timeout));
            }
            tokio::time::sleep(poll).await;
        }
    }

    /// Stops every server and waits for them to exit.
    pub async fn shutdown(self) {
        for server in &self.servers {
            server.stop(true).await;
        }
        for task in self.tasks {
            if let Ok(Err(e)) = task.await {
                warn!(error = %e, "Peer server exited with error");
            }
        }
        info!("Network shut down");
    }
}
