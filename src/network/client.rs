//! HTTP transport: fan-out broadcast and control calls to remote peers

use crate::config::AddressBook;
use crate::consensus::{BroadcastPort, Health, Message};
use crate::error::TransportError;
use crate::network::StateReport;
use reqwest::{Client, StatusCode};
use std::time::Duration;
use tokio::runtime::Handle;
use tracing::warn;

pub fn build_client() -> Result<Client, TransportError> {
    let client = Client::builder()
        .user_agent("ben-or-consensus/0.1.0")
        .timeout(Duration::from_secs(10))
        .build()?;
    Ok(client)
}

/// Delivers a broadcast to every peer in the address book, this peer
/// included, with one spawned request per destination. Nothing awaits the
/// requests; failures are logged and forgotten.
pub struct HttpBroadcaster {
    node_id: usize,
    client: Client,
    addresses: AddressBook,
    runtime: Handle,
}

impl HttpBroadcaster {
    pub fn new(node_id: usize, client: Client, addresses: AddressBook, runtime: Handle) -> Self {
        HttpBroadcaster {
            node_id,
            client,
            addresses,
            runtime,
        }
    }
}

impl BroadcastPort for HttpBroadcaster {
    fn broadcast(&self, message: Message) {
        for (peer, url) in self.addresses.iter() {
            let client = self.client.clone();
            let url = url.to_string();
            let node_id = self.node_id;
            self.runtime.spawn(async move {
                if let Err(e) = send_message(&client, &url, &message).await {
                    warn!(node_id, peer, round = message.round, error = %e, "Failed to deliver message");
                }
            });
        }
    }
}

fn ensure_success(status: StatusCode) -> Result<(), TransportError> {
    if status.is_success() {
        Ok(())
    } else {
        Err(TransportError::Status(status))
    }
}

/// POSTs a protocol message to a peer's `/message` route.
pub async fn send_message(
    client: &Client,
    base_url: &str,
    message: &Message,
) -> Result<(), TransportError> {
    let response = client
        .post(format!("{}/message", base_url))
        .json(message)
        .send()
        .await?;
    ensure_success(response.status())
}

pub async fn fetch_status(client: &Client, base_url: &str) -> Result<Health, TransportError> {
    let response = client.get(format!("{}/status", base_url)).send().await?;
    match response.status() {
        StatusCode::OK => Ok(Health::Live),
        StatusCode::INTERNAL_SERVER_ERROR => Ok(Health::Faulty),
        other => Err(TransportError::Status(other)),
    }
}

pub async fn fetch_state(client: &Client, base_url: &str) -> Result<StateReport, TransportError> {
    let response = client.get(format!("{}/getState", base_url)).send().await?;
    ensure_success(response.status())?;
    Ok(response.json::<StateReport>().await?)
}

pub async fn request_start(client: &Client, base_url: &str) -> Result<(), TransportError> {
    let response = client.get(format!("{}/start", base_url)).send().await?;
    ensure_success(response.status())
}

pub async fn request_stop(client: &Client, base_url: &str) -> Result<(), TransportError> {
    let response = client.get(format!("{}/stop", base_url)).send().await?;
    ensure_success(response.status())
}
