//! Peer HTTP endpoint

use crate::consensus::{ConsensusEngine, Health, Message};
use crate::network::readiness::{wait_until_ready, Readiness};
use crate::network::validator::MessageValidator;
use crate::network::StateReport;
use actix_web::dev::Server;
use actix_web::{error, web, App, HttpResponse, HttpServer, Responder};
use serde_json::json;
use std::sync::Arc;
use std::time::Duration;
use tracing::{info, warn};

/// Everything a peer's routes need
pub struct PeerEndpoint {
    engine: Arc<ConsensusEngine>,
    readiness: Arc<dyn Readiness>,
    readiness_poll: Duration,
    validator: MessageValidator,
}

impl PeerEndpoint {
    pub fn new(engine: Arc<ConsensusEngine>, readiness: Arc<dyn Readiness>) -> Self {
        let config = engine.config();
        let validator =
            MessageValidator::new(config.total_nodes).with_min_round(config.starting_round);
        PeerEndpoint {
            engine,
            readiness,
            readiness_poll: Duration::from_millis(100),
            validator,
        }
    }

    pub fn with_readiness_poll(mut self, interval: Duration) -> Self {
        self.readiness_poll = interval;
        self
    }

    pub fn engine(&self) -> &Arc<ConsensusEngine> {
        &self.engine
    }
}

async fn status(endpoint: web::Data<PeerEndpoint>) -> impl Responder {
    match endpoint.engine.health() {
        Health::Live => HttpResponse::Ok().body(Health::Live.as_str()),
        Health::Faulty => HttpResponse::InternalServerError().body(Health::Faulty.as_str()),
    }
}

async fn receive_message(
    msg: web::Json<Message>,
    endpoint: web::Data<PeerEndpoint>,
) -> impl Responder {
    let message = msg.into_inner();
    if let Err(e) = endpoint.validator.validate(&message) {
        warn!(node_id = endpoint.engine.node_id(), error = %e, "Rejected inbound message");
        return HttpResponse::BadRequest().json(json!({ "error": e.to_string() }));
    }

    endpoint.engine.handle_message(message);
    HttpResponse::Ok().body("success")
}

async fn start(endpoint: web::Data<PeerEndpoint>) -> impl Responder {
    wait_until_ready(endpoint.readiness.as_ref(), endpoint.readiness_poll).await;
    endpoint.engine.start();
    HttpResponse::Ok().body("success")
}

async fn stop(endpoint: web::Data<PeerEndpoint>) -> impl Responder {
    endpoint.engine.stop();
    HttpResponse::Ok().body("success")
}

async fn get_state(endpoint: web::Data<PeerEndpoint>) -> impl Responder {
    HttpResponse::Ok().json(StateReport::from(endpoint.engine.state()))
}

fn json_config() -> web::JsonConfig {
    web::JsonConfig::default().error_handler(|err, _req| {
        warn!(error = %err, "Malformed inbound message");
        let response = HttpResponse::BadRequest().json(json!({ "error": err.to_string() }));
        error::InternalError::from_response(err, response).into()
    })
}

/// Registers the peer routes. The app must carry a `web::Data<PeerEndpoint>`.
pub fn configure(cfg: &mut web::ServiceConfig) {
    cfg.app_data(json_config())
        .route("/status", web::get().to(status))
        .route("/message", web::post().to(receive_message))
        .route("/start", web::get().to(start))
        .route("/stop", web::get().to(stop))
        .route("/getState", web::get().to(get_state));
}

/// Binds the peer's HTTP server. The returned server is not running until
/// awaited or spawned.
pub fn start_server(host: &str, port: u16, endpoint: PeerEndpoint) -> std::io::Result<Server> {
    let node_id = endpoint.engine.node_id();
    let data = web::Data::new(endpoint);

    let server = HttpServer::new(move || App::new().app_data(data.clone()).configure(configure))
        .workers(2)
        .disable_signals()
        .bind((host, port))?
        .run();

    info!(node_id, host, port, "Peer listening");
    Ok(server)
}
