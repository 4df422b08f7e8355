use actix_web::http::StatusCode;
use actix_web::{test, web, App};
use ben_or::config::PeerConfig;
use ben_or::consensus::{BroadcastPort, ConsensusEngine, FixedCoin, Message, Phase, Value};
use ben_or::logger::init_test_logger;
use ben_or::network::readiness::AlwaysReady;
use ben_or::network::{configure, PeerEndpoint, StateReport};
use parking_lot::Mutex;
use serde_json::json;
use std::sync::Arc;

#[derive(Default)]
struct Sink {
    sent: Mutex<Vec<Message>>,
}

impl BroadcastPort for Sink {
    fn broadcast(&self, message: Message) {
        self.sent.lock().push(message);
    }
}

fn endpoint(faulty: bool) -> (web::Data<PeerEndpoint>, Arc<Sink>) {
    init_test_logger();
    let sink = Arc::new(Sink::default());
    let config = PeerConfig::new(0, 4, 1, Value::One).faulty(faulty);
    let engine = Arc::new(ConsensusEngine::new(config, sink.clone(), Arc::new(FixedCoin(true))));
    let endpoint = PeerEndpoint::new(engine, Arc::new(AlwaysReady));
    (web::Data::new(endpoint), sink)
}

#[actix_rt::test]
async fn test_status_reports_live() {
    let (data, _) = endpoint(false);
    let app = test::init_service(App::new().app_data(data).configure(configure)).await;

    let resp = test::call_service(&app, test::TestRequest::get().uri("/status").to_request()).await;
    assert_eq!(resp.status(), StatusCode::OK);
    assert_eq!(&test::read_body(resp).await[..], b"live");
}

#[actix_rt::test]
async fn test_status_reports_faulty() {
    let (data, _) = endpoint(true);
    let app = test::init_service(App::new().app_data(data).configure(configure)).await;

    let resp = test::call_service(&app, test::TestRequest::get().uri("/status").to_request()).await;
    assert_eq!(resp.status(), StatusCode::INTERNAL_SERVER_ERROR);
    assert_eq!(&test::read_body(resp).await[..], b"faulty");
}

#[actix_rt::test]
async fn test_start_then_get_state() {
    let (data, sink) = endpoint(false);
    let app = test::init_service(App::new().app_data(data).configure(configure)).await;

    let resp = test::call_service(&app, test::TestRequest::get().uri("/start").to_request()).await;
    assert_eq!(resp.status(), StatusCode::OK);
    assert_eq!(sink.sent.lock().clone(), vec![Message::propose(1, Value::One, 0)]);

    let state: StateReport = test::call_and_read_body_json(
        &app,
        test::TestRequest::get().uri("/getState").to_request(),
    )
    .await;
    assert_eq!(
        state,
        StateReport {
            killed: false,
            x: Some(Value::One),
            decided: Some(false),
            k: Some(1),
        }
    );
}

#[actix_rt::test]
async fn test_messages_drive_the_engine() {
    let (data, sink) = endpoint(false);
    let engine = data.engine().clone();
    let app = test::init_service(App::new().app_data(data).configure(configure)).await;

    test::call_service(&app, test::TestRequest::get().uri("/start").to_request()).await;
    for sender in 1..4 {
        let req = test::TestRequest::post()
            .uri("/message")
            .set_json(json!({ "k": 1, "x": 1, "type": "propose", "senderId": sender }))
            .to_request();
        let resp = test::call_service(&app, req).await;
        assert_eq!(resp.status(), StatusCode::OK);
        assert_eq!(&test::read_body(resp).await[..], b"success");
    }

    assert_eq!(engine.state().phase, Phase::Vote);
    assert_eq!(sink.sent.lock().last().copied(), Some(Message::vote(1, Value::One, 0)));
}

#[actix_rt::test]
async fn test_discarded_message_still_acked() {
    let (data, _) = endpoint(false);
    let app = test::init_service(App::new().app_data(data).configure(configure)).await;

    test::call_service(&app, test::TestRequest::get().uri("/stop").to_request()).await;
    let req = test::TestRequest::post()
        .uri("/message")
        .set_json(Message::vote(1, Value::Zero, 2))
        .to_request();
    let resp = test::call_service(&app, req).await;
    assert_eq!(resp.status(), StatusCode::OK);
}

#[actix_rt::test]
async fn test_malformed_messages_rejected() {
    let (data, _) = endpoint(false);
    let engine = data.engine().clone();
    let app = test::init_service(App::new().app_data(data).configure(configure)).await;

    let bodies = [
        json!({ "k": 1, "x": 2, "type": "propose", "senderId": 1 }),
        json!({ "k": 1, "x": 1, "type": "commit", "senderId": 1 }),
        json!({ "k": 1, "x": 1, "type": "vote", "senderId": 9 }),
        json!({ "k": 0, "x": 1, "type": "vote", "senderId": 1 }),
        json!({ "x": 1, "type": "vote", "senderId": 1 }),
    ];
    for body in bodies {
        let req = test::TestRequest::post().uri("/message").set_json(&body).to_request();
        let resp = test::call_service(&app, req).await;
        assert_eq!(resp.status(), StatusCode::BAD_REQUEST, "{}", body);
    }
    assert_eq!(engine.distinct_senders(1, Phase::Vote), 0);
    assert_eq!(engine.distinct_senders(1, Phase::Propose), 0);
}

#[actix_rt::test]
async fn test_faulty_state_is_opaque() {
    let (data, sink) = endpoint(true);
    let app = test::init_service(App::new().app_data(data).configure(configure)).await;

    test::call_service(&app, test::TestRequest::get().uri("/start").to_request()).await;
    for sender in 0..4 {
        let req = test::TestRequest::post()
            .uri("/message")
            .set_json(Message::propose(1, Value::One, sender))
            .to_request();
        assert_eq!(test::call_service(&app, req).await.status(), StatusCode::OK);
    }

    let state: StateReport = test::call_and_read_body_json(
        &app,
        test::TestRequest::get().uri("/getState").to_request(),
    )
    .await;
    assert_eq!(
        state,
        StateReport {
            killed: false,
            x: None,
            decided: None,
            k: None,
        }
    );
    assert!(sink.sent.lock().is_empty());
}

#[actix_rt::test]
async fn test_stop_is_idempotent() {
    let (data, _) = endpoint(false);
    let app = test::init_service(App::new().app_data(data).configure(configure)).await;

    test::call_service(&app, test::TestRequest::get().uri("/start").to_request()).await;
    for _ in 0..2 {
        let resp = test::call_service(&app, test::TestRequest::get().uri("/stop").to_request()).await;
        assert_eq!(resp.status(), StatusCode::OK);
    }

    let state: StateReport = test::call_and_read_body_json(
        &app,
        test::TestRequest::get().uri("/getState").to_request(),
    )
    .await;
    assert!(state.killed);
    assert_eq!(state.x, None);
    assert_eq!(state.decided, None);
    assert_eq!(state.k, None);
}
