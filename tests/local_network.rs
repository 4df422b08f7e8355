use ben_or::cluster::LocalNetwork;
use ben_or::config::NetworkSettings;
use ben_or::consensus::{Health, Value};
use ben_or::logger::init_test_logger;
use ben_or::network::client::{build_client, fetch_status};
use ben_or::network::readiness::{HttpReadiness, Readiness};
use std::time::Duration;

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_all_ones_decide_one_over_http() {
    init_test_logger();
    let settings = NetworkSettings::new(4, 1).with_base_port(39410);
    let network = LocalNetwork::launch(settings).await.unwrap();
    assert!(network.is_ready());
    let probe = HttpReadiness::new(build_client().unwrap(), network.addresses().clone());
    assert!(probe.all_ready().await);

    network.start_consensus().await.unwrap();
    let states = network
        .wait_for_decision(Duration::from_secs(20), Duration::from_millis(50))
        .await
        .unwrap();

    for state in &states {
        assert!(!state.killed);
        assert_eq!(state.decided, Some(true));
        assert_eq!(state.x, Some(Value::One));
        assert_eq!(state.k, Some(1));
    }

    network.stop_consensus().await;
    let stopped = network.states().await.unwrap();
    assert!(stopped.iter().all(|s| s.killed && s.decided.is_none()));

    network.shutdown().await;
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_faulty_peer_does_not_block_decision() {
    init_test_logger();
    let settings = NetworkSettings::new(5, 1)
        .with_base_port(39430)
        .with_initial_values(vec![Value::Zero; 5])
        .with_faulty_peers(vec![2]);
    let network = LocalNetwork::launch(settings).await.unwrap();
    assert_eq!(network.settings().total_nodes, 5);
    assert_eq!(network.settings().faulty_peers, vec![2]);
    assert_eq!(network.engine(2).unwrap().health(), Health::Faulty);
    assert!(network.engine(5).is_none());

    let client = build_client().unwrap();
    let faulty_url = network.addresses().url(2).unwrap().to_string();
    assert_eq!(fetch_status(&client, &faulty_url).await.unwrap(), Health::Faulty);
    let live_url = network.addresses().url(0).unwrap().to_string();
    assert_eq!(fetch_status(&client, &live_url).await.unwrap(), Health::Live);

    network.start_consensus().await.unwrap();
    let states = network
        .wait_for_decision(Duration::from_secs(20), Duration::from_millis(50))
        .await
        .unwrap();

    for (node_id, state) in states.iter().enumerate() {
        if node_id == 2 {
            assert_eq!(state.x, None);
            assert_eq!(state.decided, None);
            assert_eq!(state.k, None);
        } else {
            assert_eq!(state.decided, Some(true));
            assert_eq!(state.x, Some(Value::Zero));
        }
    }
    assert_eq!(network.engine(0).unwrap().state().value, Some(Value::Zero));

    network.stop_consensus().await;
    network.shutdown().await;
}
