use super::{addr, cabinet, network_with, EchoEndpoint, FailingEndpoint, Recorder};
use crate::{ConnectionManager, PromiseState, ReliableBroadcast, RpcTransport};
use std::sync::Arc;
use std::time::Duration;

const TIMEOUT: Duration = Duration::from_secs(1);

#[tokio::test]
async fn test_rpc_is_delivered_inline() {
    let (network, nodes) = network_with(&["a", "b"]);
    let endpoint = Arc::new(EchoEndpoint);
    network.expose(&addr("b"), &endpoint);

    let mut pending = nodes[0].call_specific_address(&addr("b"), 9, b"hi".to_vec(), TIMEOUT);
    assert_eq!(pending.poll(), PromiseState::Success(vec![9, b'h', b'i']));
    assert_eq!(network.request_count(&addr("b"), 9), 1);
}

#[tokio::test]
async fn test_rpc_to_unknown_or_offline_peer_fails() {
    let (network, nodes) = network_with(&["a", "b"]);
    let mut pending = nodes[0].call_specific_address(&addr("b"), 1, vec![], TIMEOUT);
    assert!(matches!(pending.poll(), PromiseState::Failed(_)));

    let endpoint = Arc::new(EchoEndpoint);
    network.expose(&addr("b"), &endpoint);
    network.disconnect(&addr("b"));
    let mut pending = nodes[0].call_specific_address(&addr("b"), 1, vec![], TIMEOUT);
    assert!(matches!(pending.poll(), PromiseState::Failed(_)));

    network.reconnect(&addr("b"));
    let mut pending = nodes[0].call_specific_address(&addr("b"), 1, vec![], TIMEOUT);
    assert!(matches!(pending.poll(), PromiseState::Success(_)));
}

#[tokio::test]
async fn test_endpoint_error_fails_promise() {
    let (network, nodes) = network_with(&["a", "b"]);
    let endpoint = Arc::new(FailingEndpoint);
    network.expose(&addr("b"), &endpoint);

    let mut pending = nodes[0].call_specific_address(&addr("b"), 1, vec![], TIMEOUT);
    match pending.poll() {
        PromiseState::Failed(reason) => assert!(reason.contains("rejected")),
        other => panic!("unexpected state {other:?}"),
    }
}

#[tokio::test]
async fn test_dropped_endpoint_is_unreachable() {
    let (network, nodes) = network_with(&["a", "b"]);
    let endpoint = Arc::new(EchoEndpoint);
    network.expose(&addr("b"), &endpoint);
    drop(endpoint);

    let mut pending = nodes[0].call_specific_address(&addr("b"), 1, vec![], TIMEOUT);
    assert!(matches!(pending.poll(), PromiseState::Failed(_)));
}

#[tokio::test(start_paused = true)]
async fn test_unresponsive_peer_times_out() {
    let (network, nodes) = network_with(&["a", "b"]);
    let endpoint = Arc::new(EchoEndpoint);
    network.expose(&addr("b"), &endpoint);
    network.set_unresponsive(&addr("b"), true);

    let mut pending = nodes[0].call_specific_address(&addr("b"), 1, vec![], TIMEOUT);
    assert!(pending.poll().is_waiting());
    tokio::time::advance(TIMEOUT).await;
    assert_eq!(pending.poll(), PromiseState::TimedOut);

    network.set_unresponsive(&addr("b"), false);
    let mut pending = nodes[0].call_specific_address(&addr("b"), 1, vec![], TIMEOUT);
    assert!(matches!(pending.poll(), PromiseState::Success(_)));
    assert_eq!(network.request_count(&addr("b"), 1), 2);
}

#[tokio::test]
async fn test_broadcast_is_scoped_to_cabinet() {
    let (network, nodes) = network_with(&["a", "b", "c", "d"]);
    let recorders: Vec<Arc<Recorder>> = (0..4).map(|_| Arc::new(Recorder::default())).collect();
    for (node, recorder) in nodes.iter().zip(&recorders) {
        network.subscribe(node.address(), recorder);
    }

    // No cabinet configured yet
    assert!(nodes[0].broadcast(b"x".to_vec()).is_err());

    nodes[0].reset_cabinet(cabinet(&["a", "b", "c"]));
    nodes[0].broadcast(b"hello".to_vec()).unwrap();

    assert!(recorders[0].received.lock().is_empty());
    assert_eq!(
        *recorders[1].received.lock(),
        vec![(addr("a"), b"hello".to_vec())]
    );
    assert_eq!(recorders[2].received.lock().len(), 1);
    assert!(recorders[3].received.lock().is_empty());
}

#[tokio::test]
async fn test_direct_connections_track_dials_and_liveness() {
    let (network, nodes) = network_with(&["a", "b", "c"]);
    assert!(nodes[0].direct_connections().is_empty());

    nodes[0].connect(&cabinet(&["a", "b", "c"]));
    assert_eq!(nodes[0].direct_connections(), cabinet(&["b", "c"]));
    // Connections are symmetric
    assert_eq!(nodes[1].direct_connections(), cabinet(&["a"]));

    network.disconnect(&addr("c"));
    assert_eq!(nodes[0].direct_connections(), cabinet(&["b"]));
    assert!(nodes[2].direct_connections().is_empty());
}
