use beacon_config::BeaconSettings;
use beacon_dkg::{
    BeaconState, EntropyError, EntropyGenerator, Error, GateError, LocalBeaconNode, RpcOp,
};
use beacon_networking::{ConnectionManager, LocalNetwork, MemberAddress};
use std::collections::BTreeSet;
use std::sync::Arc;
use std::time::Duration;
use tokio_util::sync::CancellationToken;

const CABINET: [&str; 3] = ["A", "B", "C"];

fn cabinet_on(network: &LocalNetwork, threshold: usize) -> Vec<Arc<LocalBeaconNode>> {
    beacon_logging::setup_log();
    CABINET
        .iter()
        .map(|me| {
            let settings = BeaconSettings::new(*me, CABINET, threshold, "A");
            Arc::new(LocalBeaconNode::join(network, settings).unwrap())
        })
        .collect()
}

fn tick_all(nodes: &[Arc<LocalBeaconNode>]) {
    for node in nodes {
        node.service.tick();
    }
}

#[tokio::test]
async fn test_three_members_agree_on_genesis_entropy() {
    let network = LocalNetwork::new();
    let nodes = cabinet_on(&network, 2);

    for _ in 0..20 {
        tick_all(&nodes);
        if nodes.iter().all(|n| n.service.next_round_to_produce() >= 1) {
            break;
        }
    }

    let dealer_key = nodes[0].service.shared_public_key();
    assert!(dealer_key.is_some());
    for node in &nodes {
        assert!(node.service.has_secret_share());
        assert_eq!(node.service.shared_public_key(), dealer_key);
    }
    assert_eq!(network.request_count(&MemberAddress::new("A"), RpcOp::RequestSecret.into()), 2);

    let entropy: Vec<_> = nodes
        .iter()
        .map(|n| n.service.generate_entropy(b"block 0", 0).unwrap())
        .collect();
    assert_eq!(entropy[0], entropy[1]);
    assert_eq!(entropy[1], entropy[2]);
}

#[tokio::test]
async fn test_non_dealers_that_start_first_retry_until_keys_exist() {
    let network = LocalNetwork::new();
    let nodes = cabinet_on(&network, 2);

    // B and C ask before the dealer has built anything
    for _ in 0..3 {
        nodes[1].service.tick();
        nodes[2].service.tick();
    }
    assert_eq!(nodes[1].service.state(), BeaconState::RequestSecretKey);
    assert!(!nodes[1].service.has_secret_share());

    for _ in 0..20 {
        nodes[2].service.tick();
        nodes[1].service.tick();
        nodes[0].service.tick();
    }
    assert!(nodes.iter().all(|n| n.service.has_secret_share()));
    assert!(nodes.iter().all(|n| n.service.next_round_to_produce() >= 1));
}

#[tokio::test]
async fn test_chain_is_identical_across_members_with_threshold_three() {
    let network = LocalNetwork::new();
    let nodes = cabinet_on(&network, 3);

    let mut chains = vec![Vec::new(); nodes.len()];
    for round in 0..8 {
        for _ in 0..30 {
            tick_all(&nodes);
        }
        for (node, chain) in nodes.iter().zip(chains.iter_mut()) {
            chain.push(node.service.generate_entropy(&[], round).unwrap());
        }
    }

    assert_eq!(chains[0], chains[1]);
    assert_eq!(chains[1], chains[2]);
    let distinct: BTreeSet<_> = chains[0].iter().collect();
    assert_eq!(distinct.len(), 8);
}

#[tokio::test]
async fn test_production_stalls_without_consumption() {
    let network = LocalNetwork::new();
    let nodes = cabinet_on(&network, 2);

    for _ in 0..100 {
        tick_all(&nodes);
    }
    for node in &nodes {
        assert_eq!(node.service.next_round_to_produce(), 3);
        assert_eq!(node.service.state(), BeaconState::Complete);
        assert_eq!(
            node.service.generate_entropy(&[], 1),
            Err(EntropyError::NotReady)
        );
    }
}

#[tokio::test(start_paused = true)]
async fn test_running_nodes_produce_a_consumable_chain() {
    let network = LocalNetwork::new();
    let nodes = cabinet_on(&network, 2);
    let shutdown = CancellationToken::new();

    let handles: Vec<_> = nodes
        .iter()
        .map(|node| {
            let node = Arc::clone(node);
            let shutdown = shutdown.clone();
            tokio::spawn(async move { node.run(Duration::from_secs(30), shutdown).await })
        })
        .collect();

    for round in 0..6 {
        let mut values = Vec::new();
        for node in &nodes {
            let value = loop {
                match node.service.generate_entropy(&[], round) {
                    Ok(value) => break value,
                    Err(EntropyError::NotReady) => tokio::time::sleep(Duration::from_millis(50)).await,
                    Err(e) => panic!("unexpected {e}"),
                }
            };
            values.push(value);
        }
        assert!(values.windows(2).all(|w| w[0] == w[1]));
    }

    shutdown.cancel();
    for handle in handles {
        handle.await.unwrap().unwrap();
    }
    assert!(nodes.iter().all(|n| n.gate.ready()));
}

#[tokio::test(start_paused = true)]
async fn test_missing_member_fails_connect() {
    beacon_logging::setup_log();
    let network = LocalNetwork::new();
    let mut settings = BeaconSettings::new("A", CABINET, 2, "A");
    settings.connect_max_polls = 10;
    let node = LocalBeaconNode::join(&network, settings).unwrap();

    let result = node
        .run(Duration::from_secs(1), CancellationToken::new())
        .await;
    assert!(matches!(
        result,
        Err(Error::Gate(GateError::ConnectTimeout {
            connected: 0,
            expected: 2
        }))
    ));
}

#[tokio::test(start_paused = true)]
async fn test_silent_member_times_out_readiness() {
    beacon_logging::setup_log();
    let network = LocalNetwork::new();
    let members = ["A", "B"];
    let node = LocalBeaconNode::join(&network, BeaconSettings::new("A", members, 2, "A")).unwrap();

    // B is connected but never announces
    let silent = network.join("B");
    silent.connect(&BTreeSet::from([MemberAddress::new("A")]));

    let timeout = Duration::from_secs(2);
    let result = node.run(timeout, CancellationToken::new()).await;
    assert!(matches!(result, Err(Error::ReadinessTimeout(t)) if t == timeout));
    assert_eq!(node.service.state(), BeaconState::BuildAeonKeys);
}
