//! Multi-node election scenarios over the in-memory network

use bully_core::{Group, MemoryNetwork, Node, NodeConfig, Phase, Rank, Source, Tag};
use std::collections::BTreeSet;
use std::time::Duration;

const TIMEOUT: Duration = Duration::from_millis(300);
const POLL: Duration = Duration::from_millis(10);
const WAIT: Duration = Duration::from_secs(5);

fn config(rank: Rank, group: Group, starter: Rank) -> NodeConfig {
    NodeConfig::new(rank, group)
        .with_timing(TIMEOUT, POLL)
        .with_starter(starter)
}

/// Build one node per rank that is not `absent`; absent ranks are marked down
fn cluster(size: usize, starter: Rank, absent: &[Rank]) -> (MemoryNetwork, Vec<Option<Node>>) {
    let group = Group::new(size).unwrap();
    let network = MemoryNetwork::new(group);

    let nodes = group
        .ranks()
        .map(|rank| {
            if absent.contains(&rank) {
                network.set_down(rank, true);
                None
            } else {
                let transport = network.transport(rank).unwrap();
                Some(Node::new(config(rank, group, starter), transport).unwrap())
            }
        })
        .collect();

    (network, nodes)
}

async fn leader_of(node: &Node) -> Rank {
    tokio::time::timeout(WAIT, node.await_leader())
        .await
        .expect("leader elected in time")
        .unwrap()
}

fn sorted(mut pairs: Vec<(Rank, Rank)>) -> Vec<(Rank, Rank)> {
    pairs.sort();
    pairs
}

fn result_senders(network: &MemoryNetwork) -> BTreeSet<Rank> {
    network
        .sent_with_tag(Tag::Result)
        .into_iter()
        .map(|(from, _)| from)
        .collect()
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_three_node_cascade() {
    let (network, nodes) = cluster(3, 0, &[]);
    let nodes: Vec<Node> = nodes.into_iter().flatten().collect();
    for node in &nodes {
        node.start().unwrap();
    }

    for node in &nodes {
        assert_eq!(leader_of(node).await, 2, "node {}", node.rank());
    }

    // 0 solicits 1 and 2; 1 joins and solicits 2
    assert_eq!(
        sorted(network.sent_with_tag(Tag::Election)),
        vec![(0, 1), (0, 2), (1, 2)]
    );
    assert_eq!(
        sorted(network.sent_with_tag(Tag::Ok)),
        vec![(1, 0), (2, 0), (2, 1)]
    );
    assert_eq!(sorted(network.sent_with_tag(Tag::Result)), vec![(2, 0), (2, 1)]);

    for node in &nodes {
        let status = node.status();
        assert_eq!(status.phase, Phase::Idle);
        assert_eq!(status.elections, 1, "node {}", node.rank());
        assert_eq!(status.victories, u64::from(node.rank() == 2));
        assert!(!node.is_electing());
    }

    for node in &nodes {
        node.shutdown();
        tokio::time::timeout(WAIT, node.finish()).await.unwrap().unwrap();
    }
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_highest_live_process_wins() {
    let (network, nodes) = cluster(5, 0, &[4]);
    for node in nodes.iter().flatten() {
        node.start().unwrap();
    }

    for node in nodes.iter().flatten() {
        assert_eq!(leader_of(node).await, 3, "node {}", node.rank());
    }

    assert_eq!(result_senders(&network), BTreeSet::from([3]));
    let victories: u64 = nodes.iter().flatten().map(|n| n.status().victories).sum();
    assert_eq!(victories, 1);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_highest_starter_wins_alone() {
    let (network, nodes) = cluster(3, 2, &[]);
    for node in nodes.iter().flatten() {
        node.start().unwrap();
    }

    let top = nodes[2].as_ref().unwrap();
    assert_eq!(leader_of(top).await, 2);
    assert!(network.sent_with_tag(Tag::Election).is_empty());

    // Lower ranks never joined an election; the RESULT waits unread
    for node in nodes[..2].iter().flatten() {
        let status = node.status();
        assert_eq!(status.elections, 0);
        assert_eq!(status.leader, None);
        assert_eq!(node.transport().mailbox().pending(Tag::Result), 1);
    }
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_duplicate_solicitations_start_one_election() {
    let group = Group::new(3).unwrap();
    let network = MemoryNetwork::new(group);
    let t0 = network.transport(0).unwrap();
    let t1 = network.transport(1).unwrap();

    let node = Node::new(config(2, group, 0), network.transport(2).unwrap()).unwrap();
    node.start().unwrap();

    t0.send(2, Tag::Election).unwrap();
    t1.send(2, Tag::Election).unwrap();

    assert_eq!(leader_of(&node).await, 2);
    assert_eq!(node.status().elections, 1);
    assert_eq!(node.status().victories, 1);

    // Both solicitors are acknowledged and informed
    for t in [&t0, &t1] {
        assert!(t.probe(Tag::Ok, Source::Rank(2)));
        assert!(t.probe(Tag::Result, Source::Rank(2)));
    }
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_late_bully_takes_over() {
    let group = Group::new(3).unwrap();
    let network = MemoryNetwork::new(group);
    let late = Duration::from_millis(800);

    let nodes: Vec<Node> = group
        .ranks()
        .map(|rank| {
            let config = config(rank, group, 0).with_start_delay(2, late);
            Node::new(config, network.transport(rank).unwrap()).unwrap()
        })
        .collect();
    for node in &nodes {
        node.start().unwrap();
    }

    // Rank 2 is not listening yet, so rank 1 times out and wins first
    assert_eq!(leader_of(&nodes[1]).await, 1);
    assert_eq!(leader_of(&nodes[0]).await, 1);

    // Once started, rank 2 answers the queued solicitations and bullies in
    assert_eq!(leader_of(&nodes[2]).await, 2);
    assert_eq!(nodes[2].status().elections, 1);
    assert_eq!(result_senders(&network), BTreeSet::from([1, 2]));
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_re_election_after_idle() {
    let (network, nodes) = cluster(2, 0, &[]);
    let nodes: Vec<Node> = nodes.into_iter().flatten().collect();
    for node in &nodes {
        node.start().unwrap();
    }
    for node in &nodes {
        assert_eq!(leader_of(node).await, 1);
    }

    // A second attempt by rank 0 cascades the same way
    let mut watch = nodes[0].subscribe();
    assert!(nodes[0].trigger_election().unwrap());
    tokio::time::timeout(WAIT, watch.wait_for(|s| s.elections == 2 && s.phase == Phase::Idle))
        .await
        .unwrap()
        .unwrap();

    assert_eq!(nodes[0].status().leader, Some(1));
    assert_eq!(nodes[1].status().victories, 2);
    assert_eq!(network.sent_with_tag(Tag::Result), vec![(1, 0), (1, 0)]);
}
