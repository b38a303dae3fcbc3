//! Election over real loopback sockets

use bully_core::{udp, Group, Node, NodeConfig, Phase, Rank};
use std::net::{SocketAddr, UdpSocket};
use std::time::Duration;

const TIMEOUT: Duration = Duration::from_millis(300);
const POLL: Duration = Duration::from_millis(10);
const WAIT: Duration = Duration::from_secs(5);

/// Reserve distinct loopback ports by binding and releasing them
fn free_addrs(n: usize) -> Vec<SocketAddr> {
    let sockets: Vec<UdpSocket> = (0..n)
        .map(|_| UdpSocket::bind("127.0.0.1:0").unwrap())
        .collect();
    sockets.iter().map(|s| s.local_addr().unwrap()).collect()
}

async fn udp_group(size: usize, starter: Rank) -> Vec<Node> {
    let peers = free_addrs(size);
    let group = Group::new(size).unwrap();

    let mut nodes = Vec::new();
    for rank in group.ranks() {
        let transport = udp::bind(rank, peers.clone()).await.unwrap();
        let config = NodeConfig::new(rank, group)
            .with_timing(TIMEOUT, POLL)
            .with_starter(starter);
        nodes.push(Node::new(config, transport).unwrap());
    }
    nodes
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_three_node_cascade_over_udp() {
    let nodes = udp_group(3, 0).await;
    for node in &nodes {
        node.start().unwrap();
    }

    for node in &nodes {
        let leader = tokio::time::timeout(WAIT, node.await_leader())
            .await
            .expect("leader elected in time")
            .unwrap();
        assert_eq!(leader, 2, "node {}", node.rank());
    }

    for node in &nodes {
        let status = node.status();
        assert_eq!(status.phase, Phase::Idle);
        assert_eq!(status.elections, 1, "node {}", node.rank());
        assert_eq!(status.victories, u64::from(node.rank() == 2));
    }

    for node in &nodes {
        node.shutdown();
        tokio::time::timeout(WAIT, node.finish()).await.unwrap().unwrap();
    }
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_top_rank_offline_over_udp() {
    let mut nodes = udp_group(3, 0).await;
    // Rank 2's socket is released, so its datagrams go nowhere
    drop(nodes.pop());

    for node in &nodes {
        node.start().unwrap();
    }

    for node in &nodes {
        let leader = tokio::time::timeout(WAIT, node.await_leader())
            .await
            .expect("leader elected in time")
            .unwrap();
        assert_eq!(leader, 1, "node {}", node.rank());
    }
    assert_eq!(nodes[1].status().victories, 1);
}
