//! ---
//! ipc_section: "04-testing-qa"
//! ipc_subsection: "integration-tests"
//! ipc_type: "source"
//! ipc_scope: "code"
//! ipc_description: "End-to-end pub/sub tests over the in-memory broker."
//! ipc_version: "v0.1.0"
//! ipc_owner: "tbd"
//! ---
use std::sync::Arc;
use std::time::Duration;

use tokio::sync::mpsc;
use tokio::time::timeout;

use potrero_ipc::Dispatcher;
use potrero_schema::{Direction, NodeId, Odometry, UserInput};
use potrero_transport::{Broker, InMemoryBroker};

const RECV_DEADLINE: Duration = Duration::from_secs(2);

fn dispatcher(name: &str, broker: &InMemoryBroker) -> Arc<Dispatcher> {
    Arc::new(Dispatcher::new(
        NodeId::new(name),
        Arc::new(broker.clone()),
    ))
}

#[tokio::test]
async fn every_subscriber_receives_its_own_copy() {
    let broker = InMemoryBroker::new();
    let publisher = dispatcher("publisher", &broker);
    let subscriber = dispatcher("subscriber", &broker);

    let (first_tx, mut first_rx) = mpsc::unbounded_channel();
    let (second_tx, mut second_rx) = mpsc::unbounded_channel();

    let _first = subscriber
        .subscribe(move |msg: UserInput| {
            let tx = first_tx.clone();
            async move {
                let _ = tx.send(msg);
            }
        })
        .await
        .expect("subscribe");
    let _second = subscriber
        .subscribe(move |msg: UserInput| {
            let tx = second_tx.clone();
            async move {
                let _ = tx.send(msg);
            }
        })
        .await
        .expect("subscribe");

    let sent = UserInput {
        direction: Direction::Forward,
    };
    publisher.publish(&sent).await.expect("publish");

    let first = timeout(RECV_DEADLINE, first_rx.recv())
        .await
        .expect("first handler delivery")
        .expect("channel open");
    let second = timeout(RECV_DEADLINE, second_rx.recv())
        .await
        .expect("second handler delivery")
        .expect("channel open");
    assert_eq!(first, sent);
    assert_eq!(second, sent);
}

#[tokio::test]
async fn malformed_payload_does_not_break_subsequent_delivery() {
    let broker = InMemoryBroker::new();
    let publisher = dispatcher("publisher", &broker);
    let subscriber = dispatcher("subscriber", &broker);

    let (tx, mut rx) = mpsc::unbounded_channel();
    let _sub = subscriber
        .subscribe(move |msg: Odometry| {
            let tx = tx.clone();
            async move {
                let _ = tx.send(msg);
            }
        })
        .await
        .expect("subscribe");

    // Raw garbage straight onto the topic, bypassing the typed layer.
    broker
        .publish("odometry", b"not json at all".to_vec())
        .await
        .expect("publish garbage");
    // Well-formed envelope whose payload violates field constraints.
    let out_of_range = serde_json::to_vec(&serde_json::json!({
        "sender": "rogue",
        "sent_at": "2026-08-25T12:00:00Z",
        "seq": 0,
        "payload": {"x_position": "east", "y_position": 0.0, "heading": 0.0},
    }))
    .expect("serialize");
    broker
        .publish("odometry", out_of_range)
        .await
        .expect("publish malformed");

    let valid = Odometry::new(1.0, 2.0, 0.0).expect("valid");
    publisher.publish(&valid).await.expect("publish");

    let received = timeout(RECV_DEADLINE, rx.recv())
        .await
        .expect("delivery after malformed payloads")
        .expect("channel open");
    assert_eq!(received, valid);
}

#[tokio::test]
async fn topics_do_not_cross_deliver() {
    let broker = InMemoryBroker::new();
    let publisher = dispatcher("publisher", &broker);
    let subscriber = dispatcher("subscriber", &broker);

    let (tx, mut rx) = mpsc::unbounded_channel();
    let _sub = subscriber
        .subscribe(move |msg: Odometry| {
            let tx = tx.clone();
            async move {
                let _ = tx.send(msg);
            }
        })
        .await
        .expect("subscribe");

    publisher
        .publish(&UserInput {
            direction: Direction::Left,
        })
        .await
        .expect("publish user input");
    let pose = Odometry::new(3.0, -4.0, 1.0).expect("valid");
    publisher.publish(&pose).await.expect("publish odometry");

    let received = timeout(RECV_DEADLINE, rx.recv())
        .await
        .expect("odometry delivery")
        .expect("channel open");
    assert_eq!(received, pose);
}
