//! ---
//! ipc_section: "04-testing-qa"
//! ipc_subsection: "integration-tests"
//! ipc_type: "source"
//! ipc_scope: "code"
//! ipc_description: "End-to-end RPC correlation tests over the in-memory broker."
//! ipc_version: "v0.1.0"
//! ipc_owner: "tbd"
//! ---
use std::sync::Arc;
use std::time::{Duration, Instant};

use serde_json::json;

use potrero_codec::decode;
use potrero_ipc::{Dispatcher, IpcError, RpcClient, RpcServer};
use potrero_schema::{DebugRequest, NodeId, RpcReply, Schema};
use potrero_transport::{Broker, InMemoryBroker};

const CALL_DEADLINE: Duration = Duration::from_secs(2);

fn dispatcher(name: &str, broker: &InMemoryBroker) -> Arc<Dispatcher> {
    Arc::new(Dispatcher::new(
        NodeId::new(name),
        Arc::new(broker.clone()),
    ))
}

#[tokio::test]
async fn call_resolves_with_the_servers_reply() {
    let broker = InMemoryBroker::new();
    let server_side = dispatcher("responder", &broker);
    let client_side = dispatcher("caller", &broker);

    let _server = RpcServer::<DebugRequest>::serve(server_side, |request: DebugRequest| async move {
        Ok(json!({ "echo": request.content }))
    })
    .await
    .expect("serve");

    let client = RpcClient::<DebugRequest>::connect(client_side)
        .await
        .expect("connect");
    let reply = client
        .call(
            &DebugRequest {
                content: "ping".to_owned(),
            },
            CALL_DEADLINE,
        )
        .await
        .expect("call");

    assert!(!reply.is_err());
    assert_eq!(reply.value, json!({ "echo": "ping" }));
}

#[tokio::test]
async fn handler_errors_travel_back_as_error_replies() {
    let broker = InMemoryBroker::new();
    let server_side = dispatcher("responder", &broker);
    let client_side = dispatcher("caller", &broker);

    let _server = RpcServer::<DebugRequest>::serve(server_side, |_request: DebugRequest| async move {
        Err("procedure refused".to_owned())
    })
    .await
    .expect("serve");

    let client = RpcClient::<DebugRequest>::connect(client_side)
        .await
        .expect("connect");
    let reply = client
        .call(
            &DebugRequest {
                content: "ping".to_owned(),
            },
            CALL_DEADLINE,
        )
        .await
        .expect("call resolves despite procedure error");

    assert!(reply.is_err());
    assert_eq!(reply.error.as_deref(), Some("procedure refused"));
}

#[tokio::test]
async fn panicking_procedure_becomes_an_error_reply() {
    let broker = InMemoryBroker::new();
    let server_side = dispatcher("responder", &broker);
    let client_side = dispatcher("caller", &broker);

    let _server = RpcServer::<DebugRequest>::serve(server_side, |request: DebugRequest| async move {
        if request.content == "boom" {
            panic!("procedure blew up");
        }
        Ok(json!("fine"))
    })
    .await
    .expect("serve");

    let client = RpcClient::<DebugRequest>::connect(client_side)
        .await
        .expect("connect");
    let reply = client
        .call(
            &DebugRequest {
                content: "boom".to_owned(),
            },
            CALL_DEADLINE,
        )
        .await
        .expect("call resolves despite panic");
    assert!(reply.is_err());

    // The server survives and keeps answering.
    let reply = client
        .call(
            &DebugRequest {
                content: "ok".to_owned(),
            },
            CALL_DEADLINE,
        )
        .await
        .expect("second call");
    assert_eq!(reply.value, json!("fine"));
}

#[tokio::test]
async fn unanswered_call_times_out_after_the_deadline() {
    let broker = InMemoryBroker::new();
    let client_side = dispatcher("caller", &broker);

    // No server anywhere.
    let client = RpcClient::<DebugRequest>::connect(client_side)
        .await
        .expect("connect");

    let deadline = Duration::from_millis(50);
    let started = Instant::now();
    let result = client
        .call(
            &DebugRequest {
                content: "anyone?".to_owned(),
            },
            deadline,
        )
        .await;
    let waited = started.elapsed();

    match result {
        Err(IpcError::RpcTimeout { request, .. }) => {
            assert_eq!(request, DebugRequest::TOPIC.as_str());
        }
        other => panic!("expected timeout, got {:?}", other),
    }
    assert!(waited >= deadline, "resolved before the deadline: {waited:?}");
    assert!(waited < CALL_DEADLINE, "timeout overshot wildly: {waited:?}");
}

#[tokio::test]
async fn late_reply_after_timeout_is_discarded() {
    let broker = InMemoryBroker::new();
    let responder = dispatcher("responder", &broker);
    let client_side = dispatcher("caller", &broker);

    // Capture the raw request so we can answer it after the caller gave up.
    let mut requests = broker
        .subscribe(DebugRequest::TOPIC.as_str())
        .await
        .expect("subscribe");

    let client = RpcClient::<DebugRequest>::connect(client_side)
        .await
        .expect("connect");
    let result = client
        .call(
            &DebugRequest {
                content: "slow".to_owned(),
            },
            Duration::from_millis(50),
        )
        .await;
    assert!(matches!(result, Err(IpcError::RpcTimeout { .. })));

    let bytes = tokio::time::timeout(CALL_DEADLINE, requests.recv())
        .await
        .expect("request observed")
        .expect("subscription open");
    let (meta, _request) = decode::<DebugRequest>(&bytes).expect("decode request");
    let correlation = meta.correlation.expect("rpc request carries correlation");

    // Answering now targets an abandoned call; the reply must vanish
    // without disturbing the client.
    responder
        .respond::<DebugRequest>(correlation, &RpcReply::ok(json!("too late")))
        .await
        .expect("respond");

    // The client still works: a live server answers the next call.
    let _server = RpcServer::<DebugRequest>::serve(responder, |request: DebugRequest| async move {
        Ok(json!({ "echo": request.content }))
    })
    .await
    .expect("serve");
    let reply = client
        .call(
            &DebugRequest {
                content: "again".to_owned(),
            },
            CALL_DEADLINE,
        )
        .await
        .expect("second call");
    assert_eq!(reply.value, json!({ "echo": "again" }));
}
