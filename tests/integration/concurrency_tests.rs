//! Concurrent ID issuance and many in-flight requests on one client.

use std::collections::HashSet;
use std::sync::Arc;

use duplex_rpc::rpc::envelope::next_id;
use serde_json::json;
use tokio::sync::mpsc;

use super::support::{wire, WAIT};

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn concurrently_issued_ids_are_distinct() {
    let tasks: Vec<_> = (0..10)
        .map(|_| tokio::spawn(async { (0..1_000).map(|_| next_id()).collect::<Vec<_>>() }))
        .collect();

    let mut seen = HashSet::new();
    for task in tasks {
        for id in task.await.unwrap() {
            assert!(seen.insert(id), "id {id} issued twice");
        }
    }
    assert_eq!(seen.len(), 10_000);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn many_in_flight_requests_each_get_their_own_reply() {
    const CALLS: u64 = 50;

    let (builder, mut peer) = wire();
    let client = Arc::new(builder.start().unwrap());

    let callers: Vec<_> = (0..CALLS)
        .map(|n| {
            let client = Arc::clone(&client);
            tokio::spawn(async move {
                let reply = client.request("echo", Some(json!({"n": n}))).await.unwrap();
                (n, reply.result)
            })
        })
        .collect();

    let mut requests = Vec::new();
    for _ in 0..CALLS {
        requests.push(peer.next_message().await);
    }
    // Answer in reverse arrival order.
    for request in requests.iter().rev() {
        peer.send(&json!({"jsonrpc": "2.0", "id": request["id"], "result": request["params"]["n"]}))
            .await;
    }

    for caller in callers {
        let (n, result) = tokio::time::timeout(WAIT, caller).await.unwrap().unwrap();
        assert_eq!(result, Some(json!(n)));
    }
    assert_eq!(client.pending_requests(), 0);
}

#[tokio::test]
async fn reply_for_someone_else_reaches_handler_before_own_reply() {
    let (builder, mut peer) = wire();
    let (tx, mut rx) = mpsc::unbounded_channel();
    let client = builder
        .handler_fn(move |msg| {
            tx.send(msg).ok();
            Ok(())
        })
        .start()
        .unwrap();

    let serve = async {
        let request = peer.next_message().await;
        let own = request["id"].as_i64().unwrap();
        let stranger = own + 1_000_000;
        peer.send(&json!({"jsonrpc": "2.0", "id": stranger, "result": "not yours"}))
            .await;
        peer.send(&json!({"jsonrpc": "2.0", "id": own, "result": "yours"}))
            .await;
        stranger
    };
    let (reply, stranger) = tokio::join!(client.request("mine", None), serve);

    assert_eq!(reply.unwrap().result, Some(json!("yours")));
    let other = rx.try_recv().expect("stranger reply dispatched first");
    assert_eq!(other.id, Some(stranger));
    assert_eq!(other.result, Some(json!("not yours")));
}
