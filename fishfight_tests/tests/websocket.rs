//! Real-time channel tests over an actual WebSocket connection.

use std::time::Duration;

use axum::http::StatusCode;
use fishfight_shared::net::{decode, ServerMsg};
use fishfight_tests::{fish_payload, init_tracing, post_json, test_config, TestServer};
use futures::StreamExt;
use tokio::net::TcpStream;
use tokio_tungstenite::{connect_async, tungstenite::Message, MaybeTlsStream, WebSocketStream};
use tower::ServiceExt;

type Client = WebSocketStream<MaybeTlsStream<TcpStream>>;

const WAIT: Duration = Duration::from_secs(3);

async fn connect(srv: &TestServer) -> anyhow::Result<Client> {
    let addr = srv.serve().await?;
    let (ws, _) = connect_async(format!("ws://{addr}/ws")).await?;
    Ok(ws)
}

/// Reads text frames until one decodes to a message matching `pred`.
async fn next_msg(ws: &mut Client, pred: impl Fn(&ServerMsg) -> bool) -> anyhow::Result<ServerMsg> {
    tokio::time::timeout(WAIT, async {
        loop {
            match ws.next().await {
                Some(Ok(Message::Text(text))) => {
                    let msg = decode(text.as_str())?;
                    if pred(&msg) {
                        return Ok::<_, anyhow::Error>(msg);
                    }
                }
                Some(Ok(_)) => {}
                Some(Err(e)) => return Err(e.into()),
                None => anyhow::bail!("socket closed by server"),
            }
        }
    })
    .await?
}

/// Polls the console until `Clients: <expected>` shows up.
async fn wait_for_clients(srv: &TestServer, expected: usize) -> anyhow::Result<()> {
    let want = format!("Clients: {expected}");
    tokio::time::timeout(WAIT, async {
        loop {
            let status = srv.handle.console("status").await?;
            if status.contains(&want) {
                return Ok::<_, anyhow::Error>(());
            }
            tokio::time::sleep(Duration::from_millis(20)).await;
        }
    })
    .await?
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn socket_gets_snapshot_then_relayed_events() -> anyhow::Result<()> {
    init_tracing();
    let srv = TestServer::start(test_config());
    let mut ws = connect(&srv).await?;

    match next_msg(&mut ws, |_| true).await? {
        ServerMsg::State(snap) => assert!(snap.actors.is_empty()),
        other => panic!("first frame should be state, got {other:?}"),
    }

    let resp = srv
        .router
        .clone()
        .oneshot(post_json("/api/drawings", &fish_payload(Some("koi"))))
        .await?;
    assert_eq!(resp.status(), StatusCode::OK);

    let msg = next_msg(&mut ws, |m| matches!(m, ServerMsg::NewDrawing(_))).await?;
    let ServerMsg::NewDrawing(drawing) = msg else {
        unreachable!()
    };
    assert_eq!(drawing.id, "koi");

    next_msg(&mut ws, |m| match m {
        ServerMsg::State(s) => s.actors.iter().any(|a| a.id == "koi"),
        _ => false,
    })
    .await?;

    ws.close(None).await?;
    srv.shutdown().await
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn departed_sockets_are_dropped_from_fan_out() -> anyhow::Result<()> {
    let srv = TestServer::start(test_config());
    let mut polite = connect(&srv).await?;
    let mut abrupt = connect(&srv).await?;
    next_msg(&mut polite, |_| true).await?;
    next_msg(&mut abrupt, |_| true).await?;
    wait_for_clients(&srv, 2).await?;

    polite.close(None).await?;
    wait_for_clients(&srv, 1).await?;

    // No close handshake: the server notices the dead transport on its own.
    drop(abrupt);
    wait_for_clients(&srv, 0).await?;

    // The simulation keeps going without clients.
    let status = srv.handle.console("status").await?;
    assert!(status.iter().any(|l| l.starts_with("Tick: ")));
    srv.shutdown().await
}
