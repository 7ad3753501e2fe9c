//! Live transaction channel driving a component end to end
//!
//! Run with: cargo test --test live_updates

use std::time::Duration;

use futures_util::{SinkExt, StreamExt};
use serde_json::{json, Value};
use tokio::net::TcpListener;
use tokio_tungstenite::accept_async;
use tokio_tungstenite::tungstenite::protocol::Message as WsMessage;

use gridsync_app::{
    ChannelHost, ConnectionState, GridComponent, HostProps, InMemoryGrid, LiveEvent, Message,
    Settings, SharedFrame,
};
use gridsync_core::BehaviorRegistry;

fn props(url: &str) -> HostProps {
    serde_json::from_value(json!({
        "row_data": r#"[{"id":"a","px":1.0},{"id":"b","px":2.0}]"#,
        "gridOptions": { "columnDefs": [{ "field": "id" }, { "field": "px" }] },
        "row_id_col": "id",
        "websocket_connection_string": url
    }))
    .unwrap()
}

fn component(url: &str) -> (GridComponent<InMemoryGrid>, SharedFrame) {
    let (host, _payloads) = ChannelHost::channel(16);
    let frame = SharedFrame::new();
    let mut component = GridComponent::new(
        props(url),
        Settings::default(),
        InMemoryGrid::new(),
        Box::new(host),
        Box::new(frame.clone()),
        BehaviorRegistry::with_builtins(),
    )
    .unwrap();
    component.on_grid_ready();
    (component, frame)
}

/// Process messages until `done` holds, failing after a few seconds
async fn pump_until(
    component: &mut GridComponent<InMemoryGrid>,
    mut done: impl FnMut(&Message) -> bool,
) {
    let deadline = tokio::time::timeout(Duration::from_secs(5), async {
        while let Some(msg) = component.msg_rx.recv().await {
            let stop = done(&msg);
            component.process_message(msg).unwrap();
            if stop {
                return;
            }
        }
    });
    deadline.await.expect("timed out waiting for the live channel");
}

#[tokio::test]
async fn test_live_patches_reach_the_view() {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();

    tokio::spawn(async move {
        let (stream, _) = listener.accept().await.unwrap();
        let mut ws = accept_async(stream).await.unwrap();
        ws.send(WsMessage::Text(r#"{"update":[{"id":"b","px":NaN}]}"#.into()))
            .await
            .unwrap();
        ws.send(WsMessage::Text("{broken".into())).await.unwrap();
        ws.send(WsMessage::Text(
            r#"{"update":[{"id":"a","px":1.5}],"add":[{"id":"c","px":9.0}]}"#.into(),
        ))
        .await
        .unwrap();
        while let Some(Ok(_)) = ws.next().await {}
    });

    let (mut component, frame) = component(&format!("ws://{addr}"));
    assert!(component.live_channel().is_some());

    let mut transactions = 0;
    pump_until(&mut component, |msg| {
        if matches!(msg, Message::Live(LiveEvent::Transaction(_))) {
            transactions += 1;
        }
        transactions == 2
    })
    .await;

    let view = component.view();
    assert_eq!(view.row("b").unwrap()["px"], Value::Null);
    assert_eq!(view.row("a").unwrap()["px"], json!(1.5));
    assert_eq!(view.row("c").unwrap()["px"], json!(9.0));
    assert_eq!(view.row_count(), 3);
    assert!(frame.snapshot().refresh_indicator.is_some());

    component.process_message(Message::Quit).unwrap();
    assert!(component.live_channel().is_none());
}

#[tokio::test]
async fn test_live_state_changes_are_reported() {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();

    tokio::spawn(async move {
        let (stream, _) = listener.accept().await.unwrap();
        let mut ws = accept_async(stream).await.unwrap();
        while let Some(Ok(_)) = ws.next().await {}
    });

    let (mut component, _frame) = component(&format!("ws://{addr}"));
    pump_until(&mut component, |msg| {
        matches!(
            msg,
            Message::Live(LiveEvent::StateChanged(ConnectionState::Connected))
        )
    })
    .await;

    assert!(component.live_channel().unwrap().is_connected());
}

#[tokio::test]
async fn test_invalid_live_url_leaves_component_usable() {
    let (mut component, _frame) = component("http://127.0.0.1:1");
    assert!(component.live_channel().is_none());

    component.process_message(Message::ManualUpdate).unwrap();
    assert_eq!(component.payload().row_data.len(), 2);
}
