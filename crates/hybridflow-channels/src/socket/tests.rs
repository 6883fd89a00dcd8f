use super::engineio::*;
use super::*;
use futures_util::{SinkExt, StreamExt};
use serde_json::json;
use tokio::net::TcpListener;
use tokio_tungstenite::tungstenite::handshake::server::{Request, Response};
use tokio_tungstenite::tungstenite::Message as WsMessage;

#[test]
fn test_decode_open() {
    let p = Packet::decode(r#"0{"sid":"abc","upgrades":[],"pingInterval":25000,"pingTimeout":20000}"#)
        .unwrap();
    match p {
        Packet::Open(h) => {
            assert_eq!(h.sid, "abc");
            assert_eq!(h.ping_interval, 25000);
        }
        other => panic!("unexpected {other:?}"),
    }
}

#[test]
fn test_decode_heartbeat_and_errors() {
    assert_eq!(Packet::decode("2").unwrap(), Packet::Ping);
    assert_eq!(Packet::decode("3").unwrap(), Packet::Pong);
    assert_eq!(Packet::decode("").unwrap_err(), DecodeError::Empty);
    assert_eq!(
        Packet::decode("9").unwrap_err(),
        DecodeError::UnknownEngineType('9')
    );
    assert!(Packet::decode("42not-json").is_err());
}

#[test]
fn test_decode_event_root_namespace() {
    let p = Packet::decode(r#"42["messages.upsert",{"instance":"demo"}]"#).unwrap();
    assert_eq!(
        p,
        Packet::Message(SocketPacket::Event {
            namespace: "/".into(),
            ack_id: None,
            name: "messages.upsert".into(),
            data: json!({"instance": "demo"}),
        })
    );
}

#[test]
fn test_decode_event_with_namespace_and_ack() {
    let p = Packet::decode(r#"42/demo,7["message",{"key":{"id":"M1"}}]"#).unwrap();
    match p {
        Packet::Message(SocketPacket::Event {
            namespace,
            ack_id,
            name,
            data,
        }) => {
            assert_eq!(namespace, "/demo");
            assert_eq!(ack_id, Some(7));
            assert_eq!(name, "message");
            assert_eq!(data["key"]["id"], "M1");
        }
        other => panic!("unexpected {other:?}"),
    }
}

#[test]
fn test_decode_connect_variants() {
    assert_eq!(
        Packet::decode(r#"40{"sid":"x"}"#).unwrap(),
        Packet::Message(SocketPacket::Connect {
            namespace: "/".into(),
            data: json!({"sid": "x"}),
        })
    );
    assert_eq!(
        Packet::decode("40/demo,").unwrap(),
        Packet::Message(SocketPacket::Connect {
            namespace: "/demo".into(),
            data: Value::Null,
        })
    );
    assert!(matches!(
        Packet::decode(r#"44/demo,{"message":"Invalid namespace"}"#).unwrap(),
        Packet::Message(SocketPacket::ConnectError { .. })
    ));
}

#[test]
fn test_encode() {
    assert_eq!(encode_connect("/", None), "40");
    assert_eq!(encode_connect("/demo", None), "40/demo,");
    assert_eq!(
        encode_connect("/", Some(&json!({"token": "t"}))),
        r#"40{"token":"t"}"#
    );
    assert_eq!(encode_disconnect("/demo"), "41/demo,");
    assert_eq!(encode_ack("/", 3), "433[]");
    assert_eq!(encode_pong(), "3");
}

#[test]
fn test_websocket_url() {
    assert_eq!(
        websocket_url("https://evo.example.com/"),
        "wss://evo.example.com/socket.io/?EIO=4&transport=websocket"
    );
    assert_eq!(
        websocket_url("http://localhost:8080"),
        "ws://localhost:8080/socket.io/?EIO=4&transport=websocket"
    );
    assert_eq!(
        websocket_url("localhost:8080"),
        "ws://localhost:8080/socket.io/?EIO=4&transport=websocket"
    );
}

fn test_config(connect_timeout_secs: u64) -> SocketConfig {
    SocketConfig {
        enabled: true,
        connect_timeout_secs,
        reconnect_delay_secs: 1,
        reconnect_max_secs: 2,
        ..Default::default()
    }
}

/// A one-shot Socket.IO server: handshakes, pings once, emits one event,
/// then waits for the client to leave. Yields the `apikey` header it saw.
async fn spawn_server(
    namespace: &'static str,
    event: &'static str,
) -> (String, tokio::sync::oneshot::Receiver<Option<String>>) {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let url = format!("http://{}", listener.local_addr().unwrap());
    let (tx, rx) = tokio::sync::oneshot::channel();

    tokio::spawn(async move {
        let (tcp, _) = listener.accept().await.unwrap();
        let mut seen_key = None;
        let ws = tokio_tungstenite::accept_hdr_async(tcp, |req: &Request, resp: Response| {
            seen_key = req
                .headers()
                .get("apikey")
                .and_then(|v| v.to_str().ok())
                .map(str::to_string);
            Ok(resp)
        })
        .await
        .unwrap();
        let _ = tx.send(seen_key);

        let (mut sink, mut source) = ws.split();
        sink.send(WsMessage::Text(
            r#"0{"sid":"s1","upgrades":[],"pingInterval":25000,"pingTimeout":20000}"#.into(),
        ))
        .await
        .unwrap();

        let prefix = if namespace == "/" {
            String::new()
        } else {
            format!("{namespace},")
        };

        while let Some(Ok(msg)) = source.next().await {
            let WsMessage::Text(text) = msg else { continue };
            if text.starts_with("40") {
                sink.send(WsMessage::Text(format!(r#"40{prefix}{{"sid":"n1"}}"#)))
                    .await
                    .unwrap();
                sink.send(WsMessage::Text("2".into())).await.unwrap();
            } else if text == "3" {
                sink.send(WsMessage::Text(format!(
                    r#"42{prefix}["{event}",{{"instance":"demo","data":{{"key":{{"id":"M1"}}}}}}]"#
                )))
                .await
                .unwrap();
            } else if text.starts_with("41") {
                break;
            }
        }
    });

    (url, rx)
}

#[tokio::test]
async fn test_global_connection_forwards_events() {
    let (url, seen_key) = spawn_server("/", "messages.upsert").await;
    let (registry, mut events) = SocketRegistry::new(test_config(5));

    let status = registry.connect_global(&url, "evo-key").await.unwrap();
    assert!(status.connected);
    assert_eq!(status.name, GLOBAL_CONNECTION);
    assert_eq!(seen_key.await.unwrap().as_deref(), Some("evo-key"));

    let event = tokio::time::timeout(Duration::from_secs(5), events.recv())
        .await
        .unwrap()
        .unwrap();
    assert_eq!(event.connection, "global");
    assert_eq!(event.event, "messages.upsert");
    assert!(event.instance.is_none());
    assert_eq!(event.data["data"]["key"]["id"], "M1");

    // Reconnecting a live connection reuses it.
    let again = registry.connect_global(&url, "evo-key").await.unwrap();
    assert!(again.connected);
    assert_eq!(registry.status().await.len(), 1);

    assert!(registry.disconnect(GLOBAL_CONNECTION).await);
    assert!(registry.status().await.is_empty());
    assert!(!registry.disconnect(GLOBAL_CONNECTION).await);
}

#[tokio::test]
async fn test_instance_connection_uses_namespace() {
    let (url, _seen) = spawn_server("/demo", "message").await;
    let (registry, mut events) = SocketRegistry::new(test_config(5));

    let status = registry.connect_instance("demo", &url, "").await.unwrap();
    assert_eq!(status.namespace, "/demo");
    assert!(registry.is_connected("demo").await);

    let event = tokio::time::timeout(Duration::from_secs(5), events.recv())
        .await
        .unwrap()
        .unwrap();
    assert_eq!(event.instance.as_deref(), Some("demo"));
    assert_eq!(event.event, "message");

    assert_eq!(registry.disconnect_all().await, 1);
    assert!(!registry.is_connected("demo").await);
}

#[tokio::test]
async fn test_failed_first_connect_leaves_nothing_registered() {
    // Bind then drop to get a port with nothing listening.
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let url = format!("http://{}", listener.local_addr().unwrap());
    drop(listener);

    let (registry, _events) = SocketRegistry::new(test_config(2));
    let err = registry.connect_global(&url, "").await.unwrap_err();
    assert!(matches!(err, HybridflowError::Gateway(_)));
    assert!(registry.status().await.is_empty());
}

#[tokio::test]
async fn test_empty_server_url_is_config_error() {
    let (registry, _events) = SocketRegistry::new(test_config(2));
    let err = registry.connect_global("", "").await.unwrap_err();
    assert!(matches!(err, HybridflowError::Config(_)));
}
