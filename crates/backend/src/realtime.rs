//! Push channel over the backend's change feed.
//!
//! `subscribe_table` opens a streaming event-source connection scoped to one
//! table and spawns a reader task that turns wire frames into [`RowEvent`]s.
//! Events arrive in the order the backend sends them; nothing stronger is
//! guaranteed. The returned [`RealtimeChannel`] must be closed (or dropped)
//! by whoever owns the subscription's scope.

use futures::StreamExt;
use log::{debug, warn};
use serde::Deserialize;
use tokio::sync::mpsc;

use mizan_core::notifications::{Notification, RealtimeChannel, RowEvent};

use crate::client::BackendClient;
use crate::error::{BackendError, Result};

/// One decoded change-feed message.
#[derive(Debug, Deserialize)]
struct ChangeMessage {
    #[serde(rename = "type")]
    kind: String,
    #[serde(default)]
    record: Option<Notification>,
    #[serde(default)]
    old_record: Option<DeletedRecord>,
}

#[derive(Debug, Deserialize)]
struct DeletedRecord {
    id: String,
}

/// Append a raw chunk to the frame buffer with line endings normalized to
/// `\n`. Event-source streams may terminate lines with `\r\n` or bare `\r`;
/// a chunk can also end mid-pair, so a dangling `\r` is carried into the
/// next chunk instead of being normalized early, which would forge a frame
/// boundary.
fn push_normalized(buffer: &mut String, carry_cr: &mut bool, chunk: &str) {
    let mut raw = String::new();
    if *carry_cr {
        raw.push('\r');
        *carry_cr = false;
    }
    raw.push_str(chunk);
    if raw.ends_with('\r') {
        raw.pop();
        *carry_cr = true;
    }
    buffer.push_str(&raw.replace("\r\n", "\n").replace('\r', "\n"));
}

/// Parse one event-source frame (the lines between blank-line separators).
fn parse_frame(frame: &str) -> Option<RowEvent> {
    let data: String = frame
        .lines()
        .filter_map(|line| line.strip_prefix("data:"))
        .map(|value| value.trim_start())
        .collect::<Vec<_>>()
        .join("\n");
    if data.is_empty() {
        return None; // comment/keep-alive frame
    }

    let message: ChangeMessage = match serde_json::from_str(&data) {
        Ok(value) => value,
        Err(err) => {
            warn!("discarding malformed change-feed frame: {}", err);
            return None;
        }
    };

    match message.kind.as_str() {
        "INSERT" => message.record.map(RowEvent::Inserted),
        "UPDATE" => message.record.map(RowEvent::Updated),
        "DELETE" => message
            .old_record
            .map(|old| RowEvent::Deleted { id: old.id }),
        other => {
            warn!("unknown change-feed event kind: {}", other);
            None
        }
    }
}

impl BackendClient {
    /// Open the change feed for `table` and return a live channel.
    ///
    /// GET /realtime/v1/changes?table={table}
    pub async fn subscribe_table(&self, table: &str) -> Result<RealtimeChannel> {
        let url = format!("{}/realtime/v1/changes", self.base_url());
        let response = self
            .http()
            .get(&url)
            .headers(self.headers()?)
            .header("Accept", "text/event-stream")
            .query(&[("table", table)])
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await?;
            return Err(BackendError::api(
                status.as_u16(),
                format!("Subscription rejected: {}", body),
            ));
        }

        let (tx, rx) = mpsc::unbounded_channel();
        let table = table.to_string();
        let mut stream = response.bytes_stream();
        let reader = tokio::spawn(async move {
            let mut buffer = String::new();
            let mut carry_cr = false;
            while let Some(chunk) = stream.next().await {
                let bytes = match chunk {
                    Ok(bytes) => bytes,
                    Err(err) => {
                        warn!("change feed for {} broke: {}", table, err);
                        break;
                    }
                };
                push_normalized(&mut buffer, &mut carry_cr, &String::from_utf8_lossy(&bytes));
                while let Some(split) = buffer.find("\n\n") {
                    let frame = buffer[..split].to_string();
                    buffer.drain(..split + 2);
                    if let Some(event) = parse_frame(&frame) {
                        if tx.send(event).is_err() {
                            // Receiver side closed the channel.
                            return;
                        }
                    }
                }
            }
            debug!("change feed for {} ended", table);
        });

        Ok(RealtimeChannel::new(rx, Some(reader)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::BackendConfig;
    use mizan_core::notifications::NotificationStatus;
    use tokio::io::AsyncWriteExt;
    use tokio::net::TcpListener;

    fn insert_frame(id: &str, status: &str) -> String {
        format!(
            concat!(
                "data: {{\"type\":\"INSERT\",\"record\":{{",
                "\"id\":\"{id}\",\"title\":\"t\",\"description\":\"d\",",
                "\"type\":\"info\",\"priority\":\"low\",\"status\":\"{status}\",",
                "\"created_at\":\"2026-02-01T08:30:00Z\",",
                "\"reference_type\":\"invoice\",\"reference_id\":\"inv-1\"}}}}\n\n"
            ),
            id = id,
            status = status,
        )
    }

    #[test]
    fn parse_frame_decodes_all_three_kinds() {
        let insert = parse_frame(insert_frame("n-1", "unread").trim_end());
        match insert {
            Some(RowEvent::Inserted(n)) => {
                assert_eq!(n.id, "n-1");
                assert_eq!(n.status, NotificationStatus::Unread);
            }
            other => panic!("expected insert, got {:?}", other),
        }

        let delete = parse_frame("data: {\"type\":\"DELETE\",\"old_record\":{\"id\":\"n-9\"}}");
        assert_eq!(delete, Some(RowEvent::Deleted { id: "n-9".into() }));

        assert!(parse_frame(": keep-alive").is_none());
        assert!(parse_frame("data: not-json").is_none());
        assert!(parse_frame("data: {\"type\":\"TRUNCATE\"}").is_none());
    }

    #[test]
    fn chunk_normalization_carries_split_crlf_pairs() {
        let mut buffer = String::new();
        let mut carry = false;

        // Chunk ends mid `\r\n`; the `\r` must wait for the next chunk.
        push_normalized(&mut buffer, &mut carry, "data: a\r");
        assert!(carry);
        assert_eq!(buffer, "data: a");

        push_normalized(&mut buffer, &mut carry, "\n\r\ndata: b\r\n\r\n");
        assert!(!carry);
        assert_eq!(buffer, "data: a\n\ndata: b\n\n");

        // Bare `\r` line endings normalize too.
        let mut buffer = String::new();
        push_normalized(&mut buffer, &mut carry, "data: c\r\r");
        assert!(carry);
        push_normalized(&mut buffer, &mut carry, "data: d\n");
        assert_eq!(buffer, "data: c\n\ndata: d\n");
    }

    /// Serves one event-stream connection, writing `frames` then closing.
    async fn start_mock_feed(frames: Vec<String>) -> (String, tokio::task::JoinHandle<()>) {
        let listener = TcpListener::bind("127.0.0.1:0")
            .await
            .expect("bind test listener");
        let addr = listener.local_addr().expect("listener addr");
        let handle = tokio::spawn(async move {
            let (mut stream, _) = match listener.accept().await {
                Ok(value) => value,
                Err(_) => return,
            };
            let head = "HTTP/1.1 200 OK\r\nContent-Type: text/event-stream\r\nConnection: close\r\n\r\n";
            let _ = stream.write_all(head.as_bytes()).await;
            for frame in frames {
                let _ = stream.write_all(frame.as_bytes()).await;
                let _ = stream.flush().await;
            }
        });
        (format!("http://{}", addr), handle)
    }

    #[tokio::test]
    async fn subscribe_delivers_events_in_send_order_then_terminates() {
        let (base_url, server) = start_mock_feed(vec![
            insert_frame("n-1", "unread"),
            "data: {\"type\":\"DELETE\",\"old_record\":{\"id\":\"n-1\"}}\n\n".to_string(),
        ])
        .await;

        let client = BackendClient::new(BackendConfig::new(&base_url, "anon-key"));
        client.set_access_token("user-jwt");
        let mut channel = client.subscribe_table("notifications").await.unwrap();

        match channel.recv().await {
            Some(RowEvent::Inserted(n)) => assert_eq!(n.id, "n-1"),
            other => panic!("expected insert, got {:?}", other),
        }
        assert_eq!(
            channel.recv().await,
            Some(RowEvent::Deleted { id: "n-1".into() })
        );

        // Server closed the stream; the channel drains and ends.
        assert_eq!(channel.recv().await, None);

        server.abort();
    }

    #[tokio::test]
    async fn crlf_framed_stream_delivers_events() {
        // Some proxies rewrite event streams with CRLF line endings; frames
        // must still be detected and decoded.
        let (base_url, server) = start_mock_feed(vec![
            insert_frame("n-7", "unread").replace('\n', "\r\n"),
            "data: {\"type\":\"DELETE\",\"old_record\":{\"id\":\"n-7\"}}\r\n\r\n".to_string(),
        ])
        .await;

        let client = BackendClient::new(BackendConfig::new(&base_url, "anon-key"));
        client.set_access_token("user-jwt");
        let mut channel = client.subscribe_table("notifications").await.unwrap();

        match channel.recv().await {
            Some(RowEvent::Inserted(n)) => assert_eq!(n.id, "n-7"),
            other => panic!("expected insert, got {:?}", other),
        }
        assert_eq!(
            channel.recv().await,
            Some(RowEvent::Deleted { id: "n-7".into() })
        );
        assert_eq!(channel.recv().await, None);

        server.abort();
    }

    #[tokio::test]
    async fn rejected_subscription_surfaces_api_error() {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        let server = tokio::spawn(async move {
            if let Ok((mut stream, _)) = listener.accept().await {
                let body = r#"{"message":"permission denied"}"#;
                let response = format!(
                    "HTTP/1.1 403 Forbidden\r\nContent-Type: application/json\r\nContent-Length: {}\r\nConnection: close\r\n\r\n{}",
                    body.len(),
                    body
                );
                let _ = stream.write_all(response.as_bytes()).await;
            }
        });

        let client = BackendClient::new(BackendConfig::new(&format!("http://{}", addr), "anon-key"));
        let result = client.subscribe_table("notifications").await;
        match result {
            Err(BackendError::Api { status, .. }) => assert_eq!(status, 403),
            other => panic!("expected API error, got {:?}", other.map(|_| ())),
        }

        server.abort();
    }
}
