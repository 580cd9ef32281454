//! Persistent-channel transport
//!
//! Newline-delimited JSON over TCP: one request frame out, one response
//! frame back. Any connection-level problem is `Unavailable` so the bridge
//! can fall back to the process transport.

use super::{RawOutcome, Transport, TransportError};
use async_trait::async_trait;
use serde_json::{json, Value};
use tokio::io::{AsyncBufReadExt, AsyncReadExt, AsyncWriteExt, BufReader};
use tokio::net::TcpStream;
use tokio::time::{timeout_at, Instant};
use tracing::debug;
use uuid::Uuid;

/// Largest response frame accepted from the host, newline included
pub const MAX_FRAME_BYTES: u64 = 4 * 1024 * 1024;

/// Talks to a host listening on `host:port`
#[derive(Debug, Clone)]
pub struct SocketTransport {
    addr: String,
}

impl SocketTransport {
    pub fn new(host: &str, port: u16) -> Self {
        Self {
            addr: format!("{}:{}", host, port),
        }
    }

    async fn exchange(&self, code: &str) -> Result<RawOutcome, TransportError> {
        let stream = TcpStream::connect(&self.addr).await.map_err(|e| {
            TransportError::Unavailable(format!("failed to connect to {}: {}", self.addr, e))
        })?;

        let (reader, mut writer) = stream.into_split();

        let id = Uuid::new_v4().to_string();
        let envelope = json!({
            "action": "execute",
            "code": code,
            "id": id,
        });
        let mut frame = serde_json::to_string(&envelope)
            .map_err(|e| TransportError::Failed(format!("failed to encode request: {}", e)))?;
        frame.push('\n');

        writer
            .write_all(frame.as_bytes())
            .await
            .map_err(|e| TransportError::Unavailable(format!("failed to send request: {}", e)))?;
        writer
            .flush()
            .await
            .map_err(|e| TransportError::Unavailable(format!("failed to send request: {}", e)))?;
        debug!(addr = %self.addr, request_id = %id, "request frame sent");

        let mut response = Vec::new();
        let read = BufReader::new(reader)
            .take(MAX_FRAME_BYTES + 1)
            .read_until(b'\n', &mut response)
            .await
            .map_err(|e| TransportError::Unavailable(format!("failed to read response: {}", e)))?;

        if read == 0 {
            return Err(TransportError::Unavailable(
                "connection closed before a response frame".to_string(),
            ));
        }

        if response.len() as u64 > MAX_FRAME_BYTES {
            return Err(TransportError::Unavailable(format!(
                "response frame exceeds {} bytes",
                MAX_FRAME_BYTES
            )));
        }

        let frame: Value = serde_json::from_slice(&response).map_err(|e| {
            TransportError::Unavailable(format!("unreadable response frame: {}", e))
        })?;

        if !frame.is_object() {
            return Err(TransportError::Unavailable(
                "response frame is not a JSON object".to_string(),
            ));
        }

        Ok(RawOutcome::Frame(frame))
    }
}

#[async_trait]
impl Transport for SocketTransport {
    fn name(&self) -> &'static str {
        "socket"
    }

    async fn execute(&self, code: &str, deadline: Instant) -> Result<RawOutcome, TransportError> {
        match timeout_at(deadline, self.exchange(code)).await {
            Ok(result) => result,
            Err(_) => Err(TransportError::TimedOut),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;
    use tokio::net::TcpListener;

    /// Accept one connection, read the request line and reply with `reply`
    async fn one_shot_host(reply: &'static str) -> (u16, tokio::task::JoinHandle<Value>) {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let port = listener.local_addr().unwrap().port();
        let handle = tokio::spawn(async move {
            let (stream, _) = listener.accept().await.unwrap();
            let (reader, mut writer) = stream.into_split();
            let mut line = String::new();
            BufReader::new(reader).read_line(&mut line).await.unwrap();
            writer.write_all(reply.as_bytes()).await.unwrap();
            serde_json::from_str(&line).unwrap()
        });
        (port, handle)
    }

    fn soon() -> Instant {
        Instant::now() + Duration::from_secs(5)
    }

    #[tokio::test]
    async fn test_exchange_sends_envelope() {
        let (port, host) = one_shot_host("{\"success\": true, \"output\": \"ok\"}\n").await;
        let transport = SocketTransport::new("127.0.0.1", port);

        let outcome = transport.execute("print(1)", soon()).await.unwrap();
        assert!(matches!(outcome, RawOutcome::Frame(ref v) if v["output"] == "ok"));

        let request = host.await.unwrap();
        assert_eq!(request["action"], "execute");
        assert_eq!(request["code"], "print(1)");
        assert!(request["id"].as_str().is_some());
    }

    #[tokio::test]
    async fn test_refused_connection_is_unavailable() {
        let port = {
            let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
            listener.local_addr().unwrap().port()
        };
        let transport = SocketTransport::new("127.0.0.1", port);
        let err = transport.execute("x = 1", soon()).await.unwrap_err();
        assert!(matches!(err, TransportError::Unavailable(_)));
    }

    #[tokio::test]
    async fn test_garbage_frame_is_unavailable() {
        let (port, _host) = one_shot_host("not json\n").await;
        let transport = SocketTransport::new("127.0.0.1", port);
        let err = transport.execute("x = 1", soon()).await.unwrap_err();
        assert!(matches!(err, TransportError::Unavailable(_)));
    }

    #[tokio::test]
    async fn test_oversized_frame_is_unavailable() {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let port = listener.local_addr().unwrap().port();
        let _host = tokio::spawn(async move {
            let (stream, _) = listener.accept().await.unwrap();
            let (_reader, mut writer) = stream.into_split();
            let chunk = vec![b'x'; 64 * 1024];
            // No newline; stops once the client hangs up
            while writer.write_all(&chunk).await.is_ok() {}
        });

        let transport = SocketTransport::new("127.0.0.1", port);
        let err = transport.execute("x = 1", soon()).await.unwrap_err();
        assert!(matches!(err, TransportError::Unavailable(ref msg) if msg.contains("exceeds")));
    }

    #[tokio::test]
    async fn test_silent_host_times_out() {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let port = listener.local_addr().unwrap().port();
        let _host = tokio::spawn(async move {
            let (_stream, _) = listener.accept().await.unwrap();
            tokio::time::sleep(Duration::from_secs(10)).await;
        });

        let transport = SocketTransport::new("127.0.0.1", port);
        let started = std::time::Instant::now();
        let err = transport
            .execute("x = 1", Instant::now() + Duration::from_millis(200))
            .await
            .unwrap_err();

        assert_eq!(err, TransportError::TimedOut);
        assert!(started.elapsed() < Duration::from_secs(2));
    }
}
