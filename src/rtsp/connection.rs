use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::TcpStream;

use super::message::{self, RtspMessage};
use crate::error::{Result, WfdError};

/// A framed RTSP connection to one sink.
///
/// Reads are message-oriented: [`Connection::read_message`] blocks until a
/// complete head plus `Content-Length` body is buffered and leaves any
/// pipelined follow-up bytes for the next call.
#[derive(Debug)]
pub struct Connection {
    stream: TcpStream,
    buffer: Vec<u8>,
}

impl Connection {
    /// Wraps an accepted stream.
    pub fn new(stream: TcpStream) -> Result<Self> {
        stream.set_nodelay(true)?;
        Ok(Self {
            stream,
            buffer: Vec::with_capacity(4096),
        })
    }

    /// Connects to a peer; used by sink emulations in tests.
    pub async fn connect(host: &str, port: u16) -> Result<Self> {
        let addr = format!("{}:{}", host, port);
        let stream = TcpStream::connect(&addr)
            .await
            .map_err(|e| WfdError::Transport(format!("failed to connect to {}: {}", addr, e)))?;
        Self::new(stream)
    }

    /// Writes a full message to the peer.
    pub async fn send(&mut self, data: &[u8]) -> Result<()> {
        self.stream
            .write_all(data)
            .await
            .map_err(|e| WfdError::Transport(format!("send failed: {}", e)))?;
        self.stream
            .flush()
            .await
            .map_err(|e| WfdError::Transport(format!("flush failed: {}", e)))?;
        Ok(())
    }

    /// Reads the next complete request or response.
    pub async fn read_message(&mut self) -> Result<RtspMessage> {
        let mut chunk = [0u8; 4096];

        loop {
            if let Some(total) = self.buffered_message_len() {
                let raw: Vec<u8> = self.buffer.drain(..total).collect();
                return message::parse_message(&raw);
            }

            let n = self
                .stream
                .read(&mut chunk)
                .await
                .map_err(|e| WfdError::Transport(format!("recv failed: {}", e)))?;
            if n == 0 {
                return Err(WfdError::Transport("connection closed by peer".into()));
            }
            self.buffer.extend_from_slice(&chunk[..n]);
        }
    }

    /// Total length of the first buffered message, once its head and body
    /// are fully present.
    fn buffered_message_len(&self) -> Option<usize> {
        let head_end = message::find_head_end(&self.buffer)?;
        let total = head_end + 4 + message::content_length(&self.buffer[..head_end]);
        (self.buffer.len() >= total).then_some(total)
    }
}

impl Drop for Connection {
    fn drop(&mut self) {
        // Best effort to close the connection gracefully
        let _ = self.stream.shutdown();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::rtsp::message::{Method, Request};
    use tokio::net::TcpListener;

    async fn pair() -> (Connection, Connection) {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        let client = TcpStream::connect(addr).await.unwrap();
        let (server, _) = listener.accept().await.unwrap();
        (
            Connection::new(server).unwrap(),
            Connection::new(client).unwrap(),
        )
    }

    #[tokio::test]
    async fn test_message_round_trip_over_socket() {
        let (mut server, mut client) = pair().await;

        let request = Request::new(Method::Options, "*")
            .header("CSeq", "1")
            .header("Require", "org.wfa.wfd1.0");
        server.send(&request.to_bytes()).await.unwrap();

        match client.read_message().await.unwrap() {
            RtspMessage::Request(req) => {
                assert_eq!(req.method, Method::Options);
                assert_eq!(req.cseq(), Some(1));
            }
            other => panic!("expected request, got {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_pipelined_messages_stay_framed() {
        let (mut server, mut client) = pair().await;

        let first = Request::new(Method::SetParameter, "rtsp://x")
            .header("CSeq", "1")
            .body("wfd_trigger_method: SETUP\r\n");
        let second = Request::new(Method::GetParameter, "rtsp://x").header("CSeq", "2");

        let mut bytes = first.to_bytes();
        bytes.extend_from_slice(&second.to_bytes());
        server.send(&bytes).await.unwrap();

        match client.read_message().await.unwrap() {
            RtspMessage::Request(req) => assert_eq!(req.cseq(), Some(1)),
            other => panic!("expected request, got {:?}", other),
        }
        match client.read_message().await.unwrap() {
            RtspMessage::Request(req) => {
                assert_eq!(req.cseq(), Some(2));
                assert!(req.body.is_empty());
            }
            other => panic!("expected request, got {:?}", other),
        }
    }
}
