//! Server-Sent Events client
//!
//! `reqwest` body stream fed through a minimal `text/event-stream` decoder.
//! Only `data:` fields matter to the engine; `event:`, `id:`, `retry:` and
//! comment lines are dropped.

use super::{StreamConnection, StreamEvent, TransportError};
use async_trait::async_trait;
use futures::stream::{self, BoxStream, StreamExt};
use reqwest::header::ACCEPT;
use std::collections::VecDeque;

/// Incremental `text/event-stream` decoder
#[derive(Debug, Default)]
pub struct SseDecoder {
    buffer: Vec<u8>,
    data: Vec<String>,
    ready: VecDeque<String>,
}

impl SseDecoder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Feed raw body bytes; complete events become available from [`next_message`](Self::next_message)
    pub fn feed(&mut self, chunk: &[u8]) {
        self.buffer.extend_from_slice(chunk);
        while let Some(newline) = self.buffer.iter().position(|b| *b == b'\n') {
            let mut line: Vec<u8> = self.buffer.drain(..=newline).collect();
            line.pop();
            if line.last() == Some(&b'\r') {
                line.pop();
            }
            self.process_line(&String::from_utf8_lossy(&line));
        }
    }

    /// Next fully received event payload, if any
    pub fn next_message(&mut self) -> Option<String> {
        self.ready.pop_front()
    }

    fn process_line(&mut self, line: &str) {
        if line.is_empty() {
            if !self.data.is_empty() {
                self.ready.push_back(self.data.join("\n"));
                self.data.clear();
            }
            return;
        }
        if line.starts_with(':') {
            return;
        }
        let (field, value) = match line.split_once(':') {
            Some((field, value)) => (field, value.strip_prefix(' ').unwrap_or(value)),
            None => (line, ""),
        };
        if field == "data" {
            self.data.push(value.to_string());
        }
    }
}

/// An open SSE response body
pub struct SseConnection {
    body: BoxStream<'static, reqwest::Result<Vec<u8>>>,
    decoder: SseDecoder,
    ended: bool,
}

impl SseConnection {
    pub async fn open(client: &reqwest::Client, url: &str) -> Result<Self, TransportError> {
        let response = client
            .get(url)
            .header(ACCEPT, "text/event-stream")
            .send()
            .await
            .map_err(|e| {
                if e.is_builder() {
                    TransportError::Protocol(format!("invalid url {}: {}", url, e))
                } else {
                    TransportError::Connect(e.to_string())
                }
            })?;

        let status = response.status();
        if status.is_client_error() {
            return Err(TransportError::Protocol(format!("{} answered {}", url, status)));
        }
        if !status.is_success() {
            return Err(TransportError::Connect(format!("{} answered {}", url, status)));
        }

        Ok(Self::from_body(
            response.bytes_stream().map(|chunk| chunk.map(|bytes| bytes.to_vec())).boxed(),
        ))
    }

    pub fn from_body(body: BoxStream<'static, reqwest::Result<Vec<u8>>>) -> Self {
        Self {
            body,
            decoder: SseDecoder::new(),
            ended: false,
        }
    }
}

#[async_trait]
impl StreamConnection for SseConnection {
    async fn next_event(&mut self) -> StreamEvent {
        loop {
            if let Some(message) = self.decoder.next_message() {
                return StreamEvent::Text(message);
            }
            if self.ended {
                return StreamEvent::Closed { clean: true };
            }
            match self.body.next().await {
                Some(Ok(chunk)) => self.decoder.feed(&chunk),
                Some(Err(e)) => {
                    self.ended = true;
                    return StreamEvent::Failed(TransportError::Interrupted(e.to_string()));
                }
                // A trailing event without its blank line is dropped
                None => self.ended = true,
            }
        }
    }

    async fn close(&mut self) {
        self.body = stream::empty().boxed();
        self.ended = true;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn decode_all(chunks: &[&str]) -> Vec<String> {
        let mut decoder = SseDecoder::new();
        let mut out = Vec::new();
        for chunk in chunks {
            decoder.feed(chunk.as_bytes());
            while let Some(message) = decoder.next_message() {
                out.push(message);
            }
        }
        out
    }

    #[test]
    fn test_single_event() {
        assert_eq!(decode_all(&["data: {\"a\":1}\n\n"]), vec!["{\"a\":1}"]);
    }

    #[test]
    fn test_split_across_chunks() {
        assert_eq!(
            decode_all(&["da", "ta: {\"status\":", "\"running\"}\r\n", "\r\n"]),
            vec!["{\"status\":\"running\"}"]
        );
    }

    #[test]
    fn test_comments_and_other_fields_ignored() {
        assert_eq!(
            decode_all(&[": keep-alive\n\nevent: update\nid: 7\nretry: 100\ndata: x\n\n"]),
            vec!["x"]
        );
    }

    #[test]
    fn test_multiline_data_joined() {
        assert_eq!(decode_all(&["data: a\ndata: b\n\ndata:c\n\n"]), vec!["a\nb", "c"]);
    }

    #[test]
    fn test_incomplete_event_not_dispatched() {
        assert!(decode_all(&["data: partial\n"]).is_empty());
    }

    #[tokio::test]
    async fn test_body_end_is_clean_close() {
        let chunks: Vec<reqwest::Result<Vec<u8>>> = vec![Ok(b"data: 1\n\n".to_vec()), Ok(b"data: 2\n\n".to_vec())];
        let mut connection = SseConnection::from_body(stream::iter(chunks).boxed());

        assert_eq!(connection.next_event().await, StreamEvent::Text("1".into()));
        assert_eq!(connection.next_event().await, StreamEvent::Text("2".into()));
        assert_eq!(connection.next_event().await, StreamEvent::Closed { clean: true });
    }
}
