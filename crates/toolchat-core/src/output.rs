//! Output channel
//!
//! The orchestrator writes [`OutputEvent`]s into a bounded channel; the
//! front-end drains it and renders each event as one server-sent event.
//! A failed send means the receiving side is gone (client disconnected).

use futures::{stream, Stream};
use serde::Serialize;
use thiserror::Error;
use tokio::sync::mpsc;

/// SSE frame terminating every turn
pub const DONE_FRAME: &str = "data: [DONE]\n\n";

#[derive(Serialize)]
struct WireEvent<'a> {
    #[serde(rename = "type")]
    kind: &'a str,
    content: &'a str,
}

/// One event delivered to the client
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum OutputEvent {
    /// Model text, forwarded as it arrives
    Text(String),
    /// Human-readable tool progress notice
    Progress(String),
    /// The turn failed; always followed by `Done`
    Error(String),
    /// Terminal marker
    Done,
}

impl OutputEvent {
    /// Wire type of the event
    ///
    /// Progress notices travel as ordinary text.
    pub fn kind(&self) -> &'static str {
        match self {
            OutputEvent::Text(_) | OutputEvent::Progress(_) => "text",
            OutputEvent::Error(_) => "error",
            OutputEvent::Done => "done",
        }
    }

    /// Payload of the event; empty for `Done`
    pub fn content(&self) -> &str {
        match self {
            OutputEvent::Text(s) | OutputEvent::Progress(s) | OutputEvent::Error(s) => s,
            OutputEvent::Done => "",
        }
    }

    pub fn is_done(&self) -> bool {
        matches!(self, OutputEvent::Done)
    }

    /// Render as one server-sent event
    pub fn to_sse(&self) -> String {
        match self {
            OutputEvent::Done => DONE_FRAME.to_string(),
            other => {
                let wire = WireEvent { kind: other.kind(), content: other.content() };
                // Serializing two &str fields cannot fail
                let body = serde_json::to_string(&wire).unwrap_or_default();
                format!("data: {}\n\n", body)
            }
        }
    }
}

/// The receiving side of the channel has been dropped
#[derive(Error, Debug, Clone, Copy, PartialEq, Eq)]
#[error("Output receiver disconnected")]
pub struct Disconnected;

/// Sending half, owned by the orchestrator
#[derive(Debug, Clone)]
pub struct OutputSender {
    tx: mpsc::Sender<OutputEvent>,
}

impl OutputSender {
    /// Send one event, waiting for capacity
    pub async fn send(&self, event: OutputEvent) -> Result<(), Disconnected> {
        self.tx.send(event).await.map_err(|_| Disconnected)
    }

    pub async fn text(&self, text: impl Into<String>) -> Result<(), Disconnected> {
        self.send(OutputEvent::Text(text.into())).await
    }

    pub async fn progress(&self, text: impl Into<String>) -> Result<(), Disconnected> {
        self.send(OutputEvent::Progress(text.into())).await
    }

    pub async fn error(&self, message: impl Into<String>) -> Result<(), Disconnected> {
        self.send(OutputEvent::Error(message.into())).await
    }

    pub async fn done(&self) -> Result<(), Disconnected> {
        self.send(OutputEvent::Done).await
    }

    /// Whether the receiver has gone away
    pub fn is_closed(&self) -> bool {
        self.tx.is_closed()
    }

    /// Resolves once the receiver has gone away
    pub async fn closed(&self) {
        self.tx.closed().await
    }
}

/// Receiving half, drained by the front-end
#[derive(Debug)]
pub struct OutputReceiver {
    rx: mpsc::Receiver<OutputEvent>,
}

impl OutputReceiver {
    /// Next event; `None` once every sender is dropped
    pub async fn recv(&mut self) -> Option<OutputEvent> {
        self.rx.recv().await
    }

    /// Drain every remaining event
    pub async fn collect(mut self) -> Vec<OutputEvent> {
        let mut events = Vec::new();
        while let Some(event) = self.rx.recv().await {
            events.push(event);
        }
        events
    }

    /// Adapt into a `Stream` of events
    pub fn into_stream(self) -> impl Stream<Item = OutputEvent> + Send + 'static {
        stream::unfold(self.rx, |mut rx| async move {
            rx.recv().await.map(|event| (event, rx))
        })
    }
}

/// Create a bounded output channel
///
/// A zero capacity is raised to one.
pub fn channel(capacity: usize) -> (OutputSender, OutputReceiver) {
    let (tx, rx) = mpsc::channel(capacity.max(1));
    (OutputSender { tx }, OutputReceiver { rx })
}

#[cfg(test)]
mod tests {
    use super::*;
    use futures::StreamExt;

    #[test]
    fn test_sse_rendering() {
        assert_eq!(
            OutputEvent::Text("hello".into()).to_sse(),
            "data: {\"type\":\"text\",\"content\":\"hello\"}\n\n"
        );
        assert_eq!(
            OutputEvent::Progress("\n\n*Querying srv__echo...*\n\n".into()).to_sse(),
            "data: {\"type\":\"text\",\"content\":\"\\n\\n*Querying srv__echo...*\\n\\n\"}\n\n"
        );
        assert_eq!(OutputEvent::Done.to_sse(), "data: [DONE]\n\n");
    }

    #[test]
    fn test_sse_payload_is_json() {
        let frame = OutputEvent::Error("quote \" and\nnewline".into()).to_sse();
        let body = frame.strip_prefix("data: ").unwrap().trim_end();
        let value: serde_json::Value = serde_json::from_str(body).unwrap();
        assert_eq!(value["type"], "error");
        assert_eq!(value["content"], "quote \" and\nnewline");
    }

    #[tokio::test]
    async fn test_channel_order_and_close() {
        let (tx, rx) = channel(4);
        tx.text("a").await.unwrap();
        tx.progress("b").await.unwrap();
        tx.done().await.unwrap();
        drop(tx);

        let events: Vec<_> = rx.into_stream().collect().await;
        assert_eq!(
            events,
            vec![
                OutputEvent::Text("a".into()),
                OutputEvent::Progress("b".into()),
                OutputEvent::Done
            ]
        );
    }

    #[tokio::test]
    async fn test_send_after_receiver_dropped() {
        let (tx, rx) = channel(1);
        drop(rx);
        assert!(tx.is_closed());
        assert_eq!(tx.text("lost").await, Err(Disconnected));
    }

    #[tokio::test]
    async fn test_closed_resolves_when_receiver_dropped() {
        let (tx, rx) = channel(1);
        let waiter = {
            let tx = tx.clone();
            tokio::spawn(async move { tx.closed().await })
        };
        drop(rx);
        waiter.await.unwrap();
        assert!(tx.is_closed());
    }
}
