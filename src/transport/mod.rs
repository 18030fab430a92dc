pub mod gemini;

use crate::chat::Message;
use crate::error::TransportError;
use crate::event::{AppEvent, EventSink};
use async_trait::async_trait;
use futures::stream::BoxStream;
use futures::StreamExt;
use std::sync::Arc;
use tokio::runtime::Handle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info};

/// Stream of reply text pieces. Backends yield deltas; [`cumulative`] turns
/// them into the growing full text.
pub type FragmentStream = BoxStream<'static, Result<String, TransportError>>;

pub const SYSTEM_INSTRUCTION: &str = r##"You are Lumina AI Studio, an elite creative intelligence.
You specialize in high-end content creation, professional typeset design, and strategic research.

Capabilities:
1. Advanced Chat: deep reasoning, creative writing, and coding.
2. Design Mode: when asked to design a book, PDF, or portfolio, answer with a fenced ```json block.
3. Language: always match the user's language (Arabic or English).

DESIGN GUIDELINES:
- The JSON must follow the Lumina Design Engine schema below exactly.
- Structure layouts with a strong typographic hierarchy.
- Keep elements clean and descriptive so they export cleanly.

JSON Schema for Design:
{
  "title": "Document Title",
  "pages": [
    {
      "id": "p1",
      "layout": "cover",
      "content": {
        "heading": "Main Heading",
        "subheading": "Supporting tagline",
        "body": "Extra details (Author, date, etc.)"
      }
    },
    {
      "id": "p2",
      "layout": "content",
      "content": {
        "heading": "Chapter Title",
        "subheading": "Section intro",
        "body": "Full body text content for this page..."
      }
    },
    {
      "id": "p3",
      "layout": "visual",
      "content": {
        "heading": "Visual Title",
        "imageUrl": "https://example.com/cover.png",
        "elements": [
          { "type": "rect", "x": 10, "y": 10, "w": 80, "h": 40, "color": "#4F46E5" }
        ]
      }
    }
  ]
}
Element coordinates use a 100 x 141 page grid.

Trigger Design Mode automatically if the user mentions keywords like "صمم", "design", "layout", "PDF", "book".
Keep your tone professional, innovative, and inspiring.
"##;

/// Remote text generation. `history` excludes `input`, which is sent as the
/// final user turn.
#[async_trait]
pub trait ChatBackend: Send + Sync {
    async fn generate(&self, history: &[Message], input: &str) -> Result<String, TransportError>;

    async fn stream_generate(
        &self,
        history: &[Message],
        input: &str,
    ) -> Result<FragmentStream, TransportError>;
}

pub fn cumulative(deltas: FragmentStream) -> FragmentStream {
    deltas
        .scan(String::new(), |full, delta| {
            let item = delta.map(|delta| {
                full.push_str(&delta);
                full.clone()
            });
            futures::future::ready(Some(item))
        })
        .boxed()
}

#[derive(Debug, Clone)]
pub struct SendRequest {
    pub send_id: u64,
    pub thread_id: String,
    pub history: Vec<Message>,
    pub input: String,
}

/// Runs sends on the tokio runtime and reports back through the event sink.
/// At most one send is in flight; starting another or calling
/// [`Transport::cancel`] cancels the previous one.
pub struct Transport {
    backend: Arc<dyn ChatBackend>,
    sink: EventSink,
    runtime_handle: Handle,
    streaming: bool,
    next_send_id: u64,
    in_flight: Option<(u64, CancellationToken)>,
}

impl Transport {
    pub fn new(
        backend: Arc<dyn ChatBackend>,
        sink: EventSink,
        runtime_handle: Handle,
        streaming: bool,
    ) -> Self {
        Self {
            backend,
            sink,
            runtime_handle,
            streaming,
            next_send_id: 1,
            in_flight: None,
        }
    }

    pub fn in_flight(&self) -> Option<u64> {
        self.in_flight.as_ref().map(|(send_id, _)| *send_id)
    }

    pub fn send(&mut self, thread_id: String, history: Vec<Message>, input: String) -> u64 {
        self.cancel();

        let send_id = self.next_send_id;
        self.next_send_id += 1;
        let token = CancellationToken::new();
        self.in_flight = Some((send_id, token.clone()));

        let request = SendRequest {
            send_id,
            thread_id,
            history,
            input,
        };
        info!(
            send_id,
            thread_id = %request.thread_id,
            history = request.history.len(),
            "starting send"
        );

        let backend = Arc::clone(&self.backend);
        let sink = self.sink.clone();
        let streaming = self.streaming;
        self.runtime_handle
            .spawn(run_send(backend, request, token, sink, streaming));
        send_id
    }

    pub fn cancel(&mut self) {
        if let Some((send_id, token)) = self.in_flight.take() {
            debug!(send_id, "cancelling in-flight send");
            token.cancel();
        }
    }

    /// Forgets `send_id` once its terminal event has been handled.
    pub fn settle(&mut self, send_id: u64) {
        if self.in_flight() == Some(send_id) {
            self.in_flight = None;
        }
    }
}

async fn run_send(
    backend: Arc<dyn ChatBackend>,
    request: SendRequest,
    token: CancellationToken,
    sink: EventSink,
    streaming: bool,
) {
    let send_id = request.send_id;
    let thread_id = request.thread_id.clone();

    let outcome = tokio::select! {
        biased;
        _ = token.cancelled() => Err(TransportError::Cancelled),
        result = drive_send(backend.as_ref(), &request, &token, &sink, streaming) => result,
    };

    let event = match outcome {
        Ok(text) => {
            info!(send_id, chars = text.chars().count(), "send finished");
            AppEvent::StreamFinished {
                send_id,
                thread_id,
                text,
            }
        }
        Err(TransportError::Cancelled) => {
            info!(send_id, "send cancelled");
            AppEvent::SendCancelled { send_id, thread_id }
        }
        Err(err) => {
            error!(send_id, "send failed: {err}");
            AppEvent::SendFailed {
                send_id,
                thread_id,
                message: err.to_string(),
            }
        }
    };
    sink.emit(event);
}

async fn drive_send(
    backend: &dyn ChatBackend,
    request: &SendRequest,
    token: &CancellationToken,
    sink: &EventSink,
    streaming: bool,
) -> Result<String, TransportError> {
    let fragment = |text: &str| AppEvent::StreamFragment {
        send_id: request.send_id,
        thread_id: request.thread_id.clone(),
        text: text.to_string(),
    };

    if !streaming {
        let text = backend.generate(&request.history, &request.input).await?;
        sink.emit(fragment(&text));
        return Ok(text);
    }

    let mut fragments = cumulative(
        backend
            .stream_generate(&request.history, &request.input)
            .await?,
    );
    let mut latest = String::new();
    while let Some(next) = fragments.next().await {
        if token.is_cancelled() {
            return Err(TransportError::Cancelled);
        }
        let text = next?;
        if text == latest {
            continue;
        }
        if !sink.emit(fragment(&text)) {
            return Err(TransportError::Cancelled);
        }
        latest = text;
    }
    Ok(latest)
}

#[cfg(test)]
pub mod testing {
    use super::*;
    use std::sync::Mutex;

    /// Backend replaying canned deltas. `hang` keeps the stream open after the
    /// last delta until the send is cancelled.
    #[derive(Debug, Default)]
    pub struct ScriptedBackend {
        pub deltas: Vec<String>,
        pub fail_with: Option<(u16, String)>,
        pub hang: bool,
        pub calls: Mutex<Vec<(Vec<Message>, String)>>,
    }

    impl ScriptedBackend {
        pub fn replying(deltas: &[&str]) -> Self {
            Self {
                deltas: deltas.iter().map(|delta| delta.to_string()).collect(),
                ..Self::default()
            }
        }

        pub fn failing(status: u16, message: &str) -> Self {
            Self {
                fail_with: Some((status, message.to_string())),
                ..Self::default()
            }
        }

        fn record(&self, history: &[Message], input: &str) {
            self.calls
                .lock()
                .unwrap()
                .push((history.to_vec(), input.to_string()));
        }

        fn failure(&self) -> Option<TransportError> {
            self.fail_with
                .as_ref()
                .map(|(status, message)| TransportError::Api {
                    status: *status,
                    message: message.clone(),
                })
        }
    }

    #[async_trait]
    impl ChatBackend for ScriptedBackend {
        async fn generate(&self, history: &[Message], input: &str) -> Result<String, TransportError> {
            self.record(history, input);
            match self.failure() {
                Some(err) => Err(err),
                None => Ok(self.deltas.concat()),
            }
        }

        async fn stream_generate(
            &self,
            history: &[Message],
            input: &str,
        ) -> Result<FragmentStream, TransportError> {
            self.record(history, input);
            if let Some(err) = self.failure() {
                return Err(err);
            }
            let deltas = futures::stream::iter(self.deltas.clone().into_iter().map(Ok));
            if self.hang {
                Ok(deltas.chain(futures::stream::pending()).boxed())
            } else {
                Ok(deltas.boxed())
            }
        }
    }

    /// Waits up to two seconds for the next event.
    pub async fn next_event(rx: &std::sync::mpsc::Receiver<AppEvent>) -> AppEvent {
        for _ in 0..200 {
            if let Ok(event) = rx.try_recv() {
                return event;
            }
            tokio::time::sleep(std::time::Duration::from_millis(10)).await;
        }
        panic!("timed out waiting for app event");
    }
}

#[cfg(test)]
mod tests {
    use super::testing::{next_event, ScriptedBackend};
    use super::*;
    use std::sync::mpsc;

    fn transport(backend: ScriptedBackend, streaming: bool) -> (Transport, mpsc::Receiver<AppEvent>) {
        let (tx, rx) = mpsc::channel();
        let transport = Transport::new(
            Arc::new(backend),
            EventSink::new(tx),
            Handle::current(),
            streaming,
        );
        (transport, rx)
    }

    #[tokio::test]
    async fn cumulative_emits_growing_text() {
        let deltas = futures::stream::iter(vec![Ok("a".to_string()), Ok("b".to_string())]).boxed();
        let collected: Vec<String> = cumulative(deltas)
            .map(|item| item.unwrap())
            .collect()
            .await;
        assert_eq!(collected, vec!["a", "ab"]);
    }

    #[tokio::test]
    async fn streaming_send_reports_cumulative_fragments_then_finish() {
        let (mut transport, rx) = transport(ScriptedBackend::replying(&["Hel", "", "lo"]), true);
        let send_id = transport.send("1".to_string(), Vec::new(), "hi".to_string());

        let mut texts = Vec::new();
        loop {
            match next_event(&rx).await {
                AppEvent::StreamFragment { text, .. } => texts.push(text),
                AppEvent::StreamFinished {
                    send_id: finished,
                    thread_id,
                    text,
                } => {
                    assert_eq!(finished, send_id);
                    assert_eq!(thread_id, "1");
                    assert_eq!(text, "Hello");
                    break;
                }
                other => panic!("unexpected event {other:?}"),
            }
        }
        assert_eq!(texts, vec!["Hel", "Hello"]);
    }

    #[tokio::test]
    async fn non_streaming_send_delivers_one_fragment() {
        let (mut transport, rx) = transport(ScriptedBackend::replying(&["one ", "shot"]), false);
        transport.send("1".to_string(), Vec::new(), "hi".to_string());

        assert!(matches!(
            next_event(&rx).await,
            AppEvent::StreamFragment { ref text, .. } if text == "one shot"
        ));
        assert!(matches!(next_event(&rx).await, AppEvent::StreamFinished { .. }));
    }

    #[tokio::test]
    async fn backend_failure_becomes_send_failed() {
        let (mut transport, rx) = transport(ScriptedBackend::failing(503, "overloaded"), true);
        transport.send("1".to_string(), Vec::new(), "hi".to_string());

        match next_event(&rx).await {
            AppEvent::SendFailed { message, .. } => assert!(message.contains("overloaded")),
            other => panic!("unexpected event {other:?}"),
        }
    }

    #[tokio::test]
    async fn cancel_stops_a_hanging_send() {
        let backend = ScriptedBackend {
            hang: true,
            ..ScriptedBackend::replying(&["partial"])
        };
        let (mut transport, rx) = transport(backend, true);
        let send_id = transport.send("1".to_string(), Vec::new(), "hi".to_string());

        assert!(matches!(next_event(&rx).await, AppEvent::StreamFragment { .. }));
        transport.cancel();
        assert_eq!(transport.in_flight(), None);
        assert_eq!(
            next_event(&rx).await,
            AppEvent::SendCancelled {
                send_id,
                thread_id: "1".to_string()
            }
        );
    }

    #[tokio::test]
    async fn new_send_supersedes_the_previous_one() {
        let backend = ScriptedBackend {
            hang: true,
            ..ScriptedBackend::replying(&["x"])
        };
        let (mut transport, _rx) = transport(backend, true);
        let first = transport.send("1".to_string(), Vec::new(), "a".to_string());
        let second = transport.send("1".to_string(), Vec::new(), "b".to_string());
        assert_ne!(first, second);
        assert_eq!(transport.in_flight(), Some(second));
        transport.settle(first);
        assert_eq!(transport.in_flight(), Some(second));
        transport.settle(second);
        assert_eq!(transport.in_flight(), None);
    }
}
