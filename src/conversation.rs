use crate::chat::store::ChatStore;
use crate::chat::Message;
use crate::design::extract::find_design;
use crate::event::AppEvent;
use crate::preview::PreviewState;
use crate::transport::Transport;
use std::collections::VecDeque;
use tracing::{debug, error, info};

const MAX_DIAGNOSTICS: usize = 200;

/// Where the current send is in its request/response cycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SendPhase {
    Idle,
    /// User message appended, waiting for the first fragment.
    Sending,
    Streaming,
    /// Reply complete, looking for a design block. Only held while the
    /// finish event is applied; the UI never observes it.
    Extracting,
}

#[derive(Debug, Clone)]
struct PendingSend {
    send_id: u64,
    thread_id: String,
    reply_index: usize,
}

/// Drives sends for the active thread and routes their results into the
/// store and the design preview.
pub struct Conversation {
    store: ChatStore,
    transport: Transport,
    preview: PreviewState,
    input: String,
    phase: SendPhase,
    pending: Option<PendingSend>,
    quick_actions_dismissed: bool,
    scroll_to_bottom: bool,
    diagnostics: VecDeque<String>,
}

impl Conversation {
    pub fn new(store: ChatStore, transport: Transport) -> Self {
        Self {
            store,
            transport,
            preview: PreviewState::default(),
            input: String::new(),
            phase: SendPhase::Idle,
            pending: None,
            quick_actions_dismissed: false,
            scroll_to_bottom: true,
            diagnostics: VecDeque::new(),
        }
    }

    pub fn store(&self) -> &ChatStore {
        &self.store
    }

    pub fn preview(&self) -> &PreviewState {
        &self.preview
    }

    pub fn preview_mut(&mut self) -> &mut PreviewState {
        &mut self.preview
    }

    pub fn phase(&self) -> SendPhase {
        self.phase
    }

    pub fn is_generating(&self) -> bool {
        self.phase != SendPhase::Idle
    }

    pub fn input(&self) -> &str {
        &self.input
    }

    pub fn input_mut(&mut self) -> &mut String {
        &mut self.input
    }

    pub fn diagnostics(&self) -> impl Iterator<Item = &String> {
        self.diagnostics.iter()
    }

    pub fn take_scroll_request(&mut self) -> bool {
        std::mem::take(&mut self.scroll_to_bottom)
    }

    pub fn show_quick_actions(&self) -> bool {
        !self.quick_actions_dismissed
            && self
                .store
                .active_thread()
                .is_some_and(|thread| thread.is_fresh())
    }

    /// Fills the composer with a preset prompt without sending it.
    pub fn apply_quick_action(&mut self, prompt: &str) {
        self.input = prompt.to_string();
        self.quick_actions_dismissed = true;
    }

    pub fn can_submit(&self) -> bool {
        self.phase == SendPhase::Idle
            && !self.input.trim().is_empty()
            && self.store.active_thread().is_some()
    }

    /// Sends the composer text to the active thread. Returns the send id, or
    /// `None` when the input is blank, no thread is active, or a send is
    /// already running.
    pub fn submit(&mut self) -> Option<u64> {
        if !self.can_submit() {
            return None;
        }
        let thread = self.store.active_thread()?;
        let thread_id = thread.id.clone();
        let history = thread.messages.clone();
        let text = self.input.trim().to_string();

        self.store
            .append_message(&thread_id, Message::user(text.clone()));
        let reply_index = history.len() + 1;
        self.input.clear();
        self.phase = SendPhase::Sending;
        self.scroll_to_bottom = true;

        let send_id = self.transport.send(thread_id.clone(), history, text);
        self.pending = Some(PendingSend {
            send_id,
            thread_id,
            reply_index,
        });
        Some(send_id)
    }

    pub fn apply_event(&mut self, event: AppEvent) {
        let Some(pending) = self
            .pending
            .clone()
            .filter(|pending| pending.send_id == event.send_id())
        else {
            debug!(send_id = event.send_id(), "dropping event from a superseded send");
            return;
        };

        match event {
            AppEvent::StreamFragment { text, .. } => {
                self.store
                    .upsert_reply(&pending.thread_id, pending.reply_index, &text);
                self.phase = SendPhase::Streaming;
                self.scroll_to_bottom = true;
            }
            AppEvent::StreamFinished { text, .. } => {
                // Always lands, so an empty reply still leaves one model message.
                self.store
                    .upsert_reply(&pending.thread_id, pending.reply_index, &text);
                self.phase = SendPhase::Extracting;
                if let Some(document) = find_design(&text) {
                    self.record(format!(
                        "design \"{}\" ready ({} pages)",
                        document.title,
                        document.page_count()
                    ));
                    self.preview.activate(document);
                }
                self.finish(pending.send_id);
            }
            AppEvent::SendFailed { message, .. } => {
                error!(send_id = pending.send_id, "generation failed: {message}");
                self.record(format!("generation failed: {message}"));
                self.finish(pending.send_id);
            }
            AppEvent::SendCancelled { .. } => {
                self.finish(pending.send_id);
            }
        }
    }

    pub fn select_thread(&mut self, thread_id: &str) {
        if self.store.active_id() == Some(thread_id) {
            return;
        }
        self.cancel_send();
        if self.store.select(thread_id) {
            self.scroll_to_bottom = true;
        }
    }

    pub fn create_thread(&mut self, now: i64) -> String {
        self.cancel_send();
        let thread_id = self.store.create_thread(now);
        self.preview.clear();
        self.scroll_to_bottom = true;
        info!(thread_id, "created thread");
        thread_id
    }

    /// Abandons the running send; anything it delivers later is dropped.
    pub fn cancel_send(&mut self) {
        if let Some(pending) = self.pending.take() {
            self.transport.cancel();
            self.record(format!("send {} cancelled", pending.send_id));
        }
        self.phase = SendPhase::Idle;
    }

    fn finish(&mut self, send_id: u64) {
        self.transport.settle(send_id);
        self.pending = None;
        self.phase = SendPhase::Idle;
        self.scroll_to_bottom = true;
    }

    fn record(&mut self, line: String) {
        let stamp = chrono::Local::now().format("%H:%M:%S");
        self.diagnostics.push_back(format!("[{stamp}] {line}"));
        while self.diagnostics.len() > MAX_DIAGNOSTICS {
            self.diagnostics.pop_front();
        }
    }

    #[cfg(test)]
    fn pending_send_id(&self) -> Option<u64> {
        self.pending.as_ref().map(|pending| pending.send_id)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::chat::{Role, DEFAULT_THREAD_ID};
    use crate::event::EventSink;
    use crate::transport::testing::{next_event, ScriptedBackend};
    use std::sync::{mpsc, Arc};
    use tokio::runtime::Handle;

    fn conversation(backend: ScriptedBackend) -> (Conversation, mpsc::Receiver<AppEvent>) {
        let (tx, rx) = mpsc::channel();
        let transport = Transport::new(Arc::new(backend), EventSink::new(tx), Handle::current(), true);
        let store = ChatStore::initialize(None, 1);
        (Conversation::new(store, transport), rx)
    }

    async fn run_to_idle(conversation: &mut Conversation, rx: &mpsc::Receiver<AppEvent>) {
        while conversation.is_generating() {
            let event = next_event(rx).await;
            conversation.apply_event(event);
        }
    }

    fn active_messages(conversation: &Conversation) -> Vec<Message> {
        conversation
            .store()
            .active_thread()
            .map(|thread| thread.messages.clone())
            .unwrap_or_default()
    }

    #[tokio::test]
    async fn submit_appends_one_user_and_one_model_message() {
        let (mut conversation, rx) = conversation(ScriptedBackend::replying(&["Hi", " there", "!"]));
        *conversation.input_mut() = "hello".to_string();

        assert!(conversation.submit().is_some());
        assert_eq!(conversation.phase(), SendPhase::Sending);
        assert!(conversation.input().is_empty());
        run_to_idle(&mut conversation, &rx).await;

        let messages = active_messages(&conversation);
        assert_eq!(messages.len(), 3);
        assert_eq!(messages[1], Message::user("hello"));
        assert_eq!(messages[2], Message::model("Hi there!"));
        assert!(!conversation.preview().is_visible());
    }

    #[tokio::test]
    async fn history_sent_excludes_the_new_input() {
        let backend = Arc::new(ScriptedBackend::replying(&["ok"]));
        let (tx, rx) = mpsc::channel();
        let transport = Transport::new(backend.clone(), EventSink::new(tx), Handle::current(), true);
        let mut conversation = Conversation::new(ChatStore::initialize(None, 1), transport);

        *conversation.input_mut() = "  question  ".to_string();
        conversation.submit();
        run_to_idle(&mut conversation, &rx).await;

        let calls = backend.calls.lock().unwrap();
        let (history, input) = &calls[0];
        assert_eq!(history.len(), 1);
        assert_eq!(history[0].role, Role::Model);
        assert_eq!(input, "question");
    }

    #[tokio::test]
    async fn blank_input_never_leaves_idle() {
        let (mut conversation, _rx) = conversation(ScriptedBackend::replying(&["x"]));
        *conversation.input_mut() = "   \n\t".to_string();

        assert!(!conversation.can_submit());
        assert!(conversation.submit().is_none());
        assert_eq!(conversation.phase(), SendPhase::Idle);
        assert_eq!(active_messages(&conversation).len(), 1);
    }

    #[tokio::test]
    async fn design_reply_activates_preview() {
        let reply = "Here is your book\n```json\n{\"title\":\"T\",\"pages\":[{\"id\":\"p1\",\"layout\":\"cover\",\"content\":{\"heading\":\"H\"}},{\"id\":\"p2\",\"layout\":\"content\"}]}\n```";
        let (mut conversation, rx) = conversation(ScriptedBackend::replying(&[reply]));
        *conversation.input_mut() = "design a book".to_string();
        conversation.submit();
        run_to_idle(&mut conversation, &rx).await;

        let preview = conversation.preview();
        assert!(preview.is_visible());
        assert_eq!(preview.page_index(), 0);
        assert_eq!(preview.page_count(), 2);
        assert_eq!(preview.document().map(|doc| doc.title.as_str()), Some("T"));
    }

    #[tokio::test]
    async fn malformed_design_keeps_text_and_skips_preview() {
        let reply = "Broken\n```json\n{\"title\": \n```";
        let (mut conversation, rx) = conversation(ScriptedBackend::replying(&[reply]));
        *conversation.input_mut() = "design".to_string();
        conversation.submit();
        run_to_idle(&mut conversation, &rx).await;

        assert!(!conversation.preview().is_visible());
        assert_eq!(active_messages(&conversation)[2], Message::model(reply));
    }

    #[tokio::test]
    async fn transport_failure_returns_to_idle_without_a_reply() {
        let (mut conversation, rx) = conversation(ScriptedBackend::failing(500, "boom"));
        *conversation.input_mut() = "hello".to_string();
        conversation.submit();
        run_to_idle(&mut conversation, &rx).await;

        assert_eq!(conversation.phase(), SendPhase::Idle);
        let messages = active_messages(&conversation);
        assert_eq!(messages.len(), 2);
        assert_eq!(messages[1], Message::user("hello"));
        assert!(conversation.diagnostics().any(|line| line.contains("boom")));
    }

    #[tokio::test]
    async fn switching_threads_mid_stream_drops_late_fragments() {
        let backend = ScriptedBackend {
            hang: true,
            ..ScriptedBackend::replying(&["partial"])
        };
        let (mut conversation, rx) = conversation(backend);
        *conversation.input_mut() = "hello".to_string();
        let send_id = conversation.submit().expect("send should start");

        let first = next_event(&rx).await;
        conversation.apply_event(first);
        assert_eq!(conversation.phase(), SendPhase::Streaming);

        let other = conversation.create_thread(50);
        assert_eq!(conversation.store().active_id(), Some(other.as_str()));
        assert_eq!(conversation.phase(), SendPhase::Idle);
        assert_eq!(conversation.pending_send_id(), None);

        // A fragment from the abandoned send must not touch any thread.
        conversation.apply_event(AppEvent::StreamFragment {
            send_id,
            thread_id: DEFAULT_THREAD_ID.to_string(),
            text: "late overwrite".to_string(),
        });
        let original = conversation
            .store()
            .thread(DEFAULT_THREAD_ID)
            .expect("original thread exists");
        assert_eq!(original.messages.last(), Some(&Message::model("partial")));
        assert_eq!(active_messages(&conversation).len(), 1);
    }

    #[tokio::test]
    async fn creating_a_thread_clears_the_preview() {
        let reply = "```json\n{\"title\":\"T\",\"pages\":[{\"id\":\"p1\",\"layout\":\"cover\"}]}\n```";
        let (mut conversation, rx) = conversation(ScriptedBackend::replying(&[reply]));
        *conversation.input_mut() = "design".to_string();
        conversation.submit();
        run_to_idle(&mut conversation, &rx).await;
        assert!(conversation.preview().is_visible());

        let id = conversation.create_thread(99);
        assert_eq!(conversation.store().threads()[0].id, id);
        assert!(!conversation.preview().is_visible());
        assert!(conversation.preview().document().is_none());
    }

    #[tokio::test]
    async fn empty_reply_appends_one_model_message_in_both_modes() {
        for streaming in [true, false] {
            let (tx, rx) = mpsc::channel();
            let transport = Transport::new(
                Arc::new(ScriptedBackend::replying(&[])),
                EventSink::new(tx),
                Handle::current(),
                streaming,
            );
            let mut conversation = Conversation::new(ChatStore::initialize(None, 1), transport);
            *conversation.input_mut() = "hello".to_string();
            conversation.submit();
            run_to_idle(&mut conversation, &rx).await;

            let messages = active_messages(&conversation);
            assert_eq!(messages.len(), 3, "streaming = {streaming}");
            assert_eq!(messages[2], Message::model(""));
            assert!(!conversation.preview().is_visible());
        }
    }

    #[tokio::test]
    async fn finished_send_settles_straight_back_to_idle() {
        let (mut conversation, rx) = conversation(ScriptedBackend::replying(&["done"]));
        *conversation.input_mut() = "hi".to_string();
        conversation.submit();

        loop {
            let event = next_event(&rx).await;
            let finished = matches!(event, AppEvent::StreamFinished { .. });
            conversation.apply_event(event);
            if finished {
                break;
            }
        }
        assert_eq!(conversation.phase(), SendPhase::Idle);
        assert!(!conversation.is_generating());
    }

    #[tokio::test]
    async fn quick_actions_fill_input_only_on_fresh_threads() {
        let (mut conversation, _rx) = conversation(ScriptedBackend::replying(&["x"]));
        assert!(conversation.show_quick_actions());

        conversation.apply_quick_action("Summarize: ");
        assert_eq!(conversation.input(), "Summarize: ");
        assert!(!conversation.show_quick_actions());
        assert_eq!(active_messages(&conversation).len(), 1);
    }
}
