use crate::chat::{
    ChatThread, Message, Role, ThreadSnapshot, NEW_THREAD_GREETING, NEW_THREAD_TITLE,
};
use tracing::{debug, warn};

/// In-memory owner of every chat thread and of the active selection.
///
/// Mutations bump `revision`; persistence is driven from the outside by
/// comparing revisions, so nothing in here touches storage.
#[derive(Debug, Clone)]
pub struct ChatStore {
    threads: Vec<ChatThread>,
    active_id: Option<String>,
    revision: u64,
}

impl ChatStore {
    /// Builds the store from a restored snapshot, or seeds one default thread
    /// when nothing usable was restored.
    pub fn initialize(restored: Option<ThreadSnapshot>, now: i64) -> Self {
        match restored {
            Some(snapshot) if !snapshot.threads.is_empty() => {
                let active_id = snapshot.threads.first().map(|thread| thread.id.clone());
                debug!(threads = snapshot.threads.len(), "restored chat threads");
                Self {
                    threads: snapshot.threads,
                    active_id,
                    revision: 0,
                }
            }
            _ => {
                let thread = ChatThread::default_thread(now);
                let active_id = Some(thread.id.clone());
                Self {
                    threads: vec![thread],
                    active_id,
                    // The seeded thread has never been written.
                    revision: 1,
                }
            }
        }
    }

    pub fn threads(&self) -> &[ChatThread] {
        &self.threads
    }

    pub fn active_id(&self) -> Option<&str> {
        self.active_id.as_deref()
    }

    pub fn active_thread(&self) -> Option<&ChatThread> {
        self.active_id.as_deref().and_then(|id| self.thread(id))
    }

    pub fn thread(&self, thread_id: &str) -> Option<&ChatThread> {
        self.threads.iter().find(|thread| thread.id == thread_id)
    }

    pub fn revision(&self) -> u64 {
        self.revision
    }

    pub fn snapshot(&self) -> ThreadSnapshot {
        ThreadSnapshot {
            threads: self.threads.clone(),
        }
    }

    /// Makes `thread_id` active. Unknown ids leave the selection untouched.
    pub fn select(&mut self, thread_id: &str) -> bool {
        if self.thread(thread_id).is_none() {
            warn!(thread_id, "select ignored: no such thread");
            return false;
        }
        self.active_id = Some(thread_id.to_string());
        true
    }

    /// Prepends a freshly seeded thread, activates it and returns its id.
    pub fn create_thread(&mut self, now: i64) -> String {
        let mut candidate = now;
        while self
            .threads
            .iter()
            .any(|thread| thread.id == candidate.to_string())
        {
            candidate += 1;
        }

        let id = candidate.to_string();
        let thread = ChatThread::seeded(id.clone(), NEW_THREAD_TITLE, NEW_THREAD_GREETING, now);
        self.threads.insert(0, thread);
        self.active_id = Some(id.clone());
        self.touch();
        id
    }

    /// Appends to the thread's history; unknown ids are a no-op.
    pub fn append_message(&mut self, thread_id: &str, message: Message) -> bool {
        let Some(thread) = self.thread_mut(thread_id) else {
            warn!(thread_id, "append ignored: no such thread");
            return false;
        };
        thread.messages.push(message);
        self.touch();
        true
    }

    /// Writes the in-progress model reply that belongs at `reply_index`.
    ///
    /// The first call for a send appends the reply, later calls overwrite it
    /// in place. Anything that would land elsewhere (history shifted, slot
    /// taken by a user message) is refused so older messages stay intact.
    pub fn upsert_reply(&mut self, thread_id: &str, reply_index: usize, text: &str) -> bool {
        let Some(thread) = self.thread_mut(thread_id) else {
            warn!(thread_id, "reply ignored: no such thread");
            return false;
        };

        let len = thread.messages.len();
        if len == reply_index {
            thread.messages.push(Message::model(text));
        } else if len == reply_index + 1 && thread.messages[reply_index].role == Role::Model {
            if thread.messages[reply_index].text == text {
                return true;
            }
            thread.messages[reply_index].text = text.to_string();
        } else {
            warn!(
                thread_id,
                reply_index, len, "reply ignored: thread history moved underneath the send"
            );
            return false;
        }

        self.touch();
        true
    }

    fn thread_mut(&mut self, thread_id: &str) -> Option<&mut ChatThread> {
        self.threads.iter_mut().find(|thread| thread.id == thread_id)
    }

    fn touch(&mut self) {
        self.revision += 1;
    }
}
