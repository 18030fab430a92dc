use serde::{Deserialize, Serialize};

pub mod persist;
pub mod store;

pub const DEFAULT_THREAD_ID: &str = "1";
pub const DEFAULT_THREAD_TITLE: &str = "مساحة عمل جديدة";
pub const DEFAULT_GREETING: &str = "أهلاً بك في Lumina AI. أنا هنا لمساعدتك في إنشاء محتوى متطور، تصميم كتب، أو حتى البرمجة. ماذا سننجز اليوم؟";
pub const NEW_THREAD_TITLE: &str = "مشروع إبداعي جديد";
pub const NEW_THREAD_GREETING: &str = "أهلاً بك! دعنا نبدأ العمل على فكرتك القادمة.";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    User,
    Model,
}

impl Role {
    /// Role label understood by the generation API.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::User => "user",
            Self::Model => "model",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Message {
    pub role: Role,
    pub text: String,
}

impl Message {
    pub fn user(text: impl Into<String>) -> Self {
        Self {
            role: Role::User,
            text: text.into(),
        }
    }

    pub fn model(text: impl Into<String>) -> Self {
        Self {
            role: Role::Model,
            text: text.into(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ChatThread {
    pub id: String,
    pub title: String,
    pub messages: Vec<Message>,
    /// Epoch milliseconds.
    pub created_at: i64,
}

impl ChatThread {
    pub fn seeded(
        id: impl Into<String>,
        title: impl Into<String>,
        greeting: impl Into<String>,
        created_at: i64,
    ) -> Self {
        Self {
            id: id.into(),
            title: title.into(),
            messages: vec![Message::model(greeting)],
            created_at,
        }
    }

    pub fn default_thread(created_at: i64) -> Self {
        Self::seeded(
            DEFAULT_THREAD_ID,
            DEFAULT_THREAD_TITLE,
            DEFAULT_GREETING,
            created_at,
        )
    }

    /// True while the thread holds nothing but its seeded greeting.
    pub fn is_fresh(&self) -> bool {
        self.messages.len() == 1
    }
}

/// Ordered thread collection as it is written to and read from storage.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ThreadSnapshot {
    pub threads: Vec<ChatThread>,
}

pub fn now_millis() -> i64 {
    chrono::Utc::now().timestamp_millis()
}
