use serde::{Deserialize, Serialize};

/// The two content kinds in the corpus. Only `Translation` entries are
/// eligible for exact verse lookup; commentary is retrieved semantically.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum SourceKind {
    Translation,
    Commentary,
}

impl SourceKind {
    pub fn as_str(self) -> &'static str {
        match self {
            SourceKind::Translation => "Meal",
            SourceKind::Commentary => "Tefsir",
        }
    }

    pub fn from_label(value: &str) -> Self {
        match value.trim() {
            "Tefsir" | "tefsir" | "commentary" => SourceKind::Commentary,
            _ => SourceKind::Translation,
        }
    }
}

/// One corpus entry: a single ayah's translation or a commentary passage
/// anchored to an ayah. Immutable after load.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct VerseDocument {
    pub content: String,
    pub sura_name: String,
    pub ayah_number: u32,
    pub kind: SourceKind,
}

/// Pagination cursor for a sequential sura read-through. `next_start_ayah`
/// stays within `1..=max_ayah + 1`; one past the end means the next continue
/// request reports completion.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct ConversationState {
    pub sura_name: String,
    pub next_start_ayah: u32,
    pub max_ayah: u32,
}

/// One completed exchange. History is owned by the calling layer and passed
/// by reference into every turn.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChatTurn {
    pub user: String,
    pub model: String,
}

/// Tagged intent produced by the classifier. Trivial intents (greeting,
/// farewell, thanks) and `ContinuePrevious` are detected by the orchestrator
/// before the structural rules run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum QueryIntent {
    Greeting,
    Farewell,
    Thanks,
    CanonicalCountQuery,
    HistorySummary,
    ContinuePrevious,
    FullSuraPaginated { sura: String },
    SingleAyah { ayah: u32 },
    AyahRange { sura: String, start: u32, end: u32 },
    SemanticSearch { query: String },
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChatRequest {
    pub session_id: String,
    pub message: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChatResponse {
    pub answer: String,
    /// False when the turn produced no answer (empty-context early exit);
    /// the caller must not append such a turn to history.
    pub answered: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SessionRequest {
    pub session_id: Option<String>,
    pub reset: Option<bool>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SessionResponse {
    pub session_id: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StatusResponse {
    pub status: String,
    pub document_count: usize,
    pub started_at: chrono::DateTime<chrono::Utc>,
}
