use std::env;
use std::path::PathBuf;

#[derive(Clone, Debug)]
pub struct ModelConfig {
    pub answer_model: String,
    pub embedding_model: String,
}

#[derive(Clone, Debug)]
pub struct AppConfig {
    pub bind_addr: String,
    pub corpus_path: PathBuf,
    pub ollama_base_url: String,
    pub qdrant_base_url: String,
    pub qdrant_collection: String,
    pub gemini_base_url: String,
    pub gemini_api_key: String,
    pub models: ModelConfig,
}

impl AppConfig {
    pub fn from_env() -> Self {
        let gemini_api_key = env::var("GEMINI_API_KEY").unwrap_or_default();
        if gemini_api_key.is_empty() {
            tracing::warn!("GEMINI_API_KEY is not set; generation calls will be rejected upstream");
        }

        Self {
            bind_addr: env::var("KURAN_CHATBOT_BIND")
                .unwrap_or_else(|_| "127.0.0.1:8080".to_string()),
            corpus_path: env::var("KURAN_CHATBOT_CORPUS")
                .map(PathBuf::from)
                .unwrap_or_else(|_| PathBuf::from("./data/processed_kuran_documents.json")),
            ollama_base_url: env::var("OLLAMA_BASE_URL")
                .unwrap_or_else(|_| "http://127.0.0.1:11434".to_string()),
            qdrant_base_url: env::var("QDRANT_BASE_URL")
                .unwrap_or_else(|_| "http://127.0.0.1:6333".to_string()),
            qdrant_collection: env::var("QDRANT_COLLECTION")
                .unwrap_or_else(|_| "kuran_verses".to_string()),
            gemini_base_url: env::var("GEMINI_BASE_URL")
                .unwrap_or_else(|_| "https://generativelanguage.googleapis.com".to_string()),
            gemini_api_key,
            models: ModelConfig {
                answer_model: env::var("ANSWER_MODEL")
                    .unwrap_or_else(|_| "gemini-2.5-flash".to_string()),
                embedding_model: env::var("EMBEDDING_MODEL")
                    .unwrap_or_else(|_| "bge-m3".to_string()),
            },
        }
    }
}
