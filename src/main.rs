use std::sync::Arc;

use anyhow::{Context, Result};
use tracing_subscriber::EnvFilter;

use kuran_chatbot::chat::ChatService;
use kuran_chatbot::corpus::CorpusStore;
use kuran_chatbot::gemini::GeminiClient;
use kuran_chatbot::ollama::OllamaClient;
use kuran_chatbot::qdrant_store::QdrantStore;
use kuran_chatbot::retrieval::MmrRetriever;
use kuran_chatbot::retry::{BackoffPolicy, TokioClock};
use kuran_chatbot::{run_server, AppConfig};

#[tokio::main]
async fn main() -> Result<()> {
    init_tracing();

    let config = AppConfig::from_env();

    let corpus = CorpusStore::load(&config.corpus_path).with_context(|| {
        format!(
            "cannot start without the corpus at {}",
            config.corpus_path.display()
        )
    })?;
    tracing::info!(documents = corpus.len(), "corpus loaded");

    let ollama = OllamaClient::new(config.ollama_base_url.clone());
    let qdrant = QdrantStore::new(
        config.qdrant_base_url.clone(),
        config.qdrant_collection.clone(),
    );
    let retriever = MmrRetriever::new(ollama, qdrant, config.models.embedding_model.clone());
    retriever
        .sanity_check()
        .await
        .context("semantic retrieval is not serving results")?;

    let generation = GeminiClient::new(
        config.gemini_base_url.clone(),
        config.gemini_api_key.clone(),
        config.models.answer_model.clone(),
    );

    let document_count = corpus.len();
    let chat = Arc::new(ChatService::new(
        Arc::new(corpus),
        Arc::new(retriever),
        Arc::new(generation),
        Arc::new(TokioClock),
        BackoffPolicy::default(),
    ));

    run_server(config, chat, document_count).await
}

fn init_tracing() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    tracing_subscriber::fmt().with_env_filter(filter).init();
}
