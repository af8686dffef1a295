use anyhow::{Context, Result};
use clap::Parser;
use tracing_subscriber::EnvFilter;

use kuran_chatbot::config::AppConfig;
use kuran_chatbot::corpus::CorpusStore;
use kuran_chatbot::ollama::OllamaClient;
use kuran_chatbot::qdrant_store::{QdrantPoint, QdrantStore, VersePayload};

#[derive(Parser, Debug)]
#[command(name = "index")]
#[command(about = "Embed the corpus and load it into the Qdrant collection")]
struct Cli {
    /// Drop and recreate the collection before loading.
    #[arg(long, default_value_t = false)]
    rebuild: bool,
    /// Points per upsert request.
    #[arg(long, default_value_t = 64)]
    batch_size: usize,
}

#[tokio::main]
async fn main() -> Result<()> {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    tracing_subscriber::fmt().with_env_filter(filter).init();

    let cli = Cli::parse();
    let config = AppConfig::from_env();

    let corpus = CorpusStore::load(&config.corpus_path).with_context(|| {
        format!("failed loading corpus at {}", config.corpus_path.display())
    })?;
    tracing::info!(documents = corpus.len(), "corpus loaded");

    let ollama = OllamaClient::new(config.ollama_base_url.clone());
    let qdrant = QdrantStore::new(
        config.qdrant_base_url.clone(),
        config.qdrant_collection.clone(),
    );

    let mut batch: Vec<QdrantPoint> = Vec::with_capacity(cli.batch_size);
    let mut rebuilt = !cli.rebuild;
    let mut indexed = 0u64;

    for (id, document) in corpus.documents().iter().enumerate() {
        let vector = ollama
            .embed(&config.models.embedding_model, &document.content)
            .await
            .with_context(|| {
                format!(
                    "failed embedding {} {}:{}",
                    document.kind.as_str(),
                    document.sura_name,
                    document.ayah_number
                )
            })?;

        if !rebuilt {
            qdrant.recreate_collection(vector.len()).await?;
            rebuilt = true;
        }

        batch.push(QdrantPoint {
            id: id as u64,
            vector,
            payload: VersePayload::from_document(document),
        });

        if batch.len() >= cli.batch_size {
            qdrant.upsert_points(&batch).await?;
            indexed += batch.len() as u64;
            tracing::info!(indexed, total = corpus.len(), "upserted batch");
            batch.clear();
        }
    }

    if !batch.is_empty() {
        qdrant.upsert_points(&batch).await?;
        indexed += batch.len() as u64;
    }

    tracing::info!(indexed, "indexing complete");
    Ok(())
}
