pub mod canon;
pub mod chat;
pub mod classify;
pub mod config;
pub mod context;
pub mod corpus;
pub mod error;
pub mod gemini;
pub mod models;
pub mod ollama;
pub mod pagination;
pub mod qdrant_store;
pub mod retrieval;
pub mod retry;
pub mod server;

pub use config::AppConfig;
pub use server::run_server;
