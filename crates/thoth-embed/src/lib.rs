//! thoth-embed — local dense embeddings for C6 RAGIndex's chunk index.
//!
//! Pure Rust, Candle-backed inference against a BERT-family model pulled
//! from Hugging Face Hub. No external embedding API, no Python dependency.
//!
//! # Features
//! - Defaults to `BAAI/bge-small-en-v1.5` (384-dim), matching
//!   `thoth_config::EmbeddingConfig`/`thoth_db::EMBEDDING_DIM`
//! - GPU support (CUDA, Metal) with automatic fallback to CPU
//! - Batched inference for throughput
//! - L2-normalized embeddings for cosine similarity
//!
//! # Example
//! ```rust
//! use thoth_embed::{LocalEmbedder, EmbeddingConfig};
//!
//! #[tokio::main]
//! async fn main() -> anyhow::Result<()> {
//!     let embedder = LocalEmbedder::new(EmbeddingConfig::default()).await?;
//!
//!     let texts = vec![
//!         "Attention Is All You Need".to_string(),
//!         "A transformer architecture for sequence modeling".to_string(),
//!     ];
//!
//!     let embeddings = embedder.embed(&texts).await?;
//!     println!("Embedding dimension: {}", embeddings[0].len()); // 384
//!
//!     Ok(())
//! }
//! ```

pub mod batch;
pub mod config;
pub mod embedder;
pub mod error;
pub mod pooling;

pub use config::EmbeddingConfig;
pub use embedder::LocalEmbedder;
pub use error::{EmbedError, Result};
pub use pooling::PoolingStrategy;
