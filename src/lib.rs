//! # ragline
//!
//! A document ingestion and retrieval-augmented generation (RAG) pipeline.
//!
//! ragline converts uploaded files (PDF, DOCX, TXT) into searchable,
//! semantically indexed chunks, and answers user queries by retrieving the
//! most relevant chunks for a single document and streaming a grounded
//! completion from an external chat model.
//!
//! ## Architecture
//!
//! ```text
//! ┌──────────┐   ┌───────────┐   ┌─────────┐   ┌────────────┐
//! │ Extract  │──▶│ Normalize │──▶│  Chunk  │──▶│ Embed+Store │
//! │ PDF/DOCX │   │  + clean  │   │ overlap │   │  (vectors)  │
//! └──────────┘   └───────────┘   └─────────┘   └─────┬──────┘
//!                                                    │
//!                                ┌───────────────────┤
//!                                ▼                   ▼
//!                          ┌──────────┐       ┌────────────┐
//!                          │ Retrieve │──────▶│ Completion │
//!                          │  top-K   │       │  (stream)  │
//!                          └──────────┘       └────────────┘
//! ```
//!
//! ## Modules
//!
//! | Module | Purpose |
//! |--------|---------|
//! | [`config`] | TOML configuration parsing |
//! | [`error`] | Error taxonomy with machine-readable codes |
//! | [`models`] | Core data types |
//! | [`extract`] | Multi-format text extraction |
//! | [`normalize`] | Text cleanup between extraction and chunking |
//! | [`chunk`] | Overlapping, boundary-aware text chunking |
//! | [`embedding`] | Embedding client abstraction + vector utilities |
//! | [`completion`] | Streaming chat completion abstraction |
//! | [`store`] | Vector store abstraction (in-memory, SQLite) |
//! | [`retrieve`] | Top-K similarity retrieval with linear fallback |
//! | [`context`] | Prompt context rendering and citations |
//! | [`pipeline`] | Ingestion and query orchestration |

pub mod chunk;
pub mod completion;
pub mod config;
pub mod context;
pub mod embedding;
pub mod error;
pub mod extract;
pub mod models;
pub mod normalize;
pub mod pipeline;
pub mod retrieve;
pub mod store;

pub use error::PipelineError;
pub use pipeline::Pipeline;
