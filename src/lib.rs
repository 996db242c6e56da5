//! # docqa
//!
//! Document-grounded question answering over a local language model.
//!
//! A user asks a question, optionally attaching a file. The file's text is
//! extracted, split into sentence passages, embedded, and searched for the
//! passages nearest the question; those passages are folded into the prompt
//! sent to an Ollama inference backend.
//!
//! ## Architecture
//!
//! ```text
//! ┌────────────┐   ┌──────────────┐   ┌───────────────────────────┐
//! │ attachment │──▶│  extract     │──▶│ docqa-core                │
//! │ pdf/docx/… │   │ OCR/OOXML/…  │   │ chunk → embed → index     │
//! └────────────┘   └──────────────┘   └────────────┬──────────────┘
//!                                                  │ top-k passages
//!                                                  ▼
//!                  ┌──────────┐   compose   ┌──────────────┐
//!                  │  prompt  │────────────▶│  generate    │──▶ answer
//!                  └──────────┘             │ (Ollama)     │
//!                                           └──────────────┘
//! ```
//!
//! ## Quick Start
//!
//! ```bash
//! docqa serve                                  # HTTP + WebSocket server
//! docqa ask "What is the deadline?" --file memo.docx
//! docqa retrieve "sky colour" --file notes.txt --k 2
//! ```
//!
//! ## Modules
//!
//! | Module | Purpose |
//! |--------|---------|
//! | [`config`] | TOML configuration parsing |
//! | [`error`] | Extraction and generation error types |
//! | [`extract`] | Per-category text extraction |
//! | [`embedding`] | Embedding backends and provider selection |
//! | [`generate`] | Inference backend client |
//! | [`pipeline`] | Extraction → retrieval → generation |
//! | [`connections`] | Live WebSocket registry |
//! | [`server`] | HTTP and WebSocket server |
//!
//! Chunking, vector search, retrieval, and prompt composition are in the
//! `docqa-core` crate.

pub mod config;
pub mod connections;
pub mod embedding;
pub mod error;
pub mod extract;
pub mod generate;
pub mod pipeline;
pub mod server;
