//! # docqa Core
//!
//! Pure retrieval logic for docqa: the document model, attachment
//! categories, sentence chunking, the embedding provider trait, a flat L2
//! vector index, the retriever that ties them together, and prompt
//! composition.
//!
//! This crate contains no tokio, HTTP, or filesystem I/O. Format extraction,
//! network embedding providers and the inference client live in the `docqa`
//! app crate.

pub mod category;
pub mod chunk;
pub mod embedding;
pub mod index;
pub mod models;
pub mod prompt;
pub mod retrieve;
