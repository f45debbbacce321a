//! Business logic services.

pub mod chat;
pub mod chunker;
pub mod embedding;
pub mod llm;
pub mod memory;
pub mod rag;
pub mod registry;
pub mod space;
pub mod vector_store;
