//! # ContractLens Core
//!
//! Domain types, traits, and error definitions shared by every ContractLens
//! crate. Nothing here talks to the network: the chat model, the embedding
//! model and the vector database are all reached through traits defined in
//! this crate and implemented elsewhere.
//!
//! ## Layout
//!
//! - [`message`]: messages, roles and conversations
//! - [`provider`]: the LLM [`Provider`] trait (chat completion + embeddings)
//! - [`tool`]: the [`Tool`] trait and the [`ToolRegistry`]
//! - [`retrieval`]: chunk records and the [`VectorStore`] trait
//! - [`event`]: domain events and the broadcast [`EventBus`]

pub mod error;
pub mod event;
pub mod message;
pub mod provider;
pub mod retrieval;
pub mod tool;

pub use error::{Error, ProviderError, Result, RetrievalError, ToolError};
pub use event::{DomainEvent, EventBus};
pub use message::{Conversation, ConversationId, Message, MessageToolCall, Role};
pub use provider::{
    EmbeddingRequest, EmbeddingResponse, Provider, ProviderRequest, ProviderResponse,
    ToolDefinition, Usage,
};
pub use retrieval::{ChunkFilter, ChunkRecord, DocumentInfo, ScoredChunk, VectorStore};
pub use tool::{Tool, ToolCall, ToolRegistry, ToolResult};
