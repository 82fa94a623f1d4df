//! Retrieval for ContractLens: chunking, ingestion, vector stores and the
//! query-side retrieval client.

pub mod backend;
pub mod catalog;
pub mod client;
pub mod in_memory;
pub mod ingest;
pub mod pinecone;
pub mod similarity;
pub mod splitter;

#[cfg(feature = "postgres")]
pub mod pgvector;

#[cfg(any(test, feature = "testing"))]
pub mod testing;

pub use backend::build_vector_store;
pub use catalog::DocumentCatalog;
pub use client::{MAX_TOP_K, RetrievalClient, embed_texts};
pub use in_memory::InMemoryVectorStore;
pub use ingest::{IngestReport, IngestRequest, Ingestor};
pub use pinecone::PineconeVectorStore;
pub use similarity::cosine_similarity;
pub use splitter::TextSplitter;

#[cfg(feature = "postgres")]
pub use pgvector::PgVectorStore;
