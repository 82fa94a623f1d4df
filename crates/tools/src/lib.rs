//! Tools the ContractLens agent can call.
//!
//! The model answers questions about contracts by searching their text,
//! listing what has been ingested, and doing date arithmetic for notice
//! periods and renewal deadlines.

pub mod date_calculator;
pub mod list_documents;
pub mod search_contract;

use std::sync::Arc;
use std::time::Duration;

use contractlens_core::tool::ToolRegistry;
use contractlens_retrieval::{DocumentCatalog, RetrievalClient};

pub use date_calculator::DateCalculatorTool;
pub use list_documents::ListDocumentsTool;
pub use search_contract::SearchContractTool;

/// Registry with every built-in tool, each call bounded by `timeout`.
pub fn default_registry(
    retrieval: Arc<RetrievalClient>,
    catalog: Arc<DocumentCatalog>,
    timeout: Duration,
) -> ToolRegistry {
    let mut registry = ToolRegistry::new().with_timeout(timeout);
    registry.register(Box::new(SearchContractTool::new(retrieval)));
    registry.register(Box::new(ListDocumentsTool::new(catalog)));
    registry.register(Box::new(DateCalculatorTool));
    registry
}
