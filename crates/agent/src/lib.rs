//! The ContractLens agent: the tool-calling reasoning loop and the
//! per-session conversation history it runs against.
//!
//! A chat turn goes:
//!
//! 1. **Lock** the session ([`ConversationStore::turn_lock`])
//! 2. **Build context**: system prompt + stored history + the new message
//! 3. **Call the LLM** with every tool declaration
//! 4. **If tool calls**: run them concurrently, feed results back, go to 3
//! 5. **If text**: store the question and answer, return the answer
//!
//! The loop also stops at the iteration and tool-call ceilings, in which
//! case the model is asked once more, without tools, for a best-effort
//! answer.

pub mod conversation_store;
pub mod executor;

#[cfg(any(test, feature = "testing"))]
pub mod testing;

pub use conversation_store::{ConversationStore, ConversationSummary};
pub use executor::{AgentOutcome, Executor, StopReason, ToolInvocation, truncate_output};
