//! `contractlens chat`: interactive or single-message chat.

use std::io::Write;

use contractlens_agent::{AgentOutcome, ConversationStore, Executor, StopReason};
use contractlens_config::AppConfig;
use contractlens_core::message::{ConversationId, Message};
use tokio::io::{AsyncBufReadExt, BufReader};

use super::bootstrap::Runtime;

pub async fn run(config: AppConfig, message: Option<String>) -> anyhow::Result<()> {
    let runtime = Runtime::build(&config).await?;
    let session = ConversationId::new();

    if let Some(msg) = message {
        let outcome = turn(&runtime.executor, &runtime.conversations, &session, &msg).await?;
        print_outcome(&outcome);
        return Ok(());
    }

    println!();
    println!("  ContractLens interactive chat");
    println!("  Model:  {}", runtime.executor.model());
    println!("  Tools:  {}", runtime.executor.tools().names().join(", "));
    println!("  Type 'exit' or Ctrl+D to quit.");
    println!();

    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    loop {
        print!("  You > ");
        std::io::stdout().flush()?;

        let Some(line) = lines.next_line().await? else {
            break;
        };
        let line = line.trim();
        if line.is_empty() {
            continue;
        }
        if matches!(line, "exit" | "quit") {
            break;
        }

        match turn(&runtime.executor, &runtime.conversations, &session, line).await {
            Ok(outcome) => print_outcome(&outcome),
            Err(e) => eprintln!("  [Error] {e}"),
        }
    }

    println!();
    Ok(())
}

/// One question and answer, stored in the session only when the run succeeds.
async fn turn(
    executor: &Executor,
    store: &ConversationStore,
    session: &ConversationId,
    question: &str,
) -> anyhow::Result<AgentOutcome> {
    let history = store.history(session).await;
    let outcome = executor.run(session, &history, question).await?;
    store.append(session, Message::user(question)).await;
    store.append(session, Message::assistant(&outcome.answer)).await;
    Ok(outcome)
}

fn print_outcome(outcome: &AgentOutcome) {
    println!();
    for line in outcome.answer.lines() {
        println!("  Assistant > {line}");
    }
    if outcome.stop_reason == StopReason::CallLimit {
        println!("  (stopped at the tool-call limit)");
    }
    println!();
}
