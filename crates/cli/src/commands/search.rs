//! `contractlens search`: query the vector store without the agent.

use contractlens_config::AppConfig;
use contractlens_core::retrieval::ChunkFilter;

use super::bootstrap::Runtime;

pub async fn run(
    config: AppConfig,
    query: String,
    top_k: Option<usize>,
    document_id: Option<String>,
) -> anyhow::Result<()> {
    let runtime = Runtime::build(&config).await?;
    let results = runtime
        .retrieval
        .retrieve(&query, top_k, &ChunkFilter { document_id })
        .await?;

    if results.is_empty() {
        println!("No matching passages.");
        return Ok(());
    }
    for (rank, chunk) in results.iter().enumerate() {
        println!(
            "{}. [{:.3}] {} #{} ({})",
            rank + 1,
            chunk.score,
            chunk.title,
            chunk.chunk_index,
            chunk.document_id
        );
        for line in chunk.text.lines() {
            println!("     {line}");
        }
        println!();
    }
    Ok(())
}
