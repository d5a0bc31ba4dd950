use financial_query_router::{
    gemini::GeminiClient,
    memory::{ContextConfig, ContextManager, ConversationHistory},
    planner::{DecisionModel, HeuristicDecisionModel, LlmDecisionModel},
    tools::{
        create_default_registry, market_data::HttpMarketDataProvider, retrieval::InMemoryIndex,
    },
    Query, ReasoningRouter, RouterConfig,
};
use std::sync::Arc;
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    // Load environment variables
    dotenv::dotenv().ok();

    // Logs go to stderr so answers stay readable on stdout
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .with_writer(std::io::stderr)
        .init();

    let config = RouterConfig::from_env()?;
    info!(
        max_steps = config.max_steps,
        invocation_timeout_ms = config.invocation_timeout_ms,
        "Financial query router starting"
    );

    let index = Arc::new(InMemoryIndex::seeded().await?);
    let provider = Arc::new(HttpMarketDataProvider::new(
        config.market_data_base_url.clone(),
        config.invocation_timeout(),
    )?);
    if config.market_data_base_url.is_none() {
        warn!("MARKET_DATA_BASE_URL not set; market data lookups will report unavailable");
    }
    let registry = Arc::new(create_default_registry(index, provider, config.retrieval_k)?);

    let model: Arc<dyn DecisionModel> = match &config.gemini_api_key {
        Some(key) => Arc::new(LlmDecisionModel::new(GeminiClient::new(key.clone())?)),
        None => {
            warn!("GEMINI_API_KEY not set; using the rule-based decision model");
            Arc::new(HeuristicDecisionModel)
        }
    };

    let context = ContextManager::with_config(ContextConfig {
        max_turns: config.history_turns,
        ..ContextConfig::default()
    });
    let router = ReasoningRouter::new(registry, model, config)?;
    let mut history = ConversationHistory::new();

    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    let mut stdout = tokio::io::stdout();
    stdout
        .write_all(b"Ask a financial question (\"exit\" to quit).\n")
        .await?;

    loop {
        stdout.write_all(b"\n> ").await?;
        stdout.flush().await?;

        let Some(line) = lines.next_line().await? else {
            break;
        };
        let text = line.trim();
        if text.is_empty() {
            continue;
        }
        if text.eq_ignore_ascii_case("exit") || text.eq_ignore_ascii_case("quit") {
            break;
        }

        let query = Query::new(text, context.select_turns(&history));
        let answer = router.process_query(query).await;

        let rendered = format!(
            "\n{}\n\n[{} after {} step(s)]\n",
            answer.render(),
            answer.status,
            answer.action_steps
        );
        stdout.write_all(rendered.as_bytes()).await?;

        history.record_exchange(text, &answer.text);
    }

    info!(messages = history.message_count(), "session ended");
    Ok(())
}
