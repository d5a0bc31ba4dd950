//! End-to-end runs of `process_query` with stub collaborators.

use chrono::Utc;
use financial_query_router::planner::{DecisionModel, HeuristicDecisionModel, ScriptedDecisionModel};
use financial_query_router::tools::create_default_registry;
use financial_query_router::tools::market_data::{
    MarketDataProvider, MarketPayload, MarketRequest, PriceQuote,
};
use financial_query_router::tools::retrieval::InMemoryIndex;
use financial_query_router::{
    Query, ReasoningRouter, Result, RouterConfig, RouterError, RunStatus, Turn,
};
use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::Arc;
use std::time::Duration;

enum Mode {
    Quote(f64),
    Unavailable,
    /// Rate limit the first `times` calls, then quote `price`.
    RateLimited { times: u32, price: f64 },
    Stalled,
}

struct StubProvider {
    mode: Mode,
    calls: AtomicU32,
}

impl StubProvider {
    fn new(mode: Mode) -> Arc<Self> {
        Arc::new(Self {
            mode,
            calls: AtomicU32::new(0),
        })
    }

    fn calls(&self) -> u32 {
        self.calls.load(Ordering::SeqCst)
    }
}

fn quote(request: &MarketRequest, price: f64) -> MarketPayload {
    MarketPayload::CurrentPrice(PriceQuote {
        ticker: request.ticker.clone(),
        price,
        currency: "USD".to_string(),
        timestamp: Utc::now(),
        change_percent: Some(0.8),
    })
}

#[async_trait::async_trait]
impl MarketDataProvider for StubProvider {
    async fn fetch(&self, request: &MarketRequest) -> Result<MarketPayload> {
        let call = self.calls.fetch_add(1, Ordering::SeqCst) + 1;
        match &self.mode {
            Mode::Quote(price) => Ok(quote(request, *price)),
            Mode::Unavailable => Err(RouterError::ProviderUnavailable("connection refused".into())),
            Mode::RateLimited { times, price } => {
                if call <= *times {
                    Err(RouterError::RateLimited("429".into()))
                } else {
                    Ok(quote(request, *price))
                }
            }
            Mode::Stalled => {
                tokio::time::sleep(Duration::from_secs(5)).await;
                Ok(quote(request, 1.0))
            }
        }
    }
}

fn test_config() -> RouterConfig {
    RouterConfig {
        invocation_timeout_ms: 1_000,
        backoff_base_ms: 1,
        ..RouterConfig::default()
    }
}

async fn build_router(
    provider: Arc<StubProvider>,
    model: Arc<dyn DecisionModel>,
    config: RouterConfig,
) -> ReasoningRouter {
    let index = Arc::new(InMemoryIndex::seeded().await.unwrap());
    let registry = create_default_registry(index, provider, config.retrieval_k).unwrap();
    ReasoningRouter::new(Arc::new(registry), model, config).unwrap()
}

async fn heuristic_router(provider: Arc<StubProvider>) -> ReasoningRouter {
    build_router(provider, Arc::new(HeuristicDecisionModel), test_config()).await
}

// ===== Concrete scenarios =====

#[tokio::test]
async fn roi_question_states_a_fifty_percent_return() {
    let router = heuristic_router(StubProvider::new(Mode::Quote(100.0))).await;
    let answer = router
        .process_query(Query::new(
            "Calculate the ROI of an investment of $5000 that is now worth $7500",
            vec![],
        ))
        .await;

    assert_eq!(answer.status, RunStatus::Done);
    assert_eq!(answer.action_steps, 1);
    assert_eq!(answer.capabilities_used, vec!["roi".to_string()]);
    assert!(answer.text.contains("50.00%"), "{}", answer.text);
}

#[tokio::test]
async fn loan_question_uses_monthly_amortization() {
    let router = heuristic_router(StubProvider::new(Mode::Quote(100.0))).await;
    let answer = router
        .process_query(Query::new(
            "What is the monthly payment on a $20000 loan at 6% annual interest over 4 years?",
            vec![],
        ))
        .await;

    assert_eq!(answer.status, RunStatus::Done);
    assert_eq!(answer.capabilities_used, vec!["loan_payment".to_string()]);
    assert!(answer.text.contains("$469.70"), "{}", answer.text);
    assert!(answer.text.contains("48 payments"));
    assert!(answer
        .attachments
        .iter()
        .any(|a| a.title.starts_with("Amortization schedule")));
}

#[tokio::test]
async fn definitional_question_finishes_after_one_retrieval() {
    let router = heuristic_router(StubProvider::new(Mode::Quote(100.0))).await;
    let answer = router
        .process_query(Query::new("What is the current ratio?", vec![]))
        .await;

    assert_eq!(answer.status, RunStatus::Done);
    assert_eq!(answer.action_steps, 1);
    assert_eq!(answer.capabilities_used, vec!["knowledge_search".to_string()]);
    assert!(answer.text.contains("Financial ratios"), "{}", answer.text);
    assert!(answer.attachments.iter().any(|a| a.title == "Sources"));
}

#[tokio::test]
async fn chained_price_then_roi_finishes_within_three_steps() {
    let provider = StubProvider::new(Mode::Quote(190.0));
    let router = heuristic_router(provider.clone()).await;
    let answer = router
        .process_query(Query::new(
            "I bought AAPL at $150. What is my ROI at today's price?",
            vec![],
        ))
        .await;

    assert_eq!(answer.status, RunStatus::Done);
    assert!((2..=3).contains(&answer.action_steps));
    assert_eq!(
        answer.capabilities_used,
        vec!["market_data".to_string(), "roi".to_string()]
    );
    assert!(answer.text.contains("26.67%"), "{}", answer.text);
    assert!(answer.attachments.iter().any(|a| a.title == "Market data"));
    assert_eq!(provider.calls(), 1);
}

// ===== Failure containment =====

#[tokio::test]
async fn provider_outage_becomes_an_observation() {
    let router = heuristic_router(StubProvider::new(Mode::Unavailable)).await;
    let answer = router
        .process_query(Query::new("What is the share price of MSFT?", vec![]))
        .await;

    assert_eq!(answer.status, RunStatus::Done);
    assert!(answer
        .text
        .contains("market data: the market data service is currently unavailable"));
    assert!(!answer.text.contains("connection refused"));
}

#[tokio::test]
async fn overflowing_calculation_is_reported_not_blank() {
    let router = heuristic_router(StubProvider::new(Mode::Quote(1.0))).await;
    let answer = router
        .process_query(Query::new(
            "What will $1000 compound to at 50% for 5000 years?",
            vec![],
        ))
        .await;

    assert_eq!(answer.status, RunStatus::Done);
    assert!(!answer.capabilities_used.contains(&"compound_interest".to_string()));
    assert!(
        answer
            .text
            .contains("- compound interest: the value for result is not usable"),
        "{}",
        answer.text
    );
    assert!(answer.text.contains("too large to represent"));
}

#[tokio::test]
async fn words_containing_formula_names_stay_definitional() {
    let router = heuristic_router(StubProvider::new(Mode::Quote(1.0))).await;
    let answer = router
        .process_query(Query::new("What is the duration of a 10 year bond?", vec![]))
        .await;

    assert_eq!(answer.status, RunStatus::Done);
    assert_eq!(answer.action_steps, 1);
    assert_eq!(answer.capabilities_used, vec!["knowledge_search".to_string()]);
    assert!(!answer.text.contains("Could not be determined"), "{}", answer.text);
}

#[tokio::test]
async fn step_budget_ends_in_failed_with_partial_answer() {
    let invoke = r#"{"action": "invoke", "capability": "roi", "instruction": "initial 200 final 300"}"#;
    let model = Arc::new(ScriptedDecisionModel::new(vec![invoke; 10]));
    let config = RouterConfig {
        max_steps: 3,
        ..test_config()
    };
    let router = build_router(StubProvider::new(Mode::Quote(1.0)), model.clone(), config).await;

    let answer = router
        .process_query(Query::new("keep calculating", vec![]))
        .await;

    assert_eq!(answer.status, RunStatus::Failed);
    assert_eq!(answer.action_steps, 3);
    assert_eq!(model.calls(), 4);
    assert!(answer.text.contains("needed more than 3 lookups"));
    assert!(answer.text.contains("50.00%"), "{}", answer.text);
}

#[tokio::test]
async fn unreadable_decision_is_retried_once() {
    let model = Arc::new(ScriptedDecisionModel::new([
        "Let me think about that...",
        r#"{"action": "invoke", "capability": "roi", "instruction": "initial 200 final 300"}"#,
        r#"{"action": "finish", "answer": "The ROI is 50%."}"#,
    ]));
    let router = build_router(StubProvider::new(Mode::Quote(1.0)), model.clone(), test_config()).await;

    let answer = router.process_query(Query::new("ROI of 200 to 300", vec![])).await;

    assert_eq!(answer.status, RunStatus::Done);
    assert_eq!(answer.text, "The ROI is 50%.");
    assert_eq!(answer.action_steps, 1);
    assert_eq!(model.calls(), 3);
}

#[tokio::test]
async fn repeated_unreadable_decisions_fall_back_without_capabilities() {
    let model = Arc::new(
        ScriptedDecisionModel::new(["not json", "{\"action\": \"ponder\"}"])
            .with_fallback("A bond is a loan to an issuer that pays interest."),
    );
    let router = build_router(StubProvider::new(Mode::Quote(1.0)), model.clone(), test_config()).await;

    let answer = router.process_query(Query::new("What is a bond?", vec![])).await;

    assert_eq!(answer.status, RunStatus::Done);
    assert_eq!(answer.action_steps, 0);
    assert_eq!(model.calls(), 2);
    assert_eq!(answer.text, "A bond is a loan to an issuer that pays interest.");
}

#[tokio::test]
async fn failed_fallback_still_explains_itself() {
    let model = Arc::new(ScriptedDecisionModel::new(["?", "??"]));
    let router = build_router(StubProvider::new(Mode::Quote(1.0)), model, test_config()).await;

    let answer = router.process_query(Query::new("What is a bond?", vec![])).await;

    assert_eq!(answer.status, RunStatus::Done);
    assert!(answer.text.contains("could not interpret \"What is a bond?\""));
}

// ===== Timeouts and backoff =====

#[tokio::test]
async fn slow_provider_times_out_into_an_observation() {
    let config = RouterConfig {
        invocation_timeout_ms: 50,
        ..test_config()
    };
    let router = build_router(
        StubProvider::new(Mode::Stalled),
        Arc::new(HeuristicDecisionModel),
        config,
    )
    .await;

    let answer = router
        .process_query(Query::new("What is the share price of MSFT?", vec![]))
        .await;

    assert_eq!(answer.status, RunStatus::Done);
    assert!(answer.text.contains("took too long"), "{}", answer.text);
}

#[tokio::test]
async fn slow_decision_times_out_and_falls_back() {
    let model = Arc::new(
        ScriptedDecisionModel::new([r#"{"action": "finish", "answer": "late"}"#; 2])
            .with_delay(Duration::from_millis(500))
            .with_fallback("Answered without lookups."),
    );
    let config = RouterConfig {
        decision_timeout_ms: 20,
        ..test_config()
    };
    let router = build_router(StubProvider::new(Mode::Quote(1.0)), model.clone(), config).await;

    let answer = router.process_query(Query::new("anything", vec![])).await;

    assert_eq!(answer.status, RunStatus::Done);
    assert_eq!(answer.text, "Answered without lookups.");
    assert_eq!(model.calls(), 2);
}

#[tokio::test]
async fn rate_limits_are_retried_with_backoff() {
    let provider = StubProvider::new(Mode::RateLimited {
        times: 2,
        price: 410.5,
    });
    let router = heuristic_router(provider.clone()).await;

    let answer = router
        .process_query(Query::new("What is the share price of MSFT?", vec![]))
        .await;

    assert_eq!(answer.status, RunStatus::Done);
    assert_eq!(answer.action_steps, 1);
    assert_eq!(provider.calls(), 3);
    assert!(answer.text.contains("MSFT is trading at 410.50 USD"), "{}", answer.text);
}

#[tokio::test]
async fn rate_limit_retries_are_bounded() {
    let provider = StubProvider::new(Mode::RateLimited {
        times: 100,
        price: 1.0,
    });
    let router = heuristic_router(provider.clone()).await;

    let answer = router
        .process_query(Query::new("What is the share price of MSFT?", vec![]))
        .await;

    assert_eq!(answer.status, RunStatus::Done);
    assert_eq!(provider.calls(), 3);
    assert!(answer.text.contains("rate limiting"), "{}", answer.text);
}

// ===== Isolation =====

#[tokio::test]
async fn concurrent_queries_keep_separate_traces() {
    let router = Arc::new(heuristic_router(StubProvider::new(Mode::Quote(100.0))).await);
    let history = vec![
        Turn::user("What is ROI?"),
        Turn::assistant("Return on investment."),
    ];

    let (roi, definition) = tokio::join!(
        router.process_query(Query::new(
            "Calculate the ROI of an investment of $5000 that is now worth $7500",
            history.clone(),
        )),
        router.process_query(Query::new("What is the current ratio?", history)),
    );

    assert_eq!(roi.capabilities_used, vec!["roi".to_string()]);
    assert_eq!(
        definition.capabilities_used,
        vec!["knowledge_search".to_string()]
    );
    assert_ne!(roi.query_id, definition.query_id);
}
