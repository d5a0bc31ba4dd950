//! Reasoning router - the per-query decision loop
//!
//! THINKING → ACTING → OBSERVING → (THINKING | DONE | FAILED)
//!
//! Each step depends on the previous Observation, so one query runs
//! strictly sequentially. Concurrent queries each get their own trace; the
//! registry, index and provider behind the executor are shared read-only.

use crate::composer::ResponseComposer;
use crate::config::RouterConfig;
use crate::error::RouterError;
use crate::execution::{CapabilityExecutor, ExecutionPolicy};
use crate::extractor::ArgumentExtractor;
use crate::models::{
    Action, Decision, FinalAnswer, InvocationRequest, Observation, Query, ReasoningTrace,
    TraceAction, TraceStep,
};
use crate::planner::{DecisionContext, DecisionModel, DECISION_STEP};
use crate::tools::CapabilityRegistry;
use crate::Result;
use std::fmt;
use std::sync::Arc;
use std::time::Instant;
use tracing::{debug, info, warn};

/// Consecutive unreadable decisions tolerated before falling back.
const MAX_DECISION_RETRIES: u32 = 1;

/// Public view of the loop position, for logs.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RouterState {
    Thinking,
    Acting,
    Observing,
    Done,
    Failed,
}

impl fmt::Display for RouterState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            RouterState::Thinking => "THINKING",
            RouterState::Acting => "ACTING",
            RouterState::Observing => "OBSERVING",
            RouterState::Done => "DONE",
            RouterState::Failed => "FAILED",
        };
        write!(f, "{}", s)
    }
}

/// A chosen invocation travelling from ACTING to OBSERVING.
struct PendingStep {
    thought: Option<String>,
    capability: String,
    instruction: String,
}

impl PendingStep {
    fn into_trace_step(self, observation: Observation) -> TraceStep {
        TraceStep {
            thought: self.thought,
            action: TraceAction::Invoke {
                capability: self.capability,
                instruction: self.instruction,
            },
            observation,
        }
    }
}

/// Loop position together with the data it carries.
enum Phase {
    Thinking,
    Acting(PendingStep),
    Observing(PendingStep, InvocationRequest),
    Done(String),
    Failed(RouterError),
}

impl Phase {
    fn state(&self) -> RouterState {
        match self {
            Phase::Thinking => RouterState::Thinking,
            Phase::Acting(_) => RouterState::Acting,
            Phase::Observing(..) => RouterState::Observing,
            Phase::Done(_) => RouterState::Done,
            Phase::Failed(_) => RouterState::Failed,
        }
    }
}

pub struct ReasoningRouter {
    model: Arc<dyn DecisionModel>,
    registry: Arc<CapabilityRegistry>,
    executor: CapabilityExecutor,
    extractor: ArgumentExtractor,
    composer: ResponseComposer,
    config: RouterConfig,
}

impl ReasoningRouter {
    pub fn new(
        registry: Arc<CapabilityRegistry>,
        model: Arc<dyn DecisionModel>,
        config: RouterConfig,
    ) -> Result<Self> {
        config.validate()?;
        Ok(Self {
            executor: CapabilityExecutor::new(registry.clone(), ExecutionPolicy::from(&config)),
            extractor: ArgumentExtractor::new()?,
            composer: ResponseComposer::new(),
            registry,
            model,
            config,
        })
    }

    pub fn config(&self) -> &RouterConfig {
        &self.config
    }

    /// Answer one query. Never fails: problems end up in the answer text.
    pub async fn process_query(&self, query: Query) -> FinalAnswer {
        let start_time = Instant::now();
        let mut trace = ReasoningTrace::new();
        let mut phase = Phase::Thinking;
        let mut unreadable = 0u32;

        info!(
            query_id = %query.query_id(),
            history_turns = query.history().len(),
            "Router: starting query"
        );

        let answer = loop {
            debug!(query_id = %query.query_id(), state = %phase.state(), steps = trace.action_steps(), "transition");

            phase = match phase {
                Phase::Thinking => match self.think(&query, &trace).await {
                    Ok(Decision {
                        action: Action::Finish { draft },
                        ..
                    }) => Phase::Done(draft),
                    Ok(Decision {
                        thought,
                        action:
                            Action::Invoke {
                                capability,
                                instruction,
                            },
                    }) => {
                        unreadable = 0;
                        if trace.action_steps() >= self.config.max_steps {
                            Phase::Failed(RouterError::BudgetExceeded(self.config.max_steps))
                        } else {
                            Phase::Acting(PendingStep {
                                thought,
                                capability,
                                instruction,
                            })
                        }
                    }
                    Err(e) => {
                        unreadable += 1;
                        warn!(query_id = %query.query_id(), attempt = unreadable, error = %e, "decision step failed");
                        trace.push(TraceStep {
                            thought: None,
                            action: TraceAction::Malformed { raw: e.to_string() },
                            observation: Observation::failed(DECISION_STEP, e.user_message(), 1, 0),
                        });

                        if unreadable > MAX_DECISION_RETRIES {
                            Phase::Done(self.fallback(&query).await)
                        } else {
                            Phase::Thinking
                        }
                    }
                },

                Phase::Acting(step) => match self.prepare(&step) {
                    Ok(request) => Phase::Observing(step, request),
                    Err(e) => {
                        warn!(capability = %step.capability, error = %e, "no invocation for this step");
                        let observation =
                            Observation::failed(step.capability.clone(), e.user_message(), 0, 0);
                        trace.push(step.into_trace_step(observation));
                        Phase::Thinking
                    }
                },

                Phase::Observing(step, request) => {
                    let observation = self.executor.execute(&request).await;
                    debug!(
                        capability = %observation.capability,
                        success = observation.success,
                        attempts = observation.attempts,
                        execution_time_ms = observation.execution_time_ms,
                        "observed"
                    );
                    trace.push(step.into_trace_step(observation));
                    Phase::Thinking
                }

                Phase::Done(draft) => break self.composer.compose(&query, &draft, &trace),

                Phase::Failed(reason) => {
                    warn!(query_id = %query.query_id(), reason = %reason, "run stopped");
                    break self.composer.compose_partial(&query, &trace, &reason);
                }
            };
        };

        info!(
            query_id = %answer.query_id,
            status = %answer.status,
            steps = answer.action_steps,
            capabilities = ?answer.capabilities_used,
            elapsed_ms = start_time.elapsed().as_millis() as u64,
            "Router: query finished"
        );

        answer
    }

    /// One decision under the decision timeout.
    async fn think(&self, query: &Query, trace: &ReasoningTrace) -> Result<Decision> {
        let history = query.history();
        let window = history.len().saturating_sub(self.config.history_turns);
        let context = DecisionContext {
            query,
            history: &history[window..],
            trace,
            capabilities: self.registry.describe_all(),
        };

        tokio::time::timeout(self.config.decision_timeout(), self.model.decide(&context))
            .await
            .unwrap_or_else(|_| {
                Err(RouterError::Llm(format!(
                    "no decision within {} ms",
                    self.config.decision_timeout_ms
                )))
            })
    }

    /// Resolve the capability and extract its arguments.
    fn prepare(&self, step: &PendingStep) -> Result<InvocationRequest> {
        let entry = self.registry.get(&step.capability)?;
        let arguments =
            self.extractor
                .extract(&step.capability, &step.instruction, &entry.descriptor.schema)?;
        Ok(InvocationRequest {
            capability: step.capability.clone(),
            arguments,
        })
    }

    /// Capability-free answer from the question alone.
    async fn fallback(&self, query: &Query) -> String {
        let attempt =
            tokio::time::timeout(self.config.decision_timeout(), self.model.fallback_answer(query))
                .await;

        match attempt {
            Ok(Ok(text)) if !text.trim().is_empty() => text,
            Ok(Err(e)) => {
                warn!(error = %e, "fallback answer failed");
                unanswerable(query)
            }
            _ => unanswerable(query),
        }
    }
}

fn unanswerable(query: &Query) -> String {
    format!(
        "I could not interpret \"{}\" well enough to consult any data source, so no answer \
         could be determined.",
        query.text().trim()
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::RunStatus;
    use crate::planner::{HeuristicDecisionModel, ScriptedDecisionModel};
    use crate::tools::create_default_registry;
    use crate::tools::market_data::{MarketDataProvider, MarketPayload, MarketRequest};
    use crate::tools::retrieval::InMemoryIndex;

    struct Offline;

    #[async_trait::async_trait]
    impl MarketDataProvider for Offline {
        async fn fetch(&self, _request: &MarketRequest) -> Result<MarketPayload> {
            Err(RouterError::ProviderUnavailable("offline".into()))
        }
    }

    async fn router(model: Arc<dyn DecisionModel>, config: RouterConfig) -> ReasoningRouter {
        let index = Arc::new(InMemoryIndex::seeded().await.unwrap());
        let registry = create_default_registry(index, Arc::new(Offline), config.retrieval_k).unwrap();
        ReasoningRouter::new(Arc::new(registry), model, config).unwrap()
    }

    #[tokio::test]
    async fn test_roi_question_with_heuristic_model() {
        let router = router(Arc::new(HeuristicDecisionModel), RouterConfig::default()).await;
        let answer = router
            .process_query(Query::new(
                "Calculate the ROI of an investment of $5000 that is now worth $7500",
                vec![],
            ))
            .await;

        assert_eq!(answer.status, RunStatus::Done);
        assert_eq!(answer.action_steps, 1);
        assert!(answer.text.contains("50.00%"));
    }

    #[tokio::test]
    async fn test_extraction_failure_returns_to_thinking() {
        let model = Arc::new(ScriptedDecisionModel::new([
            r#"{"action": "invoke", "capability": "roi", "instruction": "how did my shares do?"}"#,
            r#"{"action": "invoke", "capability": "roi", "instruction": "bought for 100, worth 150 now"}"#,
            r#"{"action": "finish", "answer": "Your shares returned 50%."}"#,
        ]));
        let router = router(model.clone(), RouterConfig::default()).await;
        let answer = router.process_query(Query::new("my ROI?", vec![])).await;

        assert_eq!(answer.status, RunStatus::Done);
        assert_eq!(answer.action_steps, 2);
        assert_eq!(model.calls(), 3);
        assert_eq!(answer.text, "Your shares returned 50%.");
        assert_eq!(answer.capabilities_used, vec!["roi".to_string()]);
        assert_eq!(answer.attachments[0].rows[3][1], "50.00%");
    }

    #[tokio::test]
    async fn test_unknown_capability_is_an_observation() {
        let model = Arc::new(ScriptedDecisionModel::new([
            r#"{"action": "invoke", "capability": "horoscope", "instruction": "AAPL"}"#,
            r#"{"action": "finish", "answer": "No such lookup exists."}"#,
        ]));
        let router = router(model, RouterConfig::default()).await;
        let answer = router.process_query(Query::new("AAPL stars?", vec![])).await;

        assert_eq!(answer.status, RunStatus::Done);
        assert!(answer.text.contains("there is no capability named 'horoscope'"));
    }

    #[test]
    fn test_state_names() {
        assert_eq!(RouterState::Thinking.to_string(), "THINKING");
        assert_eq!(RouterState::Failed.to_string(), "FAILED");
    }
}
