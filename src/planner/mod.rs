//! Decision models
//!
//! A decision model looks at the query, the recent conversation and the
//! trace so far, then either names one capability to invoke next or
//! finishes with a draft answer. The router owns the loop; models only decide.

use crate::classifier::{Intent, IntentClassifier};
use crate::error::RouterError;
use crate::models::{Decision, Query, ReasoningTrace, TraceAction, Turn};
use crate::tools::{market_data, retrieval, CapabilityDescriptor};
use crate::Result;
use async_trait::async_trait;
use serde_json::Value;
use std::collections::VecDeque;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;
use tokio::sync::Mutex;

pub mod llm;
pub use llm::{LlmDecisionModel, TextCompletion};

/// Capability name recorded on Observations of failed decision steps.
pub const DECISION_STEP: &str = "decision";

/// Everything a decision may look at. Borrowed from the running router.
pub struct DecisionContext<'a> {
    pub query: &'a Query,
    /// Most recent prior turns, oldest first.
    pub history: &'a [Turn],
    pub trace: &'a ReasoningTrace,
    pub capabilities: Vec<&'a CapabilityDescriptor>,
}

/// Trait for choosing the next action (LLM or rule driven)
#[async_trait]
pub trait DecisionModel: Send + Sync {
    async fn decide(&self, context: &DecisionContext<'_>) -> Result<Decision>;

    /// Answer from the question alone, used once decisions keep failing.
    async fn fallback_answer(&self, query: &Query) -> Result<String>;
}

fn text_field<'a>(json: &'a Value, name: &str) -> Option<&'a str> {
    json.get(name)
        .and_then(Value::as_str)
        .map(str::trim)
        .filter(|s| !s.is_empty())
}

/// Parse raw model output into a decision.
///
/// Accepts `{"action":"invoke","capability":..,"instruction":..}` or
/// `{"action":"finish","answer":..}`, optionally inside a ```json fence and
/// with a `"thought"`. Anything else is a `RoutingFormat` error.
pub fn parse_decision(raw: &str) -> Result<Decision> {
    let cleaned = raw
        .trim()
        .trim_start_matches("```json")
        .trim_start_matches("```")
        .trim_end_matches("```")
        .trim();

    let json: Value = serde_json::from_str(cleaned).map_err(|e| {
        RouterError::RoutingFormat(format!("not JSON ({}) | raw={}", e, raw.trim()))
    })?;

    let action = text_field(&json, "action")
        .ok_or_else(|| RouterError::RoutingFormat(format!("no action | raw={}", raw.trim())))?;

    let decision = match action.to_ascii_lowercase().as_str() {
        "invoke" => {
            let capability = text_field(&json, "capability").ok_or_else(|| {
                RouterError::RoutingFormat("invoke without a capability".to_string())
            })?;
            let instruction = text_field(&json, "instruction").ok_or_else(|| {
                RouterError::RoutingFormat("invoke without an instruction".to_string())
            })?;
            Decision::invoke(capability, instruction)
        }
        "finish" => {
            let answer = text_field(&json, "answer")
                .or_else(|| text_field(&json, "draft"))
                .ok_or_else(|| RouterError::RoutingFormat("finish without an answer".to_string()))?;
            Decision::finish(answer)
        }
        other => {
            return Err(RouterError::RoutingFormat(format!(
                "unknown action '{}'",
                other
            )))
        }
    };

    Ok(match text_field(&json, "thought") {
        Some(thought) => decision.with_thought(thought),
        None => decision,
    })
}

// ===== Scripted model =====

/// Replays canned raw outputs in order. For tests and demos.
pub struct ScriptedDecisionModel {
    outputs: Mutex<VecDeque<String>>,
    fallback: Option<String>,
    delay: Option<Duration>,
    calls: AtomicUsize,
}

impl ScriptedDecisionModel {
    pub fn new<I, S>(outputs: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            outputs: Mutex::new(outputs.into_iter().map(Into::into).collect()),
            fallback: None,
            delay: None,
            calls: AtomicUsize::new(0),
        }
    }

    pub fn with_fallback(mut self, answer: impl Into<String>) -> Self {
        self.fallback = Some(answer.into());
        self
    }

    /// Sleep before every decision.
    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = Some(delay);
        self
    }

    /// Number of `decide` calls so far.
    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl DecisionModel for ScriptedDecisionModel {
    async fn decide(&self, _context: &DecisionContext<'_>) -> Result<Decision> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        if let Some(delay) = self.delay {
            tokio::time::sleep(delay).await;
        }

        let next = self.outputs.lock().await.pop_front();
        match next {
            Some(raw) => parse_decision(&raw),
            None => Err(RouterError::RoutingFormat(
                "no scripted output left".to_string(),
            )),
        }
    }

    async fn fallback_answer(&self, _query: &Query) -> Result<String> {
        self.fallback
            .clone()
            .ok_or_else(|| RouterError::Llm("no fallback answer scripted".to_string()))
    }
}

// ===== Heuristic model =====

/// Rule-driven model used when no language model is configured.
///
/// Classifies the question once, walks the capability plan for that intent
/// and finishes when every planned step has succeeded. A failed step is
/// followed by one knowledge search so the answer can at least explain the
/// concept. Drafts are left empty for the composer to fill from the trace.
pub struct HeuristicDecisionModel;

fn plan(intent: Intent) -> Vec<&'static str> {
    match intent {
        Intent::Definitional => vec![retrieval::CAPABILITY_NAME],
        Intent::MarketData(_) => vec![market_data::CAPABILITY_NAME],
        Intent::Calculation(formula) => vec![formula.capability_name()],
        Intent::PriceThenCalculation(formula) => {
            vec![market_data::CAPABILITY_NAME, formula.capability_name()]
        }
    }
}

fn attempted(trace: &ReasoningTrace, capability: &str) -> bool {
    trace.steps().iter().any(|step| {
        matches!(&step.action, TraceAction::Invoke { capability: c, .. } if c == capability)
    })
}

/// Latest quoted price in the trace, if any.
fn fetched_price(trace: &ReasoningTrace) -> Option<f64> {
    trace
        .last_success_of(market_data::CAPABILITY_NAME)
        .and_then(|o| o.payload.as_ref())
        .and_then(|p| p.get("price"))
        .and_then(Value::as_f64)
}

#[async_trait]
impl DecisionModel for HeuristicDecisionModel {
    async fn decide(&self, context: &DecisionContext<'_>) -> Result<Decision> {
        let text = context.query.text();
        let trace = context.trace;
        let intent = IntentClassifier::classify(text);

        for capability in plan(intent) {
            if trace.last_success_of(capability).is_some() {
                continue;
            }

            if attempted(trace, capability) {
                if capability != retrieval::CAPABILITY_NAME
                    && !attempted(trace, retrieval::CAPABILITY_NAME)
                {
                    return Ok(Decision::invoke(retrieval::CAPABILITY_NAME, text)
                        .with_thought(format!("{} failed, looking up background", capability)));
                }
                return Ok(Decision::finish("").with_thought("planned step failed"));
            }

            let instruction = match (intent, fetched_price(trace)) {
                (Intent::PriceThenCalculation(_), Some(price))
                    if capability != market_data::CAPABILITY_NAME =>
                {
                    format!("{} It is now worth ${:.2}.", text, price)
                }
                _ => text.to_string(),
            };
            return Ok(Decision::invoke(capability, instruction)
                .with_thought(format!("{:?} needs {}", intent, capability)));
        }

        Ok(Decision::finish("").with_thought("every planned step succeeded"))
    }

    async fn fallback_answer(&self, query: &Query) -> Result<String> {
        Ok(format!(
            "I could not work out how to answer \"{}\". Try naming a ticker symbol, \
             or state the figures for the calculation you need.",
            query.text().trim()
        ))
    }
}
