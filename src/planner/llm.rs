//! Language-model decision step
//!
//! Renders the capability menu, recent conversation and trace into one
//! prompt and parses the reply with `parse_decision`. On the first step a
//! question that plainly names a formula with its figures skips the model.

use super::{parse_decision, DecisionContext, DecisionModel};
use crate::classifier::{Intent, IntentClassifier};
use crate::models::{Decision, Query, TraceAction};
use crate::Result;
use async_trait::async_trait;
use tracing::debug;

/// Longest payload excerpt shown back to the model per observation.
const OBSERVATION_EXCERPT: usize = 800;

/// The black-box text completion service.
#[async_trait]
pub trait TextCompletion: Send + Sync {
    async fn complete(&self, system: &str, prompt: &str) -> Result<String>;
}

const DECISION_SYSTEM_PROMPT: &str = r#"You are the routing step of a financial question answering agent.

Each turn you either invoke exactly ONE capability or finish with an answer.

Rules:
- Use knowledge_search for definitions and explanations
- Use market_data for live figures about a ticker
- Use a calculation capability when the figures are known; put every figure it needs in the instruction
- Never invent figures; fetch them or say they are missing
- Finish as soon as the observations answer the question
- Return ONLY valid JSON, no explanation text

JSON formats:
{"thought": "...", "action": "invoke", "capability": "<name>", "instruction": "<text with the figures>"}
{"thought": "...", "action": "finish", "answer": "<answer for the user>"}"#;

const FALLBACK_SYSTEM_PROMPT: &str = r#"You are a careful financial educator.
Answer the question directly in a few sentences. You have no access to live
data or calculators: say so plainly if the question needs them, and never
make up figures."#;

pub struct LlmDecisionModel<C> {
    client: C,
}

impl<C: TextCompletion> LlmDecisionModel<C> {
    pub fn new(client: C) -> Self {
        Self { client }
    }

    fn build_prompt(context: &DecisionContext<'_>) -> String {
        let mut prompt = String::from("Available capabilities:\n");
        for descriptor in &context.capabilities {
            prompt.push_str(&descriptor.menu_line());
            prompt.push('\n');
        }

        if !context.history.is_empty() {
            prompt.push_str("\nCONVERSATION SO FAR:\n");
            for turn in context.history {
                prompt.push_str(&format!("{}: {}\n", turn.role.as_str(), turn.content));
            }
        }

        prompt.push_str(&format!("\nQUESTION:\n{}\n", context.query.text()));

        if !context.trace.is_empty() {
            prompt.push_str("\nSTEPS TAKEN:\n");
            for (i, step) in context.trace.steps().iter().enumerate() {
                let action = match &step.action {
                    TraceAction::Invoke {
                        capability,
                        instruction,
                    } => format!("invoke {} with \"{}\"", capability, instruction),
                    TraceAction::Malformed { .. } => "unreadable decision".to_string(),
                };
                let observation = &step.observation;
                let outcome = match (&observation.payload, &observation.error) {
                    (Some(payload), _) => {
                        let text = payload.to_string();
                        excerpt(&text, OBSERVATION_EXCERPT)
                    }
                    (None, Some(error)) => format!("FAILED: {}", error),
                    (None, None) => "no output".to_string(),
                };
                prompt.push_str(&format!("{}. {}\n   -> {}\n", i + 1, action, outcome));
            }
        }

        prompt.push_str("\nDecide the next action.");
        prompt
    }
}

fn excerpt(text: &str, max_chars: usize) -> String {
    match text.char_indices().nth(max_chars) {
        Some((cut, _)) => format!("{}...", &text[..cut]),
        None => text.to_string(),
    }
}

#[async_trait]
impl<C: TextCompletion> DecisionModel for LlmDecisionModel<C> {
    async fn decide(&self, context: &DecisionContext<'_>) -> Result<Decision> {
        if context.trace.is_empty() {
            if let Intent::Calculation(formula) = IntentClassifier::classify(context.query.text()) {
                debug!(formula = %formula, "formula named with figures, skipping the model");
                return Ok(Decision::invoke(formula.capability_name(), context.query.text())
                    .with_thought(format!("the question asks for {}", formula)));
            }
        }

        let prompt = Self::build_prompt(context);
        let raw = self.client.complete(DECISION_SYSTEM_PROMPT, &prompt).await?;
        parse_decision(&raw)
    }

    async fn fallback_answer(&self, query: &Query) -> Result<String> {
        self.client
            .complete(FALLBACK_SYSTEM_PROMPT, query.text())
            .await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::RouterError;
    use crate::models::{Action, Observation, ReasoningTrace, TraceStep, Turn};
    use std::sync::Mutex;

    /// Returns a fixed reply and keeps the last prompt.
    struct Canned {
        reply: String,
        last_prompt: Mutex<Option<String>>,
    }

    impl Canned {
        fn new(reply: &str) -> Self {
            Self {
                reply: reply.to_string(),
                last_prompt: Mutex::new(None),
            }
        }
    }

    #[async_trait]
    impl TextCompletion for Canned {
        async fn complete(&self, _system: &str, prompt: &str) -> Result<String> {
            if let Ok(mut last) = self.last_prompt.lock() {
                *last = Some(prompt.to_string());
            }
            Ok(self.reply.clone())
        }
    }

    #[tokio::test]
    async fn test_fast_path_skips_the_model() {
        let model = LlmDecisionModel::new(Canned::new("not json"));
        let query = Query::new(
            "Calculate the ROI of an investment of $5000 that is now worth $7500",
            vec![],
        );
        let trace = ReasoningTrace::new();
        let context = DecisionContext {
            query: &query,
            history: &[],
            trace: &trace,
            capabilities: vec![],
        };

        let decision = model.decide(&context).await.unwrap();
        assert!(matches!(decision.action, Action::Invoke { ref capability, .. } if capability == "roi"));
        assert!(model.client.last_prompt.lock().unwrap().is_none());
    }

    #[tokio::test]
    async fn test_prompt_carries_history_and_trace() {
        let model = LlmDecisionModel::new(Canned::new(
            r#"{"action": "finish", "answer": "The current ratio is current assets over current liabilities."}"#,
        ));
        let query = Query::new("And what does it measure?", vec![]);
        let history = vec![
            Turn::user("What is the current ratio?"),
            Turn::assistant("A liquidity ratio."),
        ];
        let mut trace = ReasoningTrace::new();
        trace.push(TraceStep {
            thought: None,
            action: TraceAction::Invoke {
                capability: "knowledge_search".into(),
                instruction: "current ratio".into(),
            },
            observation: Observation::failed("knowledge_search", "the knowledge base could not be reached", 1, 2),
        });
        let context = DecisionContext {
            query: &query,
            history: &history,
            trace: &trace,
            capabilities: vec![],
        };

        let decision = model.decide(&context).await.unwrap();
        assert!(matches!(decision.action, Action::Finish { .. }));

        let prompt = model.client.last_prompt.lock().unwrap().clone().unwrap();
        assert!(prompt.contains("user: What is the current ratio?"));
        assert!(prompt.contains("FAILED: the knowledge base could not be reached"));
    }

    #[tokio::test]
    async fn test_unparsable_reply_is_a_format_error() {
        let model = LlmDecisionModel::new(Canned::new("Sure! Let me look that up."));
        let query = Query::new("What is a bond?", vec![]);
        let trace = ReasoningTrace::new();
        let context = DecisionContext {
            query: &query,
            history: &[],
            trace: &trace,
            capabilities: vec![],
        };
        tokio_test::assert_err!(model.decide(&context).await);
        assert!(matches!(
            model.decide(&context).await,
            Err(RouterError::RoutingFormat(_))
        ));
    }

    #[test]
    fn test_excerpt_respects_char_boundaries() {
        assert_eq!(excerpt("€€€€", 2), "€€...");
        assert_eq!(excerpt("short", 10), "short");
    }
}
