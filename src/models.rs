//! Core data models for the financial query router

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;
use uuid::Uuid;

//
// ================= Conversation =================
//

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    User,
    Assistant,
}

impl Role {
    pub fn as_str(&self) -> &'static str {
        match self {
            Role::User => "user",
            Role::Assistant => "assistant",
        }
    }
}

/// One prior message of the conversation, role-tagged.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Turn {
    pub role: Role,
    pub content: String,
}

impl Turn {
    pub fn user(content: impl Into<String>) -> Self {
        Self {
            role: Role::User,
            content: content.into(),
        }
    }

    pub fn assistant(content: impl Into<String>) -> Self {
        Self {
            role: Role::Assistant,
            content: content.into(),
        }
    }
}

/// A submitted question plus the history it was asked in.
/// Fields are private so a query cannot change after submission.
#[derive(Debug, Clone, Serialize)]
pub struct Query {
    query_id: Uuid,
    text: String,
    history: Vec<Turn>,
    submitted_at: DateTime<Utc>,
}

impl Query {
    pub fn new(text: impl Into<String>, history: Vec<Turn>) -> Self {
        Self {
            query_id: Uuid::new_v4(),
            text: text.into(),
            history,
            submitted_at: Utc::now(),
        }
    }

    pub fn query_id(&self) -> Uuid {
        self.query_id
    }

    pub fn text(&self) -> &str {
        &self.text
    }

    pub fn history(&self) -> &[Turn] {
        &self.history
    }

    pub fn submitted_at(&self) -> DateTime<Utc> {
        self.submitted_at
    }
}

//
// ================= Invocation =================
//

/// A single extracted argument value.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(untagged)]
pub enum ArgValue {
    Number(f64),
    Series(Vec<f64>),
    Text(String),
}

impl ArgValue {
    pub fn as_f64(&self) -> Option<f64> {
        match self {
            ArgValue::Number(n) => Some(*n),
            _ => None,
        }
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            ArgValue::Text(s) => Some(s.as_str()),
            _ => None,
        }
    }

    pub fn as_series(&self) -> Option<&[f64]> {
        match self {
            ArgValue::Series(values) => Some(values.as_slice()),
            _ => None,
        }
    }
}

impl fmt::Display for ArgValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ArgValue::Number(n) => write!(f, "{}", n),
            ArgValue::Text(s) => write!(f, "{}", s),
            ArgValue::Series(values) => {
                let parts: Vec<String> = values.iter().map(|v| v.to_string()).collect();
                write!(f, "[{}]", parts.join(", "))
            }
        }
    }
}

/// Extracted arguments keyed by parameter name.
pub type Arguments = BTreeMap<String, ArgValue>;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct InvocationRequest {
    pub capability: String,
    pub arguments: Arguments,
}

//
// ================= Observation =================
//

/// Recorded outcome of one capability invocation (or of a failed
/// decision step). Built once, never mutated.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Observation {
    pub observation_id: Uuid,
    pub capability: String,
    pub success: bool,
    pub payload: Option<serde_json::Value>,
    pub error: Option<String>,
    pub attempts: u32,
    pub execution_time_ms: u64,
    pub created_at: DateTime<Utc>,
}

impl Observation {
    pub fn succeeded(
        capability: impl Into<String>,
        payload: serde_json::Value,
        attempts: u32,
        execution_time_ms: u64,
    ) -> Self {
        Self {
            observation_id: Uuid::new_v4(),
            capability: capability.into(),
            success: true,
            payload: Some(payload),
            error: None,
            attempts,
            execution_time_ms,
            created_at: Utc::now(),
        }
    }

    pub fn failed(
        capability: impl Into<String>,
        reason: impl Into<String>,
        attempts: u32,
        execution_time_ms: u64,
    ) -> Self {
        Self {
            observation_id: Uuid::new_v4(),
            capability: capability.into(),
            success: false,
            payload: None,
            error: Some(reason.into()),
            attempts,
            execution_time_ms,
            created_at: Utc::now(),
        }
    }
}

//
// ================= Decisions & Trace =================
//

/// What the decision step asks the router to do next.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(tag = "action", rename_all = "lowercase")]
pub enum Action {
    Finish { draft: String },
    Invoke { capability: String, instruction: String },
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Decision {
    pub thought: Option<String>,
    pub action: Action,
}

impl Decision {
    pub fn finish(draft: impl Into<String>) -> Self {
        Self {
            thought: None,
            action: Action::Finish {
                draft: draft.into(),
            },
        }
    }

    pub fn invoke(capability: impl Into<String>, instruction: impl Into<String>) -> Self {
        Self {
            thought: None,
            action: Action::Invoke {
                capability: capability.into(),
                instruction: instruction.into(),
            },
        }
    }

    pub fn with_thought(mut self, thought: impl Into<String>) -> Self {
        self.thought = Some(thought.into());
        self
    }
}

/// The action half of a trace step.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum TraceAction {
    Invoke { capability: String, instruction: String },
    /// The decision step failed or produced output that was not an action.
    Malformed { raw: String },
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TraceStep {
    pub thought: Option<String>,
    pub action: TraceAction,
    pub observation: Observation,
}

/// Ordered record of one run. Owned by the router for a single query.
#[derive(Debug, Clone, Default, Serialize)]
pub struct ReasoningTrace {
    steps: Vec<TraceStep>,
}

impl ReasoningTrace {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, step: TraceStep) {
        self.steps.push(step);
    }

    pub fn steps(&self) -> &[TraceStep] {
        &self.steps
    }

    pub fn is_empty(&self) -> bool {
        self.steps.is_empty()
    }

    /// Number of capability invocations attempted so far.
    pub fn action_steps(&self) -> usize {
        self.steps
            .iter()
            .filter(|s| matches!(s.action, TraceAction::Invoke { .. }))
            .count()
    }

    pub fn observations(&self) -> impl Iterator<Item = &Observation> {
        self.steps.iter().map(|s| &s.observation)
    }

    pub fn successful(&self) -> impl Iterator<Item = &Observation> {
        self.observations().filter(|o| o.success)
    }

    pub fn failed(&self) -> impl Iterator<Item = &Observation> {
        self.observations().filter(|o| !o.success)
    }

    pub fn last_success_of(&self, capability: &str) -> Option<&Observation> {
        self.successful()
            .filter(|o| o.capability == capability)
            .last()
    }
}

//
// ================= Final Answer =================
//

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "UPPERCASE")]
pub enum RunStatus {
    Done,
    Failed,
}

/// A structured table attached to the answer (fetched figures, sources, ...).
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Attachment {
    pub title: String,
    pub columns: Vec<String>,
    pub rows: Vec<Vec<String>>,
}

impl Attachment {
    pub fn to_markdown(&self) -> String {
        let mut out = format!("**{}**\n\n", self.title);
        out.push_str(&format!("| {} |\n", self.columns.join(" | ")));
        out.push_str(&format!(
            "|{}|\n",
            self.columns
                .iter()
                .map(|_| "---")
                .collect::<Vec<_>>()
                .join("|")
        ));
        for row in &self.rows {
            out.push_str(&format!("| {} |\n", row.join(" | ")));
        }
        out
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FinalAnswer {
    pub query_id: Uuid,
    pub text: String,
    pub attachments: Vec<Attachment>,
    pub status: RunStatus,
    pub action_steps: usize,
    pub capabilities_used: Vec<String>,
}

impl FinalAnswer {
    /// Text plus every attachment rendered as markdown.
    pub fn render(&self) -> String {
        let mut out = self.text.clone();
        for attachment in &self.attachments {
            out.push_str("\n\n");
            out.push_str(&attachment.to_markdown());
        }
        out
    }
}

impl fmt::Display for RunStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            RunStatus::Done => "DONE",
            RunStatus::Failed => "FAILED",
        };
        write!(f, "{}", s)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_trace_counts_only_invocations() {
        let mut trace = ReasoningTrace::new();
        trace.push(TraceStep {
            thought: None,
            action: TraceAction::Malformed {
                raw: "not json".into(),
            },
            observation: Observation::failed("decision", "unreadable", 1, 0),
        });
        trace.push(TraceStep {
            thought: Some("need the formula".into()),
            action: TraceAction::Invoke {
                capability: "roi".into(),
                instruction: "5000 to 7500".into(),
            },
            observation: Observation::succeeded("roi", json!({"roi": 0.5}), 1, 0),
        });

        assert_eq!(trace.action_steps(), 1);
        assert_eq!(trace.failed().count(), 1);
        assert!(trace.last_success_of("roi").is_some());
        assert!(trace.last_success_of("market_data").is_none());
    }

    #[test]
    fn test_arg_value_untagged_serialization() {
        let mut args = Arguments::new();
        args.insert("initial".into(), ArgValue::Number(5000.0));
        args.insert("ticker".into(), ArgValue::Text("AAPL".into()));
        args.insert("cash_flows".into(), ArgValue::Series(vec![1.0, 2.0]));

        let value = serde_json::to_value(&args).unwrap();
        assert_eq!(value["initial"], json!(5000.0));
        assert_eq!(value["ticker"], json!("AAPL"));
        assert_eq!(value["cash_flows"], json!([1.0, 2.0]));
    }

    #[test]
    fn test_attachment_markdown() {
        let table = Attachment {
            title: "Key figures".into(),
            columns: vec!["Metric".into(), "Value".into()],
            rows: vec![vec!["ROI".into(), "50.00%".into()]],
        };
        let md = table.to_markdown();
        assert!(md.contains("| Metric | Value |"));
        assert!(md.contains("| ROI | 50.00% |"));
    }
}
