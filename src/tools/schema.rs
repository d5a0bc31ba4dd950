//! Capability input schemas
//!
//! A schema is an ordered list of named, typed parameters. The argument
//! extractor reads it to know what to look for; the registry uses it to
//! validate arguments before anything is invoked.

use crate::error::RouterError;
use crate::models::{ArgValue, Arguments};
use crate::Result;
use serde::Serialize;

/// One allowed value of a `Choice` parameter and the phrases that select it.
#[derive(Debug, Clone, Copy, Serialize, PartialEq)]
pub struct ChoiceOption {
    pub value: &'static str,
    pub synonyms: &'static [&'static str],
}

/// Semantic type of a parameter.
#[derive(Debug, Clone, Copy, Serialize, PartialEq)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ParamKind {
    Number,
    CurrencyAmount,
    /// Normalized to a fraction (8% -> 0.08).
    PercentageRate,
    TickerSymbol,
    DurationInPeriods,
    FreeText,
    /// Compounding or payment frequency, as times per year.
    CompoundingFrequency,
    /// Ordered list of amounts, e.g. cash flows.
    AmountSeries,
    Choice { options: &'static [ChoiceOption] },
}

impl ParamKind {
    pub fn type_name(&self) -> &'static str {
        match self {
            ParamKind::Number => "number",
            ParamKind::CurrencyAmount => "currency-amount",
            ParamKind::PercentageRate => "percentage-rate",
            ParamKind::TickerSymbol => "ticker-symbol",
            ParamKind::DurationInPeriods => "duration-in-periods",
            ParamKind::FreeText => "free-text",
            ParamKind::CompoundingFrequency => "compounding-frequency",
            ParamKind::AmountSeries => "amount-series",
            ParamKind::Choice { .. } => "choice",
        }
    }
}

/// Value used for an optional parameter the text did not mention.
#[derive(Debug, Clone, Copy, Serialize, PartialEq)]
#[serde(untagged)]
pub enum DefaultValue {
    Number(f64),
    Text(&'static str),
}

impl From<DefaultValue> for ArgValue {
    fn from(value: DefaultValue) -> Self {
        match value {
            DefaultValue::Number(n) => ArgValue::Number(n),
            DefaultValue::Text(s) => ArgValue::Text(s.to_string()),
        }
    }
}

#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct ParamSpec {
    pub name: &'static str,
    pub kind: ParamKind,
    pub required: bool,
    pub description: &'static str,
    /// Words that, when next to a literal, tie the literal to this parameter.
    #[serde(skip)]
    pub cues: &'static [&'static str],
    /// Rates: convert to the payment frequency. Durations: count payments, not years.
    #[serde(skip_serializing_if = "std::ops::Not::not")]
    pub per_period: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub default: Option<DefaultValue>,
}

impl ParamSpec {
    pub fn required(name: &'static str, kind: ParamKind, description: &'static str) -> Self {
        Self {
            name,
            kind,
            required: true,
            description,
            cues: &[],
            per_period: false,
            default: None,
        }
    }

    pub fn optional(name: &'static str, kind: ParamKind, description: &'static str) -> Self {
        Self {
            required: false,
            ..Self::required(name, kind, description)
        }
    }

    pub fn cues(mut self, cues: &'static [&'static str]) -> Self {
        self.cues = cues;
        self
    }

    pub fn per_period(mut self) -> Self {
        self.per_period = true;
        self
    }

    pub fn default_value(mut self, value: DefaultValue) -> Self {
        self.default = Some(value);
        self
    }
}

#[derive(Debug, Clone, Default, Serialize, PartialEq)]
pub struct InputSchema {
    params: Vec<ParamSpec>,
}

impl InputSchema {
    pub fn new(params: Vec<ParamSpec>) -> Self {
        Self { params }
    }

    pub fn params(&self) -> &[ParamSpec] {
        &self.params
    }

    pub fn get(&self, name: &str) -> Option<&ParamSpec> {
        self.params.iter().find(|p| p.name == name)
    }

    /// One-line signature for prompts: `roi(initial: currency-amount, final: currency-amount)`
    pub fn signature(&self, capability: &str) -> String {
        let params: Vec<String> = self
            .params
            .iter()
            .map(|p| {
                format!(
                    "{}{}: {}",
                    p.name,
                    if p.required { "" } else { "?" },
                    p.kind.type_name()
                )
            })
            .collect();
        format!("{}({})", capability, params.join(", "))
    }

    /// Check that `args` satisfies the schema: required fields present,
    /// values of the right shape, no unknown fields.
    pub fn validate(&self, capability: &str, args: &Arguments) -> Result<()> {
        let fail = |reason: String| RouterError::Validation {
            capability: capability.to_string(),
            reason,
        };

        for name in args.keys() {
            if self.get(name).is_none() {
                return Err(fail(format!("unexpected argument '{}'", name)));
            }
        }

        for spec in &self.params {
            let Some(value) = args.get(spec.name) else {
                if spec.required {
                    return Err(fail(format!("missing required argument '{}'", spec.name)));
                }
                continue;
            };

            match (spec.kind, value) {
                (ParamKind::PercentageRate, ArgValue::Number(n)) => {
                    if !n.is_finite() || !(0.0..=1.0).contains(n) {
                        return Err(fail(format!(
                            "'{}' must be a rate between 0% and 100%",
                            spec.name
                        )));
                    }
                }
                (
                    ParamKind::Number
                    | ParamKind::CurrencyAmount
                    | ParamKind::DurationInPeriods
                    | ParamKind::CompoundingFrequency,
                    ArgValue::Number(n),
                ) => {
                    if !n.is_finite() {
                        return Err(fail(format!("'{}' must be a finite number", spec.name)));
                    }
                }
                (ParamKind::AmountSeries, ArgValue::Series(values)) => {
                    if values.is_empty() || values.iter().any(|v| !v.is_finite()) {
                        return Err(fail(format!(
                            "'{}' must be a non-empty list of finite amounts",
                            spec.name
                        )));
                    }
                }
                (ParamKind::TickerSymbol, ArgValue::Text(s)) => {
                    if s.is_empty() || s.chars().any(char::is_whitespace) {
                        return Err(fail(format!("'{}' is not a ticker symbol", spec.name)));
                    }
                }
                (ParamKind::FreeText, ArgValue::Text(s)) => {
                    if s.trim().is_empty() {
                        return Err(fail(format!("'{}' is empty", spec.name)));
                    }
                }
                (ParamKind::Choice { options }, ArgValue::Text(s)) => {
                    if !options.iter().any(|o| o.value == s) {
                        let allowed: Vec<&str> = options.iter().map(|o| o.value).collect();
                        return Err(fail(format!(
                            "'{}' must be one of: {}",
                            spec.name,
                            allowed.join(", ")
                        )));
                    }
                }
                (kind, _) => {
                    return Err(fail(format!(
                        "'{}' must be a {}",
                        spec.name,
                        kind.type_name()
                    )));
                }
            }
        }

        Ok(())
    }
}
