//! Response composer
//!
//! Builds the FinalAnswer from the draft and the trace. The result depends
//! only on its inputs: the latest successful Observation of each capability
//! contributes one finding sentence plus its tables, and every capability
//! that only ever failed is listed with its reason.

use crate::calc::Formula;
use crate::error::RouterError;
use crate::models::{Attachment, FinalAnswer, Observation, Query, ReasoningTrace, RunStatus};
use crate::planner::DECISION_STEP;
use crate::tools::market_data::{self, MarketPayload};
use crate::tools::retrieval::{self, Snippet};
use serde_json::Value;

/// Longest retrieved passage quoted in an answer.
const PASSAGE_CHARS: usize = 700;
/// Most recent bars shown in a price history table.
const HISTORY_ROWS: usize = 30;
const UNREADABLE_RESULT: &str = "the result could not be read back as a usable number";

struct Finding {
    sentence: String,
    attachments: Vec<Attachment>,
}

#[derive(Debug, Default, Clone, Copy)]
pub struct ResponseComposer;

impl ResponseComposer {
    pub fn new() -> Self {
        Self
    }

    /// Answer for a run that reached `finish`.
    pub fn compose(&self, query: &Query, draft: &str, trace: &ReasoningTrace) -> FinalAnswer {
        let Collected {
            sentences,
            attachments,
            used,
            unreadable,
        } = collect(trace);

        let mut text = if !draft.trim().is_empty() {
            draft.trim().to_string()
        } else if !sentences.is_empty() {
            sentences.join("\n\n")
        } else {
            format!(
                "I could not find anything that answers \"{}\".",
                query.text().trim()
            )
        };
        push_unresolved(&mut text, trace, &unreadable);

        FinalAnswer {
            query_id: query.query_id(),
            text,
            attachments,
            status: RunStatus::Done,
            action_steps: trace.action_steps(),
            capabilities_used: used,
        }
    }

    /// Best partial answer for a run that had to stop.
    pub fn compose_partial(
        &self,
        query: &Query,
        trace: &ReasoningTrace,
        reason: &RouterError,
    ) -> FinalAnswer {
        let Collected {
            sentences,
            attachments,
            used,
            unreadable,
        } = collect(trace);

        let mut text = format!(
            "I could not finish answering \"{}\": {}.",
            query.text().trim(),
            reason.user_message()
        );
        if sentences.is_empty() {
            text.push_str("\n\nNo lookup returned a usable result before stopping.");
        } else {
            text.push_str("\n\nWhat I found before stopping:\n\n");
            text.push_str(&sentences.join("\n\n"));
        }
        push_unresolved(&mut text, trace, &unreadable);

        FinalAnswer {
            query_id: query.query_id(),
            text,
            attachments,
            status: RunStatus::Failed,
            action_steps: trace.action_steps(),
            capabilities_used: used,
        }
    }
}

// ===== Trace selection =====

/// Latest success per capability, in order of first appearance.
fn latest_successes(trace: &ReasoningTrace) -> Vec<&Observation> {
    let mut order: Vec<&str> = Vec::new();
    for observation in trace.successful() {
        if !order.contains(&observation.capability.as_str()) {
            order.push(&observation.capability);
        }
    }
    order
        .into_iter()
        .filter_map(|capability| trace.last_success_of(capability))
        .collect()
}

/// (capability, last reason) for capabilities that never succeeded.
fn unresolved(trace: &ReasoningTrace) -> Vec<(&str, &str)> {
    let mut out: Vec<(&str, &str)> = Vec::new();
    for observation in trace.failed() {
        let capability = observation.capability.as_str();
        if capability == DECISION_STEP || trace.last_success_of(capability).is_some() {
            continue;
        }
        let reason = observation.error.as_deref().unwrap_or("no reason was given");
        match out.iter_mut().find(|entry| entry.0 == capability) {
            Some(entry) => entry.1 = reason,
            None => out.push((capability, reason)),
        }
    }
    out
}

struct Collected {
    sentences: Vec<String>,
    attachments: Vec<Attachment>,
    used: Vec<String>,
    /// Succeeded, but the payload could not be turned into a finding.
    unreadable: Vec<String>,
}

fn collect(trace: &ReasoningTrace) -> Collected {
    let mut collected = Collected {
        sentences: Vec::new(),
        attachments: Vec::new(),
        used: Vec::new(),
        unreadable: Vec::new(),
    };

    for observation in latest_successes(trace) {
        collected.used.push(observation.capability.clone());
        match describe(observation) {
            Some(finding) => {
                collected.sentences.push(finding.sentence);
                collected.attachments.extend(finding.attachments);
            }
            None => collected.unreadable.push(observation.capability.clone()),
        }
    }
    collected
}

fn push_unresolved(text: &mut String, trace: &ReasoningTrace, unreadable: &[String]) {
    let missing = unresolved(trace);
    if missing.is_empty() && unreadable.is_empty() {
        return;
    }
    text.push_str("\n\nCould not be determined:");
    for (capability, reason) in missing {
        text.push_str(&format!("\n- {}: {}", capability_label(capability), reason));
    }
    for capability in unreadable {
        text.push_str(&format!(
            "\n- {}: {}",
            capability_label(capability),
            UNREADABLE_RESULT
        ));
    }
}

fn capability_label(capability: &str) -> String {
    match Formula::from_capability_name(capability) {
        Some(formula) => formula.to_string(),
        None if capability == market_data::CAPABILITY_NAME => "market data".to_string(),
        None if capability == retrieval::CAPABILITY_NAME => "knowledge base lookup".to_string(),
        None => capability.to_string(),
    }
}

// ===== Formatting =====

/// Largest amount printed with grouped cents; beyond it `u64` cents saturate.
const MONEY_EXACT_LIMIT: f64 = 1e15;

fn money(value: f64) -> String {
    if !value.is_finite() {
        return "an unrepresentable amount".to_string();
    }
    if value.abs() >= MONEY_EXACT_LIMIT {
        return format!("${:.3e}", value);
    }
    let sign = if value < 0.0 { "-" } else { "" };
    let cents = (value.abs() * 100.0).round() as u64;
    let whole = (cents / 100).to_string();
    let mut grouped = String::with_capacity(whole.len() + whole.len() / 3);
    for (i, c) in whole.chars().enumerate() {
        if i > 0 && (whole.len() - i) % 3 == 0 {
            grouped.push(',');
        }
        grouped.push(c);
    }
    format!("{}${}.{:02}", sign, grouped, cents % 100)
}

fn percent(fraction: f64) -> String {
    format!("{:.2}%", fraction * 100.0)
}

fn plain(value: f64) -> String {
    if value.fract() == 0.0 && value.abs() < 1e15 {
        format!("{}", value as i64)
    } else {
        format!("{:.2}", value)
    }
}

fn excerpt(text: &str, max_chars: usize) -> String {
    let text = text.trim();
    match text.char_indices().nth(max_chars) {
        Some((cut, _)) => format!("{}...", text[..cut].trim_end()),
        None => text.to_string(),
    }
}

fn table(title: impl Into<String>, columns: &[&str], rows: Vec<Vec<String>>) -> Attachment {
    Attachment {
        title: title.into(),
        columns: columns.iter().map(|c| c.to_string()).collect(),
        rows,
    }
}

fn figures(rows: Vec<(&str, String)>) -> Attachment {
    table(
        "Key figures",
        &["Metric", "Value"],
        rows.into_iter()
            .map(|(metric, value)| vec![metric.to_string(), value])
            .collect(),
    )
}

// ===== Findings =====

fn describe(observation: &Observation) -> Option<Finding> {
    let payload = observation.payload.as_ref()?;
    let capability = observation.capability.as_str();

    if let Some(formula) = Formula::from_capability_name(capability) {
        return describe_calculation(formula, payload);
    }
    if capability == market_data::CAPABILITY_NAME {
        let market: MarketPayload = serde_json::from_value(payload.clone()).ok()?;
        return Some(describe_market(market));
    }
    if capability == retrieval::CAPABILITY_NAME {
        return Some(describe_retrieval(payload));
    }
    None
}

fn describe_calculation(formula: Formula, payload: &Value) -> Option<Finding> {
    let num = |key: &str| payload.get(key).and_then(Value::as_f64);
    let result = num("result")?;

    let finding = match formula {
        Formula::Roi => {
            let initial = num("initial")?;
            let final_value = num("final")?;
            let gain = final_value - initial;
            let change = if gain < 0.0 { "a loss of" } else { "a gain of" };
            Finding {
                sentence: format!(
                    "The return on investment is {}: {} became {}, {} {}.",
                    percent(result),
                    money(initial),
                    money(final_value),
                    change,
                    money(gain.abs())
                ),
                attachments: vec![figures(vec![
                    ("Initial value", money(initial)),
                    ("Final value", money(final_value)),
                    ("Gain", money(gain)),
                    ("Return on investment", percent(result)),
                ])],
            }
        }
        Formula::CompoundInterest => {
            let principal = num("principal")?;
            let rate = num("rate")?;
            let periods = num("periods")?;
            let compounds = num("compounds_per_period").unwrap_or(1.0);
            let interest = num("interest_earned").unwrap_or(result - principal);
            Finding {
                sentence: format!(
                    "{} at {} for {} years, compounded {} times a year, grows to {} ({} in interest).",
                    money(principal),
                    percent(rate),
                    plain(periods),
                    plain(compounds),
                    money(result),
                    money(interest)
                ),
                attachments: vec![figures(vec![
                    ("Principal", money(principal)),
                    ("Annual rate", percent(rate)),
                    ("Years", plain(periods)),
                    ("Compounds per year", plain(compounds)),
                    ("Future value", money(result)),
                    ("Interest earned", money(interest)),
                ])],
            }
        }
        Formula::LoanPayment => {
            let principal = num("principal")?;
            let rate = num("rate_per_period")?;
            let periods = num("num_periods")?;
            let total_paid = num("total_paid").unwrap_or(result * periods);
            let total_interest = num("total_interest").unwrap_or(total_paid - principal);

            let mut attachments = vec![figures(vec![
                ("Principal", money(principal)),
                ("Rate per period", format!("{:.4}%", rate * 100.0)),
                ("Number of payments", plain(periods)),
                ("Payment", money(result)),
                ("Total paid", money(total_paid)),
                ("Total interest", money(total_interest)),
            ])];

            let rows: Vec<Vec<String>> = payload
                .get("schedule_sample")
                .and_then(Value::as_array)
                .map(|rows| {
                    rows.iter()
                        .map(|row| {
                            let cell = |key: &str| {
                                row.get(key).and_then(Value::as_f64).map(money).unwrap_or_default()
                            };
                            vec![
                                row.get("period")
                                    .map(|p| p.to_string())
                                    .unwrap_or_default(),
                                cell("payment"),
                                cell("principal"),
                                cell("interest"),
                                cell("remaining_balance"),
                            ]
                        })
                        .collect()
                })
                .unwrap_or_default();
            if !rows.is_empty() {
                attachments.push(table(
                    "Amortization schedule (first and last payments)",
                    &["Period", "Payment", "Principal", "Interest", "Balance"],
                    rows,
                ));
            }

            Finding {
                sentence: format!(
                    "The payment is {} per period over {} payments, {} in total of which {} is interest.",
                    money(result),
                    plain(periods),
                    money(total_paid),
                    money(total_interest)
                ),
                attachments,
            }
        }
        Formula::FinancialRatio => {
            let label = payload.get("label").and_then(Value::as_str).unwrap_or("Ratio");
            let definition = payload.get("definition").and_then(Value::as_str).unwrap_or_default();
            let shown = if payload
                .get("is_percentage")
                .and_then(Value::as_bool)
                .unwrap_or(false)
            {
                percent(result)
            } else {
                format!("{:.2}", result)
            };

            let mut sentence = format!("{}: {} ({}).", label, shown, definition);
            if let Some(reading) = payload.get("interpretation").and_then(Value::as_str) {
                sentence.push_str(&format!(" Reading: {}.", reading));
            }
            Finding {
                sentence,
                attachments: vec![figures(vec![
                    ("Ratio", label.to_string()),
                    ("Numerator", plain(num("numerator")?)),
                    ("Denominator", plain(num("denominator")?)),
                    ("Value", shown),
                ])],
            }
        }
        Formula::NetPresentValue => {
            let rate = num("rate")?;
            let outlay = num("initial_outlay")?;
            let flows: Vec<f64> = series(payload, "cash_flows");
            let present: Vec<f64> = series(payload, "present_values");
            let verdict = if result >= 0.0 {
                "so the cash flows cover the outlay"
            } else {
                "so the cash flows fall short of the outlay"
            };

            let rows = flows
                .iter()
                .zip(present.iter())
                .enumerate()
                .map(|(i, (flow, pv))| vec![(i + 1).to_string(), money(*flow), money(*pv)])
                .collect();
            Finding {
                sentence: format!(
                    "The net present value is {} at a {} discount rate, {}.",
                    money(result),
                    percent(rate),
                    verdict
                ),
                attachments: vec![
                    figures(vec![
                        ("Discount rate", percent(rate)),
                        ("Initial outlay", money(outlay)),
                        ("Net present value", money(result)),
                    ]),
                    table("Discounted cash flows", &["Period", "Cash flow", "Present value"], rows),
                ],
            }
        }
        Formula::InternalRateOfReturn => {
            let outlay = num("initial_outlay")?;
            let flows = series(payload, "cash_flows");
            Finding {
                sentence: format!(
                    "The internal rate of return is {}, the discount rate at which the \
                     cash flows exactly repay the {} outlay.",
                    percent(result),
                    money(outlay)
                ),
                attachments: vec![figures(vec![
                    ("Initial outlay", money(outlay)),
                    ("Cash flows", flows.iter().map(|f| money(*f)).collect::<Vec<_>>().join(", ")),
                    ("Internal rate of return", percent(result)),
                ])],
            }
        }
    };
    Some(finding)
}

fn series(payload: &Value, key: &str) -> Vec<f64> {
    payload
        .get(key)
        .and_then(Value::as_array)
        .map(|values| values.iter().filter_map(Value::as_f64).collect())
        .unwrap_or_default()
}

fn describe_market(payload: MarketPayload) -> Finding {
    match payload {
        MarketPayload::CurrentPrice(quote) => {
            let change = quote
                .change_percent
                .map(|c| format!(" ({:+.2}% on the day)", c))
                .unwrap_or_default();
            let as_of = quote.timestamp.format("%Y-%m-%d %H:%M UTC").to_string();
            Finding {
                sentence: format!(
                    "{} is trading at {:.2} {}{} as of {}.",
                    quote.ticker, quote.price, quote.currency, change, as_of
                ),
                attachments: vec![table(
                    "Market data",
                    &["Ticker", "Price", "Currency", "Change", "As of"],
                    vec![vec![
                        quote.ticker.clone(),
                        format!("{:.2}", quote.price),
                        quote.currency.clone(),
                        quote
                            .change_percent
                            .map(|c| format!("{:+.2}%", c))
                            .unwrap_or_else(|| "n/a".into()),
                        as_of,
                    ]],
                )],
            }
        }
        MarketPayload::HistoricalPrices {
            ticker,
            period,
            bars,
        } => {
            let Some(last) = bars.last() else {
                return Finding {
                    sentence: format!("No price history came back for {} over {}.", ticker, period),
                    attachments: Vec::new(),
                };
            };
            let low = bars.iter().map(|b| b.close).fold(f64::INFINITY, f64::min);
            let high = bars.iter().map(|b| b.close).fold(f64::NEG_INFINITY, f64::max);
            let sentence = format!(
                "Over {} {} closed between {:.2} and {:.2} across {} sessions; the last close was {:.2} on {}.",
                period,
                ticker,
                low,
                high,
                bars.len(),
                last.close,
                last.date
            );
            let rows = bars
                .iter()
                .rev()
                .take(HISTORY_ROWS)
                .rev()
                .map(|b| {
                    vec![
                        b.date.to_string(),
                        format!("{:.2}", b.open),
                        format!("{:.2}", b.high),
                        format!("{:.2}", b.low),
                        format!("{:.2}", b.close),
                        b.volume.to_string(),
                    ]
                })
                .collect();
            Finding {
                sentence,
                attachments: vec![table(
                    format!("Price history: {} ({})", ticker, period),
                    &["Date", "Open", "High", "Low", "Close", "Volume"],
                    rows,
                )],
            }
        }
        MarketPayload::FinancialStatements(statement) => {
            let title = statement.statement.title();
            let mut columns = vec!["Line item".to_string()];
            columns.extend(statement.periods.iter().map(|p| p.date.to_string()));

            let mut items: Vec<&String> = Vec::new();
            for period in &statement.periods {
                for item in period.items.keys() {
                    if !items.contains(&item) {
                        items.push(item);
                    }
                }
            }
            let rows = items
                .into_iter()
                .map(|item| {
                    let mut row = vec![item.clone()];
                    row.extend(statement.periods.iter().map(|p| {
                        p.items
                            .get(item)
                            .copied()
                            .flatten()
                            .map(plain)
                            .unwrap_or_else(|| "n/a".into())
                    }));
                    row
                })
                .collect();

            Finding {
                sentence: format!(
                    "The {} for {} covers {} period(s); the figures are attached.",
                    title.to_lowercase(),
                    statement.ticker,
                    statement.periods.len()
                ),
                attachments: vec![Attachment {
                    title: format!("{}: {}", title, statement.ticker),
                    columns,
                    rows,
                }],
            }
        }
        MarketPayload::Profile(profile) => {
            let mut sentence = format!("{} ({})", profile.name, profile.ticker);
            match (&profile.sector, &profile.industry) {
                (Some(sector), Some(industry)) => {
                    sentence.push_str(&format!(" operates in {} ({})", sector, industry))
                }
                (Some(sector), None) => sentence.push_str(&format!(" operates in {}", sector)),
                _ => {}
            }
            sentence.push('.');
            if let Some(description) = &profile.description {
                sentence.push(' ');
                sentence.push_str(&excerpt(description, PASSAGE_CHARS));
            }

            let mut rows = vec![
                vec!["Name".to_string(), profile.name.clone()],
                vec!["Ticker".to_string(), profile.ticker.clone()],
            ];
            let optional = [
                ("Sector", profile.sector.clone()),
                ("Industry", profile.industry.clone()),
                ("Market cap", profile.market_cap.map(money)),
                ("P/E ratio", profile.pe_ratio.map(|v| format!("{:.2}", v))),
                ("EPS", profile.eps.map(|v| format!("{:.2}", v))),
                ("Dividend yield", profile.dividend_yield.map(percent)),
                ("Beta", profile.beta.map(|v| format!("{:.2}", v))),
            ];
            rows.extend(
                optional
                    .into_iter()
                    .filter_map(|(field, value)| value.map(|v| vec![field.to_string(), v])),
            );

            Finding {
                sentence,
                attachments: vec![table("Company profile", &["Field", "Value"], rows)],
            }
        }
    }
}

fn describe_retrieval(payload: &Value) -> Finding {
    let query = payload.get("query").and_then(Value::as_str).unwrap_or_default();
    let snippets: Vec<Snippet> = payload
        .get("snippets")
        .cloned()
        .and_then(|v| serde_json::from_value(v).ok())
        .unwrap_or_default();

    let Some(best) = snippets.first() else {
        return Finding {
            sentence: format!("The knowledge base has nothing on \"{}\".", query.trim()),
            attachments: Vec::new(),
        };
    };

    let rows = snippets
        .iter()
        .map(|s| vec![s.source.clone(), format!("{:.2}", s.score)])
        .collect();
    Finding {
        sentence: format!("From \"{}\": {}", best.source, excerpt(&best.text, PASSAGE_CHARS)),
        attachments: vec![table("Sources", &["Source", "Relevance"], rows)],
    }
}
