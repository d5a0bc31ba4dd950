//! Argument extraction
//!
//! Turns a free-text instruction ("a $20000 loan at 6% annual interest over
//! 4 years, paid monthly") into typed arguments for one capability's schema.
//!
//! Conventions:
//! - Numbers may carry currency symbols, thousands separators and the
//!   magnitude suffixes k, m, bn, thousand, million, billion.
//! - Rates: an explicit `%` or "percent" always divides by 100. A bare number
//!   in a rate field divides by 100 when it is 1 or more and is otherwise
//!   already a fraction, so "8%", "8 percent", "8" and "0.08" all give 0.08.
//! - Per-period rates and payment counts follow the payment frequency named
//!   in the text ("monthly" is 12 a year). Without one, the unit of the first
//!   stated term decides ("48 months" is monthly), otherwise annual.
//! - A literal fills the field whose cue word sits nearest to it. Required
//!   fields left over take the first unclaimed literal of a compatible kind.
//!   Optional fields are only filled from cues or their own detectors.
//! - A required field that cannot be resolved is an error, never a default.

use crate::calc::Compounding;
use crate::error::RouterError;
use crate::models::{ArgValue, Arguments};
use crate::tools::schema::{ChoiceOption, InputSchema, ParamKind, ParamSpec};
use crate::Result;
use regex::Regex;
use tracing::debug;

/// Max words between a cue and the literal it claims.
const CUE_WINDOW: usize = 4;
/// Words either side of a rate that may state its unit ("6% annual").
const RATE_UNIT_WINDOW: usize = 3;
/// Max words between a series cue and the first amount of the series.
const SERIES_LEAD: usize = 3;

const TICKER_CUES: &[&str] = &["ticker", "symbol"];

/// All-caps words that look like tickers but are finance vocabulary.
pub(crate) const TICKER_STOPWORDS: &[&str] = &[
    "A", "I", "S", "P", "E", "B", "Q", "OK", "US", "USA", "UK", "EU", "ROI", "NPV", "IRR", "APR",
    "APY", "USD", "EUR", "GBP", "JPY", "ETF", "CEO", "CFO", "EPS", "PE", "PB", "ROE", "ROA", "EBIT",
    "IPO", "GDP", "CPI", "FX", "AI", "API", "YTD", "SEC", "NYSE", "FAQ", "LLC", "INC", "WHAT",
    "THE", "AND", "IS", "HOW",
];

#[derive(Debug, Clone, Copy, PartialEq)]
enum DurationUnit {
    Years,
    Months,
    Quarters,
    Weeks,
    Days,
    /// Already a count of payments.
    Periods,
}

impl DurationUnit {
    fn parse(word: &str) -> Option<Self> {
        match word.to_ascii_lowercase().as_str() {
            "year" | "years" | "yr" | "yrs" => Some(DurationUnit::Years),
            "month" | "months" | "mo" | "mos" => Some(DurationUnit::Months),
            "quarter" | "quarters" => Some(DurationUnit::Quarters),
            "week" | "weeks" => Some(DurationUnit::Weeks),
            "day" | "days" => Some(DurationUnit::Days),
            "period" | "periods" | "payment" | "payments" | "installment" | "installments" => {
                Some(DurationUnit::Periods)
            }
            _ => None,
        }
    }

    fn per_year(self) -> Option<f64> {
        match self {
            DurationUnit::Years => Some(1.0),
            DurationUnit::Months => Some(12.0),
            DurationUnit::Quarters => Some(4.0),
            DurationUnit::Weeks => Some(52.0),
            DurationUnit::Days => Some(365.0),
            DurationUnit::Periods => None,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
enum LiteralClass {
    Percent,
    Currency,
    Duration(DurationUnit),
    Bare,
}

/// A number found in the text, with its byte span (sign and unit included)
/// and the words it covers.
#[derive(Debug, Clone)]
struct Literal {
    value: f64,
    class: LiteralClass,
    start: usize,
    end: usize,
    first_word: usize,
    last_word: usize,
}

/// Strip currency symbols, separators and whitespace, then parse.
pub fn parse_amount(raw: &str) -> Option<f64> {
    let cleaned: String = raw
        .chars()
        .filter(|c| !matches!(c, '$' | '€' | '£' | '¥' | ',' | '_') && !c.is_whitespace())
        .collect();
    cleaned.parse::<f64>().ok().filter(|v| v.is_finite())
}

fn magnitude(suffix: &str) -> f64 {
    match suffix.to_ascii_lowercase().as_str() {
        "k" | "thousand" => 1e3,
        "m" | "mm" | "million" => 1e6,
        "bn" | "billion" => 1e9,
        _ => 1.0,
    }
}

fn strip_punctuation(word: &str) -> &str {
    word.trim_matches(|c: char| !c.is_alphanumeric() && c != '%' && c != '.')
        .trim_end_matches('.')
}

fn is_word_char(c: char) -> bool {
    c.is_alphanumeric() || c == '_'
}

/// Byte spans where `phrase` occurs in `haystack` on word boundaries.
/// Both sides are expected lower-case.
pub(crate) fn find_phrase(haystack: &str, phrase: &str) -> Vec<(usize, usize)> {
    if phrase.is_empty() {
        return Vec::new();
    }
    haystack
        .match_indices(phrase)
        .filter(|(start, _)| {
            let end = start + phrase.len();
            let before = haystack[..*start].chars().next_back();
            let after = haystack[end..].chars().next();
            !before.map_or(false, is_word_char) && !after.map_or(false, is_word_char)
        })
        .map(|(start, _)| (start, start + phrase.len()))
        .collect()
}

/// Extracts arguments from instructions. Patterns are compiled once.
pub struct ArgumentExtractor {
    literal: Regex,
    word: Regex,
    bracket: Regex,
    cashtag: Regex,
    ticker: Regex,
}

impl ArgumentExtractor {
    pub fn new() -> Result<Self> {
        Ok(Self {
            literal: Regex::new(
                r"(?i)(?:(?P<cur>[$€£¥])\s?)?(?P<num>\d{1,3}(?:,\d{3})+(?:\.\d+)?|\d+(?:\.\d+)?|\.\d+)(?:\s?(?P<mag>k|mm|m|bn|thousand|million|billion)\b)?(?:\s?(?P<cursfx>dollars?|usd|eur|euros?|gbp)\b)?(?:\s?(?P<pct>%|percent\b|per\s?cent\b|pct\b))?(?:[\s-]?(?P<unit>years?|yrs?|months?|mos?|quarters?|weeks?|days?|periods?|payments?|installments?)\b)?",
            )?,
            word: Regex::new(r"\S+")?,
            bracket: Regex::new(r"\[[^\]]*\]")?,
            cashtag: Regex::new(r"\$([A-Za-z]{1,5})\b")?,
            ticker: Regex::new(r"\b[A-Z]{1,5}(?:\.[A-Z]{1,2})?\b")?,
        })
    }

    /// Resolve every parameter of `schema` from `instruction`.
    ///
    /// Fails with `RouterError::Extraction` naming the required fields that
    /// could not be found, or `RouterError::Validation` when the resolved
    /// values do not satisfy the schema.
    pub fn extract(
        &self,
        capability: &str,
        instruction: &str,
        schema: &InputSchema,
    ) -> Result<Arguments> {
        let scan = Scan::new(self, instruction);
        let mut claimed = vec![false; scan.literals.len()];
        let mut args = Arguments::new();

        for spec in schema.params() {
            let value = match spec.kind {
                ParamKind::TickerSymbol => self.find_ticker(instruction).map(ArgValue::Text),
                ParamKind::FreeText => Some(instruction.trim())
                    .filter(|t| !t.is_empty())
                    .map(|t| ArgValue::Text(t.to_string())),
                ParamKind::Choice { options } => {
                    scan.match_choice(options).map(|v| ArgValue::Text(v.to_string()))
                }
                ParamKind::CompoundingFrequency => scan
                    .compounding()
                    .map(|c| ArgValue::Number(c.per_year() as f64)),
                ParamKind::AmountSeries => scan
                    .series(self, spec, &mut claimed)
                    .map(ArgValue::Series),
                _ => None,
            };
            if let Some(value) = value {
                args.insert(spec.name.to_string(), value);
            }
        }

        let scalars: Vec<&ParamSpec> = schema
            .params()
            .iter()
            .filter(|p| is_scalar(p.kind))
            .collect();
        let assigned = scan.assign(&scalars, &mut claimed);
        let basis = scan.payment_basis();

        for (spec, literal) in scalars.iter().zip(assigned) {
            if let Some(index) = literal {
                let value = scan.convert(spec, &scan.literals[index], basis);
                args.insert(spec.name.to_string(), ArgValue::Number(value));
            }
        }

        let missing: Vec<String> = schema
            .params()
            .iter()
            .filter(|p| p.required && !args.contains_key(p.name))
            .map(|p| p.name.to_string())
            .collect();
        if !missing.is_empty() {
            debug!(capability, ?missing, "extraction incomplete");
            return Err(RouterError::Extraction {
                capability: capability.to_string(),
                missing,
            });
        }

        for spec in schema.params() {
            if let (false, Some(default)) = (args.contains_key(spec.name), spec.default) {
                args.insert(spec.name.to_string(), default.into());
            }
        }

        schema.validate(capability, &args)?;
        debug!(capability, args = ?args, "arguments extracted");
        Ok(args)
    }

    fn find_ticker(&self, text: &str) -> Option<String> {
        let normalize = |s: &str| s.trim().to_uppercase();

        if let Some(caps) = self.cashtag.captures(text) {
            return Some(normalize(&caps[1]));
        }

        let words: Vec<&str> = text.split_whitespace().collect();
        for pair in words.windows(2) {
            let cue = strip_punctuation(pair[0]).to_ascii_lowercase();
            let candidate = strip_punctuation(pair[1]);
            if TICKER_CUES.contains(&cue.as_str()) && looks_like_ticker(candidate) {
                return Some(normalize(candidate));
            }
        }

        if let Some(m) = self
            .ticker
            .find_iter(text)
            .find(|m| !TICKER_STOPWORDS.contains(&m.as_str()))
        {
            return Some(normalize(m.as_str()));
        }

        // A bare "aapl" handed over as the whole instruction.
        match words.as_slice() {
            [only] if looks_like_ticker(strip_punctuation(only)) => {
                Some(normalize(strip_punctuation(only)))
            }
            _ => None,
        }
    }
}

fn looks_like_ticker(word: &str) -> bool {
    let mut parts = word.splitn(2, '.');
    let head = parts.next().unwrap_or_default();
    let tail_ok = parts
        .next()
        .map_or(true, |t| (1..=2).contains(&t.len()) && t.chars().all(|c| c.is_ascii_alphabetic()));
    (1..=5).contains(&head.len()) && head.chars().all(|c| c.is_ascii_alphabetic()) && tail_ok
}

fn is_scalar(kind: ParamKind) -> bool {
    matches!(
        kind,
        ParamKind::Number
            | ParamKind::CurrencyAmount
            | ParamKind::PercentageRate
            | ParamKind::DurationInPeriods
    )
}

/// Whether a parameter of `kind` can take a literal of `class` at all.
fn accepts(kind: ParamKind, class: LiteralClass) -> bool {
    match kind {
        ParamKind::PercentageRate => matches!(class, LiteralClass::Percent | LiteralClass::Bare),
        ParamKind::CurrencyAmount | ParamKind::Number => {
            matches!(class, LiteralClass::Currency | LiteralClass::Bare)
        }
        ParamKind::DurationInPeriods => {
            matches!(class, LiteralClass::Duration(_) | LiteralClass::Bare)
        }
        _ => false,
    }
}

/// Whether `class` is the form a `kind` value is normally written in.
fn native(kind: ParamKind, class: LiteralClass) -> bool {
    match kind {
        ParamKind::PercentageRate => class == LiteralClass::Percent,
        ParamKind::CurrencyAmount => class == LiteralClass::Currency,
        ParamKind::DurationInPeriods => matches!(class, LiteralClass::Duration(_)),
        ParamKind::Number => class == LiteralClass::Bare,
        _ => false,
    }
}

/// Order in which leftover required fields pick from unclaimed literals.
/// Rates go last so a bare number only becomes a rate when nothing else wants it.
fn fallback_rank(kind: ParamKind) -> u8 {
    match kind {
        ParamKind::DurationInPeriods => 0,
        ParamKind::CurrencyAmount => 1,
        ParamKind::Number => 2,
        ParamKind::PercentageRate => 3,
        _ => 4,
    }
}

/// One instruction, tokenized.
struct Scan<'a> {
    text: &'a str,
    lower: String,
    words: Vec<(usize, usize)>,
    literals: Vec<Literal>,
}

impl<'a> Scan<'a> {
    fn new(extractor: &ArgumentExtractor, text: &'a str) -> Self {
        let lower = text.to_ascii_lowercase();
        let words: Vec<(usize, usize)> = extractor
            .word
            .find_iter(text)
            .map(|m| (m.start(), m.end()))
            .collect();

        let mut scan = Self {
            text,
            lower,
            words,
            literals: Vec::new(),
        };
        scan.literals = scan.scan_literals(&extractor.literal);
        scan
    }

    fn word_at(&self, byte: usize) -> usize {
        self.words
            .partition_point(|(start, _)| *start <= byte)
            .saturating_sub(1)
    }

    fn word_text(&self, index: usize) -> &str {
        self.words
            .get(index)
            .map(|(s, e)| strip_punctuation(&self.lower[*s..*e]))
            .unwrap_or_default()
    }

    fn scan_literals(&self, pattern: &Regex) -> Vec<Literal> {
        let mut literals = Vec::new();

        for caps in pattern.captures_iter(self.text) {
            let (Some(whole), Some(num)) = (caps.get(0), caps.name("num")) else {
                continue;
            };

            let before = self.text[..whole.start()].chars().next_back();
            let after = self.text[whole.end()..].chars().next();
            // "Q3", "H1", "3rd", "10x": not amounts.
            if before.map_or(false, char::is_alphabetic) || after.map_or(false, char::is_alphanumeric)
            {
                continue;
            }

            let Some(mut value) = parse_amount(num.as_str()) else {
                continue;
            };
            if let Some(mag) = caps.name("mag") {
                value *= magnitude(mag.as_str());
            }

            let mut start = whole.start();
            let prefix = &self.text[..start];
            if let Some(stripped) = prefix.strip_suffix('-') {
                let lead = stripped.chars().next_back();
                if lead.map_or(true, |c| c.is_whitespace() || matches!(c, '(' | '[' | ',' | ':')) {
                    value = -value;
                    start -= 1;
                }
            }

            let class = if caps.name("pct").is_some() {
                LiteralClass::Percent
            } else if let Some(unit) = caps.name("unit").and_then(|u| DurationUnit::parse(u.as_str())) {
                LiteralClass::Duration(unit)
            } else if caps.name("cur").is_some() || caps.name("cursfx").is_some() {
                LiteralClass::Currency
            } else {
                LiteralClass::Bare
            };

            let end = whole.end();
            literals.push(Literal {
                value,
                class,
                start,
                end,
                first_word: self.word_at(start),
                last_word: self.word_at(end.saturating_sub(1)),
            });
        }

        literals
    }

    /// Lowest cue score tying `literal` to a parameter with `cues`; lower is closer.
    /// A cue before the literal beats one the same distance after it.
    fn cue_score(&self, cues: &[&str], literal: &Literal) -> Option<usize> {
        cues.iter()
            .flat_map(|cue| find_phrase(&self.lower, cue))
            .filter_map(|(start, end)| {
                if start < literal.end && end > literal.start {
                    return None;
                }
                let cue_first = self.word_at(start);
                let cue_last = self.word_at(end.saturating_sub(1));
                let (distance, score) = if cue_last <= literal.first_word && end <= literal.start {
                    let d = literal.first_word - cue_last;
                    (d, d * 2)
                } else {
                    let d = cue_first.saturating_sub(literal.last_word);
                    (d, d * 3 + 1)
                };
                (distance <= CUE_WINDOW).then_some(score)
            })
            .min()
    }

    /// Pick a literal index for each scalar parameter.
    fn assign(&self, params: &[&ParamSpec], claimed: &mut [bool]) -> Vec<Option<usize>> {
        let mut assigned: Vec<Option<usize>> = vec![None; params.len()];

        // Cue matches, closest pair first.
        let mut pairs: Vec<(usize, usize, usize)> = Vec::new();
        for (li, literal) in self.literals.iter().enumerate() {
            if claimed[li] {
                continue;
            }
            for (pi, spec) in params.iter().enumerate() {
                if !accepts(spec.kind, literal.class) {
                    continue;
                }
                if let Some(score) = self.cue_score(spec.cues, literal) {
                    pairs.push((score, li, pi));
                }
            }
        }
        pairs.sort_unstable();
        for (_, li, pi) in pairs {
            if !claimed[li] && assigned[pi].is_none() {
                claimed[li] = true;
                assigned[pi] = Some(li);
            }
        }

        let mut leftovers: Vec<usize> = (0..params.len())
            .filter(|&pi| assigned[pi].is_none() && params[pi].required)
            .collect();
        leftovers.sort_by_key(|&pi| fallback_rank(params[pi].kind));

        // Required fields: first a literal written in the field's own form,
        // then any compatible one.
        type Fit = fn(ParamKind, LiteralClass) -> bool;
        for fits in [native as Fit, accepts as Fit] {
            for &pi in &leftovers {
                if assigned[pi].is_some() {
                    continue;
                }
                let found = self
                    .literals
                    .iter()
                    .enumerate()
                    .find(|(li, lit)| !claimed[*li] && fits(params[pi].kind, lit.class))
                    .map(|(li, _)| li);
                if let Some(li) = found {
                    claimed[li] = true;
                    assigned[pi] = Some(li);
                }
            }
        }

        assigned
    }

    fn convert(&self, spec: &ParamSpec, literal: &Literal, basis: f64) -> f64 {
        match (spec.kind, literal.class) {
            (ParamKind::PercentageRate, class) => {
                let fraction = if class == LiteralClass::Percent || literal.value.abs() >= 1.0 {
                    literal.value / 100.0
                } else {
                    literal.value
                };
                if spec.per_period {
                    fraction * self.stated_rate_frequency(literal) / basis
                } else {
                    fraction
                }
            }
            (ParamKind::DurationInPeriods, LiteralClass::Duration(unit)) => match unit.per_year() {
                Some(per_year) if spec.per_period => literal.value * basis / per_year,
                Some(per_year) => literal.value / per_year,
                None => literal.value,
            },
            _ => literal.value,
        }
    }

    /// Times per year a frequency word at `index` stands for, including
    /// "per month" style phrases.
    fn frequency_at(&self, index: usize) -> Option<f64> {
        let word = self.word_text(index);
        if let Some(c) = Compounding::from_word(word) {
            return Some(c.per_year() as f64);
        }
        let qualifier = index.checked_sub(1).map(|i| self.word_text(i));
        if !matches!(qualifier, Some("per" | "a" | "each" | "every")) {
            return None;
        }
        match word {
            "year" | "annum" => Some(1.0),
            "quarter" => Some(4.0),
            "month" => Some(12.0),
            "week" => Some(52.0),
            "day" => Some(365.0),
            _ => None,
        }
    }

    /// Frequency a rate is quoted at; annual unless a word nearby says otherwise.
    fn stated_rate_frequency(&self, literal: &Literal) -> f64 {
        let lo = literal.first_word.saturating_sub(RATE_UNIT_WINDOW);
        let hi = literal.last_word + RATE_UNIT_WINDOW;
        let mut best: Option<(usize, f64)> = None;
        for index in lo..=hi.min(self.words.len().saturating_sub(1)) {
            if index >= literal.first_word && index <= literal.last_word {
                continue;
            }
            if let Some(freq) = self.frequency_at(index) {
                let distance = if index > literal.last_word {
                    index - literal.last_word
                } else {
                    literal.first_word - index
                };
                if best.map_or(true, |(d, _)| distance < d) {
                    best = Some((distance, freq));
                }
            }
        }
        best.map_or(1.0, |(_, freq)| freq)
    }

    fn near_rate(&self, index: usize) -> bool {
        self.literals.iter().any(|lit| {
            lit.class == LiteralClass::Percent
                && index + RATE_UNIT_WINDOW >= lit.first_word
                && index <= lit.last_word + RATE_UNIT_WINDOW
        })
    }

    fn near_compounding(&self, index: usize) -> bool {
        let lo = index.saturating_sub(2);
        (lo..=index + 2).any(|i| i != index && self.word_text(i).starts_with("compound"))
    }

    /// Payments per year: an explicit frequency not describing the rate or
    /// compounding, else the unit of the first stated term, else annual.
    fn payment_basis(&self) -> f64 {
        for index in 0..self.words.len() {
            if self.near_rate(index) || self.near_compounding(index) {
                continue;
            }
            if let Some(freq) = self.frequency_at(index) {
                return freq;
            }
        }
        self.literals
            .iter()
            .find_map(|lit| match lit.class {
                LiteralClass::Duration(unit) => unit.per_year(),
                _ => None,
            })
            .unwrap_or(1.0)
    }

    fn compounding(&self) -> Option<Compounding> {
        let cues: Vec<usize> = (0..self.words.len())
            .filter(|&i| self.word_text(i).starts_with("compound"))
            .collect();
        cues.iter().find_map(|&cue| {
            let mut near: Vec<usize> = (cue.saturating_sub(2)..=cue + 2)
                .filter(|&i| i != cue)
                .collect();
            // "compounded monthly" before "monthly compounding"
            near.sort_by_key(|&i| (i.abs_diff(cue), i < cue));
            near.into_iter()
                .find_map(|i| Compounding::from_word(self.word_text(i)))
        })
    }

    /// Option whose longest matching phrase is longest overall.
    fn match_choice(&self, options: &[ChoiceOption]) -> Option<&'static str> {
        let mut best: Option<(usize, &'static str)> = None;
        for option in options {
            for phrase in std::iter::once(&option.value).chain(option.synonyms.iter()) {
                let phrase = phrase.to_ascii_lowercase();
                if !find_phrase(&self.lower, &phrase).is_empty()
                    && best.map_or(true, |(len, _)| phrase.len() > len)
                {
                    best = Some((phrase.len(), option.value));
                }
            }
        }
        best.map(|(_, value)| value)
    }

    /// A bracketed list, or the run of amounts right after a cue.
    fn series(
        &self,
        extractor: &ArgumentExtractor,
        spec: &ParamSpec,
        claimed: &mut [bool],
    ) -> Option<Vec<f64>> {
        let is_amount = |lit: &Literal| matches!(lit.class, LiteralClass::Currency | LiteralClass::Bare);

        if let Some(bracket) = extractor.bracket.find(self.text) {
            let inside: Vec<usize> = (0..self.literals.len())
                .filter(|&i| {
                    let lit = &self.literals[i];
                    !claimed[i] && lit.start >= bracket.start() && lit.end <= bracket.end() && is_amount(lit)
                })
                .collect();
            if !inside.is_empty() {
                return Some(self.claim(&inside, claimed));
            }
        }

        for (_, cue_end) in spec.cues.iter().flat_map(|cue| find_phrase(&self.lower, cue)) {
            let cue_word = self.word_at(cue_end.saturating_sub(1));
            let mut run: Vec<usize> = Vec::new();
            for (i, lit) in self.literals.iter().enumerate() {
                if lit.start < cue_end || claimed[i] {
                    continue;
                }
                let continues = match run.last() {
                    None => lit.first_word <= cue_word + SERIES_LEAD,
                    Some(&prev) => separated_only(&self.lower[self.literals[prev].end..lit.start]),
                };
                if !continues || !is_amount(lit) {
                    break;
                }
                run.push(i);
            }
            if !run.is_empty() {
                return Some(self.claim(&run, claimed));
            }
        }

        None
    }

    fn claim(&self, indices: &[usize], claimed: &mut [bool]) -> Vec<f64> {
        indices
            .iter()
            .map(|&i| {
                claimed[i] = true;
                self.literals[i].value
            })
            .collect()
    }
}

/// True when the gap between two amounts holds only list separators.
fn separated_only(gap: &str) -> bool {
    gap.split(|c: char| c.is_whitespace() || c == ',' || c == ';')
        .filter(|t| !t.is_empty())
        .all(|t| t == "and" || t == "then")
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::tools::schema::{DefaultValue, ParamSpec};

    fn extractor() -> ArgumentExtractor {
        ArgumentExtractor::new().unwrap()
    }

    fn number(args: &Arguments, name: &str) -> f64 {
        args.get(name).and_then(ArgValue::as_f64).unwrap()
    }

    fn roi_schema() -> InputSchema {
        InputSchema::new(vec![
            ParamSpec::required("initial", ParamKind::CurrencyAmount, "starting value")
                .cues(&["initial", "investment", "invested", "bought", "paid", "from"]),
            ParamSpec::required("final", ParamKind::CurrencyAmount, "ending value")
                .cues(&["final", "worth", "now", "sold", "to"]),
        ])
    }

    fn loan_schema() -> InputSchema {
        InputSchema::new(vec![
            ParamSpec::required("principal", ParamKind::CurrencyAmount, "amount borrowed")
                .cues(&["loan", "principal", "borrow", "mortgage"]),
            ParamSpec::required("rate_per_period", ParamKind::PercentageRate, "rate")
                .cues(&["at", "rate", "interest", "apr"])
                .per_period(),
            ParamSpec::required("num_periods", ParamKind::DurationInPeriods, "payments")
                .cues(&["over", "for", "term"])
                .per_period(),
        ])
    }

    fn rate_schema() -> InputSchema {
        InputSchema::new(vec![ParamSpec::required(
            "rate",
            ParamKind::PercentageRate,
            "a rate",
        )
        .cues(&["rate"])])
    }

    #[test]
    fn test_roi_question() {
        let args = extractor()
            .extract(
                "roi",
                "Calculate the ROI of an investment of $5000 that is now worth $7500",
                &roi_schema(),
            )
            .unwrap();
        assert_eq!(number(&args, "initial"), 5000.0);
        assert_eq!(number(&args, "final"), 7500.0);
    }

    #[test]
    fn test_cue_before_literal_wins() {
        let args = extractor()
            .extract(
                "roi",
                "I bought shares for $1,000 and sold them for $1,500",
                &roi_schema(),
            )
            .unwrap();
        assert_eq!(number(&args, "initial"), 1000.0);
        assert_eq!(number(&args, "final"), 1500.0);
    }

    #[test]
    fn test_positional_fallback_without_cues() {
        let args = extractor().extract("roi", "1000 1500", &roi_schema()).unwrap();
        assert_eq!(number(&args, "initial"), 1000.0);
        assert_eq!(number(&args, "final"), 1500.0);
    }

    #[test]
    fn test_loan_question_uses_monthly_basis() {
        let args = extractor()
            .extract(
                "loan_payment",
                "What is the monthly payment on a $20000 loan at 6% annual interest over 4 years?",
                &loan_schema(),
            )
            .unwrap();
        assert_eq!(number(&args, "principal"), 20000.0);
        assert!((number(&args, "rate_per_period") - 0.005).abs() < 1e-12);
        assert!((number(&args, "num_periods") - 48.0).abs() < 1e-9);
    }

    #[test]
    fn test_term_unit_sets_basis_and_magnitude_suffix() {
        let args = extractor()
            .extract("loan_payment", "$20k loan at 5% over 36 months", &loan_schema())
            .unwrap();
        assert_eq!(number(&args, "principal"), 20000.0);
        assert!((number(&args, "rate_per_period") - 0.05 / 12.0).abs() < 1e-12);
        assert!((number(&args, "num_periods") - 36.0).abs() < 1e-9);
    }

    #[test]
    fn test_percentage_normalization() {
        for text in ["8%", "8 percent", "0.08", "rate 8"] {
            let args = extractor().extract("rate", text, &rate_schema()).unwrap();
            assert!(
                (number(&args, "rate") - 0.08).abs() < 1e-9,
                "{} normalized to {}",
                text,
                number(&args, "rate")
            );
        }
    }

    #[test]
    fn test_missing_required_is_named() {
        let err = extractor()
            .extract("roi", "I invested $5000 last year", &roi_schema())
            .unwrap_err();
        match err {
            RouterError::Extraction { capability, missing } => {
                assert_eq!(capability, "roi");
                assert_eq!(missing, vec!["final".to_string()]);
            }
            other => panic!("unexpected error: {other}"),
        }
    }

    #[test]
    fn test_ticker_detection() {
        let schema = InputSchema::new(vec![ParamSpec::required(
            "ticker",
            ParamKind::TickerSymbol,
            "symbol",
        )]);
        let e = extractor();
        let ticker = |text: &str| {
            e.extract("market_data", text, &schema)
                .ok()
                .and_then(|a| a.get("ticker").and_then(|v| v.as_str().map(String::from)))
        };

        assert_eq!(ticker("What is the ROI on Apple (AAPL) today?").as_deref(), Some("AAPL"));
        assert_eq!(ticker("price for ticker msft").as_deref(), Some("MSFT"));
        assert_eq!(ticker("  tsla ").as_deref(), Some("TSLA"));
        assert_eq!(ticker("$nvda quote").as_deref(), Some("NVDA"));
        assert_eq!(ticker("what is a stock"), None);
    }

    #[test]
    fn test_series_from_brackets_and_cue() {
        let schema = InputSchema::new(vec![
            ParamSpec::required("initial_outlay", ParamKind::CurrencyAmount, "outlay")
                .cues(&["outlay", "investment", "initial"]),
            ParamSpec::required("cash_flows", ParamKind::AmountSeries, "flows")
                .cues(&["cash flows", "flows"]),
        ]);
        let e = extractor();

        let args = e
            .extract(
                "irr",
                "IRR for an initial investment of $1000 with cash flows of 300, 400, 500 and 200",
                &schema,
            )
            .unwrap();
        assert_eq!(number(&args, "initial_outlay"), 1000.0);
        assert_eq!(
            args.get("cash_flows").and_then(ArgValue::as_series),
            Some(&[300.0, 400.0, 500.0, 200.0][..])
        );

        let args = e
            .extract("irr", "flows [-50, 120, 1,500] outlay 900", &schema)
            .unwrap();
        assert_eq!(
            args.get("cash_flows").and_then(ArgValue::as_series),
            Some(&[-50.0, 120.0, 1500.0][..])
        );
        assert_eq!(number(&args, "initial_outlay"), 900.0);
    }

    #[test]
    fn test_compounding_and_defaults() {
        const KINDS: &[ChoiceOption] = &[
            ChoiceOption {
                value: "fast",
                synonyms: &["quickly"],
            },
            ChoiceOption {
                value: "slow",
                synonyms: &["gradually"],
            },
        ];
        let schema = InputSchema::new(vec![
            ParamSpec::required("principal", ParamKind::CurrencyAmount, "p"),
            ParamSpec::required("rate", ParamKind::PercentageRate, "r").cues(&["at"]),
            ParamSpec::required("periods", ParamKind::DurationInPeriods, "t").cues(&["for"]),
            ParamSpec::optional("compounds_per_period", ParamKind::CompoundingFrequency, "n")
                .default_value(DefaultValue::Number(1.0)),
            ParamSpec::optional("pace", ParamKind::Choice { options: KINDS }, "pace")
                .default_value(DefaultValue::Text("slow")),
        ]);
        let e = extractor();

        let args = e
            .extract(
                "compound_interest",
                "$1000 at 5% annual interest compounded monthly for 10 years",
                &schema,
            )
            .unwrap();
        assert_eq!(number(&args, "principal"), 1000.0);
        assert!((number(&args, "rate") - 0.05).abs() < 1e-12);
        assert_eq!(number(&args, "periods"), 10.0);
        assert_eq!(number(&args, "compounds_per_period"), 12.0);
        assert_eq!(args.get("pace").and_then(ArgValue::as_str), Some("slow"));

        let args = e
            .extract("compound_interest", "$1000 at 5% for 18 months, grows quickly", &schema)
            .unwrap();
        assert_eq!(number(&args, "periods"), 1.5);
        assert_eq!(number(&args, "compounds_per_period"), 1.0);
        assert_eq!(args.get("pace").and_then(ArgValue::as_str), Some("fast"));
    }

    #[test]
    fn test_parse_amount() {
        assert_eq!(parse_amount("$1,234.50"), Some(1234.5));
        assert_eq!(parse_amount(" 42 "), Some(42.0));
        assert_eq!(parse_amount("abc"), None);
    }
}
