//! Intent Classifier
//!
//! Sorts a question into one of four routes:
//! - Definitional: explain a concept ("what is the current ratio?")
//! - MarketData: live figures for a ticker ("AAPL share price")
//! - Calculation: a formula with the figures stated ("ROI of $5000 now worth $7500")
//! - PriceThenCalculation: a formula that needs a live price first

use crate::calc::Formula;
use crate::extractor::{find_phrase, TICKER_STOPWORDS};
use crate::tools::market_data::MarketKind;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Intent {
    Definitional,
    MarketData(MarketKind),
    Calculation(Formula),
    PriceThenCalculation(Formula),
}

/// Static keyword tables, matched on whole words (so "duration" is not "ratio")
const FORMULA_KEYWORDS: &[(Formula, &[&str])] = &[
    (
        Formula::InternalRateOfReturn,
        &["irr", "internal rate of return"],
    ),
    (Formula::NetPresentValue, &["npv", "net present value"]),
    (
        Formula::LoanPayment,
        &[
            "loan",
            "loans",
            "mortgage",
            "monthly payment",
            "amortization",
            "amortize",
            "amortized",
            "installment",
            "installments",
        ],
    ),
    (
        Formula::CompoundInterest,
        &[
            "compound",
            "compounded",
            "compounding",
            "future value",
            "grow to",
            "will it grow",
        ],
    ),
    (
        Formula::Roi,
        &["roi", "return on investment", "return on my investment", "my return"],
    ),
    (
        Formula::FinancialRatio,
        &[
            "ratio",
            "ratios",
            "profit margin",
            "return on equity",
            "return on assets",
            "interest coverage",
            "p/e",
            "p/b",
        ],
    ),
];

const MARKET_KEYWORDS: &[(MarketKind, &[&str])] = &[
    (
        MarketKind::FinancialStatements,
        &[
            "financial statement",
            "income statement",
            "balance sheet",
            "cash flow statement",
            "financials",
            "revenue",
        ],
    ),
    (
        MarketKind::HistoricalPrices,
        &["historical", "history", "over the past", "over the last", "chart", "performed"],
    ),
    (
        MarketKind::Profile,
        &["profile", "sector", "industry", "market cap", "about the company"],
    ),
    (
        MarketKind::CurrentPrice,
        &["price", "prices", "quote", "trading at", "worth today", "today's value"],
    ),
];

/// Interaction classifier
pub struct IntentClassifier;

impl IntentClassifier {
    pub fn classify(text: &str) -> Intent {
        let lowered = text.to_lowercase();

        let formula = detect(&lowered, FORMULA_KEYWORDS);
        let market = if mentions_ticker(text) {
            detect(&lowered, MARKET_KEYWORDS)
        } else {
            None
        };
        let has_figures = text.chars().any(|c| c.is_ascii_digit());

        match (formula, market) {
            (Some(Formula::Roi), Some(MarketKind::CurrentPrice)) => {
                Intent::PriceThenCalculation(Formula::Roi)
            }
            (Some(formula), _) if has_figures => Intent::Calculation(formula),
            (_, Some(kind)) => Intent::MarketData(kind),
            _ => Intent::Definitional,
        }
    }
}

fn detect<T: Copy>(text: &str, table: &[(T, &[&str])]) -> Option<T> {
    table
        .iter()
        .find(|(_, keywords)| keywords.iter().any(|kw| !find_phrase(text, kw).is_empty()))
        .map(|(value, _)| *value)
}

/// An all-caps symbol ("AAPL", "BRK.B") or a cashtag ("$tsla").
fn mentions_ticker(text: &str) -> bool {
    text.split_whitespace().any(|word| {
        if let Some(tag) = word.strip_prefix('$') {
            let tag = tag.trim_end_matches(|c: char| !c.is_ascii_alphanumeric());
            return !tag.is_empty() && tag.chars().all(|c| c.is_ascii_alphabetic());
        }
        let word = word.trim_matches(|c: char| !c.is_ascii_alphanumeric() && c != '.');
        let head = word.split('.').next().unwrap_or_default();
        (2..=5).contains(&head.len())
            && head.chars().all(|c| c.is_ascii_uppercase())
            && !TICKER_STOPWORDS.contains(&head)
    })
}
