//! Market-data capability
//!
//! The live provider is external and sits behind [`MarketDataProvider`].
//! [`MarketDataAdapter`] normalizes whatever it reports into
//! `UnknownTicker`, `ProviderUnavailable` or `RateLimited`. It never retries;
//! backoff on rate limiting belongs to the executor.

use crate::error::RouterError;
use crate::models::Arguments;
use crate::tools::schema::{ChoiceOption, DefaultValue, InputSchema, ParamKind, ParamSpec};
use crate::tools::CapabilityDescriptor;
use crate::Result;
use chrono::{DateTime, NaiveDate, Utc};
use reqwest::{Client, StatusCode};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::BTreeMap;
use std::fmt;
use std::sync::Arc;
use std::time::Duration;
use tracing::debug;

pub const CAPABILITY_NAME: &str = "market_data";

pub const VALID_PERIODS: [&str; 11] = [
    "1d", "5d", "1mo", "3mo", "6mo", "1y", "2y", "5y", "10y", "ytd", "max",
];

// =============================
// Request
// =============================

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum MarketKind {
    Profile,
    CurrentPrice,
    HistoricalPrices,
    FinancialStatements,
}

impl MarketKind {
    pub fn key(&self) -> &'static str {
        match self {
            MarketKind::Profile => "profile",
            MarketKind::CurrentPrice => "current_price",
            MarketKind::HistoricalPrices => "historical_prices",
            MarketKind::FinancialStatements => "financial_statements",
        }
    }

    pub fn from_key(key: &str) -> Option<Self> {
        match key {
            "profile" => Some(MarketKind::Profile),
            "current_price" => Some(MarketKind::CurrentPrice),
            "historical_prices" => Some(MarketKind::HistoricalPrices),
            "financial_statements" => Some(MarketKind::FinancialStatements),
            _ => None,
        }
    }
}

impl fmt::Display for MarketKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.key())
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Default)]
#[serde(rename_all = "snake_case")]
pub enum StatementKind {
    #[default]
    Income,
    Balance,
    Cash,
}

impl StatementKind {
    pub fn key(&self) -> &'static str {
        match self {
            StatementKind::Income => "income",
            StatementKind::Balance => "balance",
            StatementKind::Cash => "cash",
        }
    }

    pub fn title(&self) -> &'static str {
        match self {
            StatementKind::Income => "Income statement",
            StatementKind::Balance => "Balance sheet",
            StatementKind::Cash => "Cash flow statement",
        }
    }

    pub fn from_key(key: &str) -> Option<Self> {
        match key {
            "income" => Some(StatementKind::Income),
            "balance" => Some(StatementKind::Balance),
            "cash" => Some(StatementKind::Cash),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct MarketRequest {
    pub ticker: String,
    pub kind: MarketKind,
    /// Only used by historical prices.
    pub period: String,
    /// Only used by financial statements.
    pub statement: StatementKind,
}

impl MarketRequest {
    pub fn new(ticker: impl Into<String>, kind: MarketKind) -> Self {
        Self {
            ticker: ticker.into().trim().to_uppercase(),
            kind,
            period: "1mo".to_string(),
            statement: StatementKind::default(),
        }
    }
}

// =============================
// Payloads
// =============================

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct CompanyProfile {
    pub ticker: String,
    pub name: String,
    #[serde(default)]
    pub sector: Option<String>,
    #[serde(default)]
    pub industry: Option<String>,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub market_cap: Option<f64>,
    #[serde(default)]
    pub pe_ratio: Option<f64>,
    #[serde(default)]
    pub eps: Option<f64>,
    #[serde(default)]
    pub dividend_yield: Option<f64>,
    #[serde(default)]
    pub beta: Option<f64>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct PriceQuote {
    pub ticker: String,
    pub price: f64,
    pub currency: String,
    pub timestamp: DateTime<Utc>,
    #[serde(default)]
    pub change_percent: Option<f64>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct PriceBar {
    pub date: NaiveDate,
    pub open: f64,
    pub high: f64,
    pub low: f64,
    pub close: f64,
    pub volume: u64,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct StatementPeriod {
    pub date: NaiveDate,
    /// Line item to value; `None` where the provider has no figure.
    pub items: BTreeMap<String, Option<f64>>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct FinancialStatement {
    pub ticker: String,
    pub statement: StatementKind,
    pub periods: Vec<StatementPeriod>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum MarketPayload {
    Profile(CompanyProfile),
    CurrentPrice(PriceQuote),
    HistoricalPrices {
        ticker: String,
        period: String,
        bars: Vec<PriceBar>,
    },
    FinancialStatements(FinancialStatement),
}

// =============================
// Provider seam
// =============================

#[async_trait::async_trait]
pub trait MarketDataProvider: Send + Sync {
    async fn fetch(&self, request: &MarketRequest) -> Result<MarketPayload>;
}

/// Fold any provider error into the three kinds the router understands.
fn normalize_error(ticker: &str, err: RouterError) -> RouterError {
    match err {
        RouterError::UnknownTicker(_)
        | RouterError::ProviderUnavailable(_)
        | RouterError::RateLimited(_) => err,
        RouterError::Http(e) => match e.status() {
            Some(StatusCode::NOT_FOUND) => RouterError::UnknownTicker(ticker.to_string()),
            Some(StatusCode::TOO_MANY_REQUESTS) => RouterError::RateLimited(e.to_string()),
            _ => RouterError::ProviderUnavailable(e.to_string()),
        },
        other => RouterError::ProviderUnavailable(other.to_string()),
    }
}

const KIND_OPTIONS: &[ChoiceOption] = &[
    ChoiceOption {
        value: "profile",
        synonyms: &[
            "profile",
            "company profile",
            "overview",
            "sector",
            "industry",
            "market cap",
            "market capitalization",
            "about the company",
        ],
    },
    ChoiceOption {
        value: "current_price",
        synonyms: &[
            "price",
            "current price",
            "stock price",
            "share price",
            "quote",
            "trading at",
            "worth today",
        ],
    },
    ChoiceOption {
        value: "historical_prices",
        synonyms: &[
            "history",
            "historical",
            "price history",
            "historical prices",
            "performance",
            "chart",
            "trend",
            "over the past",
            "over the last",
        ],
    },
    ChoiceOption {
        value: "financial_statements",
        synonyms: &[
            "financials",
            "financial statements",
            "statement",
            "statements",
            "income statement",
            "balance sheet",
            "cash flow statement",
            "revenue",
        ],
    },
];

const PERIOD_OPTIONS: &[ChoiceOption] = &[
    ChoiceOption {
        value: "1d",
        synonyms: &["1 day", "one day", "today", "intraday"],
    },
    ChoiceOption {
        value: "5d",
        synonyms: &["5 days", "five days", "week", "past week", "last week"],
    },
    ChoiceOption {
        value: "1mo",
        synonyms: &["1 month", "one month", "month", "past month", "last month"],
    },
    ChoiceOption {
        value: "3mo",
        synonyms: &["3 months", "three months", "quarter", "past quarter"],
    },
    ChoiceOption {
        value: "6mo",
        synonyms: &["6 months", "six months", "half year", "half a year"],
    },
    ChoiceOption {
        value: "1y",
        synonyms: &["1 year", "one year", "12 months", "year", "past year", "last year"],
    },
    ChoiceOption {
        value: "2y",
        synonyms: &["2 years", "two years"],
    },
    ChoiceOption {
        value: "5y",
        synonyms: &["5 years", "five years"],
    },
    ChoiceOption {
        value: "10y",
        synonyms: &["10 years", "ten years", "decade"],
    },
    ChoiceOption {
        value: "ytd",
        synonyms: &["year to date", "year-to-date"],
    },
    ChoiceOption {
        value: "max",
        synonyms: &["all time", "all-time", "since ipo"],
    },
];

const STATEMENT_OPTIONS: &[ChoiceOption] = &[
    ChoiceOption {
        value: "income",
        synonyms: &["income statement", "income", "profit and loss", "p&l", "earnings"],
    },
    ChoiceOption {
        value: "balance",
        synonyms: &["balance sheet", "balance", "assets", "liabilities"],
    },
    ChoiceOption {
        value: "cash",
        synonyms: &["cash flow", "cash flows", "cashflow", "cash"],
    },
];

pub fn descriptor() -> CapabilityDescriptor {
    CapabilityDescriptor {
        name: CAPABILITY_NAME.to_string(),
        description: "Fetch live market data for a stock ticker: company profile, current \
                      price, historical prices (period 1d..max) or financial statements \
                      (income, balance, cash)."
            .to_string(),
        group: None,
        schema: InputSchema::new(vec![
            ParamSpec::required("ticker", ParamKind::TickerSymbol, "stock symbol, e.g. AAPL"),
            ParamSpec::optional(
                "kind",
                ParamKind::Choice {
                    options: KIND_OPTIONS,
                },
                "what to fetch",
            )
            .default_value(DefaultValue::Text("current_price")),
            ParamSpec::optional(
                "period",
                ParamKind::Choice {
                    options: PERIOD_OPTIONS,
                },
                "history window",
            )
            .default_value(DefaultValue::Text("1mo")),
            ParamSpec::optional(
                "statement",
                ParamKind::Choice {
                    options: STATEMENT_OPTIONS,
                },
                "which statement",
            )
            .default_value(DefaultValue::Text("income")),
        ]),
    }
}

// =============================
// Adapter
// =============================

pub struct MarketDataAdapter {
    provider: Arc<dyn MarketDataProvider>,
}

impl MarketDataAdapter {
    pub fn new(provider: Arc<dyn MarketDataProvider>) -> Self {
        Self { provider }
    }

    pub async fn fetch(&self, request: &MarketRequest) -> Result<MarketPayload> {
        if request.kind == MarketKind::HistoricalPrices
            && !VALID_PERIODS.contains(&request.period.as_str())
        {
            return Err(RouterError::invalid(
                "period",
                format!("must be one of: {}", VALID_PERIODS.join(", ")),
            ));
        }

        let mut payload = self
            .provider
            .fetch(request)
            .await
            .map_err(|e| normalize_error(&request.ticker, e))?;

        if let MarketPayload::HistoricalPrices { bars, .. } = &mut payload {
            bars.sort_by_key(|b| b.date);
        }

        debug!(ticker = %request.ticker, kind = %request.kind, "market data fetched");
        Ok(payload)
    }

    pub async fn invoke(&self, args: &Arguments) -> Result<Value> {
        let ticker = args
            .get("ticker")
            .and_then(|v| v.as_str())
            .ok_or_else(|| RouterError::invalid("ticker", "missing"))?;
        let text = |name: &str| args.get(name).and_then(|v| v.as_str());

        let mut request = MarketRequest::new(
            ticker,
            text("kind")
                .and_then(MarketKind::from_key)
                .unwrap_or(MarketKind::CurrentPrice),
        );
        if let Some(period) = text("period") {
            request.period = period.to_string();
        }
        if let Some(statement) = text("statement").and_then(StatementKind::from_key) {
            request.statement = statement;
        }

        let payload = self.fetch(&request).await?;
        Ok(serde_json::to_value(payload)?)
    }
}

// =============================
// HTTP provider
// =============================

/// REST market-data provider: `GET {base}/{kind}/{ticker}`.
pub struct HttpMarketDataProvider {
    client: Client,
    base_url: Option<String>,
}

impl HttpMarketDataProvider {
    pub fn new(base_url: Option<String>, timeout: Duration) -> Result<Self> {
        let client = Client::builder()
            .pool_idle_timeout(Duration::from_secs(60))
            .pool_max_idle_per_host(8)
            .timeout(timeout)
            .build()?;

        Ok(Self {
            client,
            base_url: base_url.map(|u| u.trim_end_matches('/').to_string()),
        })
    }

    fn url(&self, base: &str, request: &MarketRequest) -> String {
        let mut url = format!("{}/{}/{}", base, request.kind.key(), request.ticker);
        match request.kind {
            MarketKind::HistoricalPrices => url.push_str(&format!("?period={}", request.period)),
            MarketKind::FinancialStatements => {
                url.push_str(&format!("?statement={}", request.statement.key()))
            }
            _ => {}
        }
        url
    }
}

#[async_trait::async_trait]
impl MarketDataProvider for HttpMarketDataProvider {
    async fn fetch(&self, request: &MarketRequest) -> Result<MarketPayload> {
        let base = self.base_url.as_deref().ok_or_else(|| {
            RouterError::ProviderUnavailable("MARKET_DATA_BASE_URL is not configured".to_string())
        })?;

        let response = self
            .client
            .get(self.url(base, request))
            .send()
            .await
            .map_err(|e| RouterError::ProviderUnavailable(format!("request failed: {}", e)))?;

        match response.status() {
            StatusCode::NOT_FOUND => return Err(RouterError::UnknownTicker(request.ticker.clone())),
            StatusCode::TOO_MANY_REQUESTS => {
                return Err(RouterError::RateLimited(format!(
                    "provider throttled {}",
                    request.ticker
                )))
            }
            status if !status.is_success() => {
                return Err(RouterError::ProviderUnavailable(format!(
                    "provider returned {}",
                    status
                )))
            }
            _ => {}
        }

        let body: Value = response
            .json()
            .await
            .map_err(|e| RouterError::ProviderUnavailable(format!("invalid JSON response: {}", e)))?;

        let payload = match request.kind {
            MarketKind::Profile => MarketPayload::Profile(serde_json::from_value(body)?),
            MarketKind::CurrentPrice => MarketPayload::CurrentPrice(serde_json::from_value(body)?),
            MarketKind::HistoricalPrices => MarketPayload::HistoricalPrices {
                ticker: request.ticker.clone(),
                period: request.period.clone(),
                bars: serde_json::from_value(body)?,
            },
            MarketKind::FinancialStatements => {
                MarketPayload::FinancialStatements(serde_json::from_value(body)?)
            }
        };
        Ok(payload)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::ArgValue;
    use serde_json::json;

    struct FailingProvider(fn() -> RouterError);

    #[async_trait::async_trait]
    impl MarketDataProvider for FailingProvider {
        async fn fetch(&self, _request: &MarketRequest) -> Result<MarketPayload> {
            Err((self.0)())
        }
    }

    struct HistoryProvider;

    #[async_trait::async_trait]
    impl MarketDataProvider for HistoryProvider {
        async fn fetch(&self, request: &MarketRequest) -> Result<MarketPayload> {
            let bar = |day: u32, close: f64| PriceBar {
                date: NaiveDate::from_ymd_opt(2024, 3, day).unwrap(),
                open: close,
                high: close,
                low: close,
                close,
                volume: 1_000,
            };
            Ok(MarketPayload::HistoricalPrices {
                ticker: request.ticker.clone(),
                period: request.period.clone(),
                bars: vec![bar(3, 12.0), bar(1, 10.0), bar(2, 11.0)],
            })
        }
    }

    #[tokio::test]
    async fn test_errors_are_normalized() {
        let adapter = MarketDataAdapter::new(Arc::new(FailingProvider(|| {
            RouterError::Llm("socket closed".into())
        })));
        let err = adapter
            .fetch(&MarketRequest::new("aapl", MarketKind::CurrentPrice))
            .await
            .unwrap_err();
        assert!(matches!(err, RouterError::ProviderUnavailable(_)));

        let adapter = MarketDataAdapter::new(Arc::new(FailingProvider(|| {
            RouterError::RateLimited("slow down".into())
        })));
        let err = adapter
            .fetch(&MarketRequest::new("aapl", MarketKind::CurrentPrice))
            .await
            .unwrap_err();
        assert!(err.is_retryable());
    }

    #[tokio::test]
    async fn test_history_is_ordered_and_period_checked() {
        let adapter = MarketDataAdapter::new(Arc::new(HistoryProvider));

        let mut args = Arguments::new();
        args.insert("ticker".into(), ArgValue::Text("msft".into()));
        args.insert("kind".into(), ArgValue::Text("historical_prices".into()));
        args.insert("period".into(), ArgValue::Text("5d".into()));
        let payload = adapter.invoke(&args).await.unwrap();

        assert_eq!(payload["kind"], "historical_prices");
        assert_eq!(payload["ticker"], "MSFT");
        let closes: Vec<f64> = payload["bars"]
            .as_array()
            .unwrap()
            .iter()
            .map(|b| b["close"].as_f64().unwrap())
            .collect();
        assert_eq!(closes, vec![10.0, 11.0, 12.0]);

        let mut request = MarketRequest::new("msft", MarketKind::HistoricalPrices);
        request.period = "7w".into();
        assert!(matches!(
            adapter.fetch(&request).await,
            Err(RouterError::InvalidArgument { .. })
        ));
    }

    #[tokio::test]
    async fn test_unconfigured_http_provider_is_unavailable() {
        let provider = HttpMarketDataProvider::new(None, Duration::from_secs(1)).unwrap();
        let err = provider
            .fetch(&MarketRequest::new("AAPL", MarketKind::Profile))
            .await
            .unwrap_err();
        assert!(matches!(err, RouterError::ProviderUnavailable(_)));
    }

    #[test]
    fn test_payload_wire_format() {
        let quote = MarketPayload::CurrentPrice(PriceQuote {
            ticker: "AAPL".into(),
            price: 190.5,
            currency: "USD".into(),
            timestamp: "2024-03-01T15:00:00Z".parse().unwrap(),
            change_percent: None,
        });
        let value = serde_json::to_value(&quote).unwrap();
        assert_eq!(value["kind"], json!("current_price"));
        assert_eq!(value["price"], json!(190.5));
        assert_eq!(value["currency"], json!("USD"));
    }
}
