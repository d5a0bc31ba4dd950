//! Retrieval capability
//!
//! The semantic index itself is an external collaborator behind
//! [`SemanticIndex`]. [`RetrievalAdapter`] is what the router talks to: it
//! bounds and orders results and folds every index failure into
//! `RouterError::RetrievalUnavailable`.
//!
//! [`InMemoryIndex`] is a term-overlap index for development and tests.

use crate::error::RouterError;
use crate::models::Arguments;
use crate::tools::schema::{InputSchema, ParamKind, ParamSpec};
use crate::tools::CapabilityDescriptor;
use crate::Result;
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use std::cmp::Ordering;
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::RwLock;
use tracing::debug;

pub const CAPABILITY_NAME: &str = "knowledge_search";

/// Upper bound on snippets per search, whatever the caller asks for.
const MAX_K: usize = 20;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Document {
    pub id: String,
    pub title: String,
    pub text: String,
}

impl Document {
    pub fn new(id: impl Into<String>, title: impl Into<String>, text: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            title: title.into(),
            text: text.into(),
        }
    }
}

/// A ranked search hit.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Snippet {
    pub text: String,
    pub score: f64,
    pub source: String,
}

/// Seam to the external vector index.
#[async_trait::async_trait]
pub trait SemanticIndex: Send + Sync {
    async fn index(&self, document: Document) -> Result<()>;
    async fn search(&self, query: &str, k: usize) -> Result<Vec<Snippet>>;
}

pub fn descriptor() -> CapabilityDescriptor {
    CapabilityDescriptor {
        name: CAPABILITY_NAME.to_string(),
        description: "Search the financial-education knowledge base for definitions and \
                      explanations (ratios, market concepts, financial statements). \
                      Use for 'what is' and 'explain' questions."
            .to_string(),
        group: None,
        schema: InputSchema::new(vec![
            ParamSpec::required("query", ParamKind::FreeText, "what to look up"),
            ParamSpec::optional("k", ParamKind::Number, "number of snippets").cues(&["top"]),
        ]),
    }
}

pub struct RetrievalAdapter {
    index: Arc<dyn SemanticIndex>,
    default_k: usize,
}

impl RetrievalAdapter {
    pub fn new(index: Arc<dyn SemanticIndex>, default_k: usize) -> Self {
        Self {
            index,
            default_k: default_k.clamp(1, MAX_K),
        }
    }

    /// At most `k` snippets, best first.
    pub async fn search(&self, query: &str, k: usize) -> Result<Vec<Snippet>> {
        if k == 0 {
            return Ok(Vec::new());
        }

        let mut hits = self.index.search(query, k).await.map_err(|e| match e {
            RouterError::RetrievalUnavailable(_) => e,
            other => RouterError::RetrievalUnavailable(other.to_string()),
        })?;

        hits.retain(|h| h.score.is_finite());
        hits.sort_by(|a, b| b.score.partial_cmp(&a.score).unwrap_or(Ordering::Equal));
        hits.truncate(k);

        debug!(query, k, hits = hits.len(), "knowledge search");
        Ok(hits)
    }

    pub async fn invoke(&self, args: &Arguments) -> Result<Value> {
        let query = args
            .get("query")
            .and_then(|v| v.as_str())
            .ok_or_else(|| RouterError::invalid("query", "missing"))?;
        let k = args
            .get("k")
            .and_then(|v| v.as_f64())
            .map(|k| (k.max(1.0) as usize).min(MAX_K))
            .unwrap_or(self.default_k);

        let snippets = self.search(query, k).await?;
        Ok(json!({
            "query": query,
            "snippets": snippets,
        }))
    }
}

//
// ================= Chunking =================
//

#[derive(Debug, Clone)]
pub struct ChunkingConfig {
    /// Target chunk size in characters.
    pub chunk_size: usize,
    pub chunk_overlap: usize,
    /// Preferred break points, strongest first.
    pub separators: Vec<&'static str>,
}

impl Default for ChunkingConfig {
    fn default() -> Self {
        Self {
            chunk_size: 1000,
            chunk_overlap: 200,
            separators: vec!["\n\n", "\n", ". ", " "],
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct Chunk {
    pub id: String,
    pub source: String,
    pub text: String,
}

#[derive(Debug, Default)]
pub struct Chunker {
    config: ChunkingConfig,
}

impl Chunker {
    pub fn new(config: ChunkingConfig) -> Self {
        Self { config }
    }

    /// Split on the strongest separator inside each window (UTF-8 safe).
    pub fn chunk(&self, document: &Document) -> Vec<Chunk> {
        let chars: Vec<char> = document.text.chars().collect();
        let total = chars.len();
        let mut chunks = Vec::new();
        let mut current = 0;

        while current < total {
            let target_end = (current + self.config.chunk_size).min(total);
            let mut end = target_end;

            if target_end < total {
                let window: String = chars[current..target_end].iter().collect();
                for sep in &self.config.separators {
                    if let Some(pos) = window.rfind(sep) {
                        let upto = window[..pos].chars().count() + sep.chars().count();
                        if upto > 0 {
                            end = current + upto;
                            break;
                        }
                    }
                }
            }
            if end <= current {
                end = (current + 1).min(total);
            }

            let text: String = chars[current..end].iter().collect();
            let trimmed = text.trim();
            if !trimmed.is_empty() {
                chunks.push(Chunk {
                    id: format!("{}_{}", document.id, chunks.len()),
                    source: document.title.clone(),
                    text: trimmed.to_string(),
                });
            }

            if end >= total {
                break;
            }
            let overlap = self.config.chunk_overlap.min(end - current);
            let next = end.saturating_sub(overlap);
            current = if next > current { next } else { end };
        }

        chunks
    }
}

//
// ================= In-memory index =================
//

fn terms(text: &str) -> HashMap<String, f64> {
    let mut counts = HashMap::new();
    for term in text
        .split(|c: char| !c.is_alphanumeric())
        .filter(|t| t.len() > 1)
        .map(str::to_lowercase)
        .filter(|t| !STOPWORDS.contains(&t.as_str()))
    {
        *counts.entry(term).or_insert(0.0) += 1.0;
    }
    counts
}

fn cosine(a: &HashMap<String, f64>, b: &HashMap<String, f64>) -> f64 {
    let dot: f64 = a
        .iter()
        .filter_map(|(term, x)| b.get(term).map(|y| x * y))
        .sum();
    let norm = |v: &HashMap<String, f64>| v.values().map(|x| x * x).sum::<f64>().sqrt();
    let denom = norm(a) * norm(b);
    if denom == 0.0 {
        0.0
    } else {
        dot / denom
    }
}

const STOPWORDS: &[&str] = &[
    "the", "is", "are", "what", "of", "and", "or", "to", "in", "on", "for", "an", "it", "its",
    "by", "as", "be", "how", "do", "does", "with", "that", "this", "from", "at", "can", "me",
    "explain", "tell", "about",
];

struct IndexedChunk {
    chunk: Chunk,
    terms: HashMap<String, f64>,
}

/// Term-overlap cosine index held in memory.
#[derive(Default)]
pub struct InMemoryIndex {
    chunker: Chunker,
    entries: RwLock<Vec<IndexedChunk>>,
}

impl InMemoryIndex {
    pub fn new() -> Self {
        Self::default()
    }

    /// Index built from [`seed_documents`].
    pub async fn seeded() -> Result<Self> {
        let index = Self::new();
        for document in seed_documents() {
            index.index(document).await?;
        }
        Ok(index)
    }

    pub async fn len(&self) -> usize {
        self.entries.read().await.len()
    }
}

#[async_trait::async_trait]
impl SemanticIndex for InMemoryIndex {
    async fn index(&self, document: Document) -> Result<()> {
        let chunks = self.chunker.chunk(&document);
        let mut entries = self.entries.write().await;
        entries.retain(|e| !e.chunk.id.starts_with(&format!("{}_", document.id)));
        for chunk in chunks {
            let terms = terms(&chunk.text);
            entries.push(IndexedChunk { chunk, terms });
        }
        Ok(())
    }

    async fn search(&self, query: &str, k: usize) -> Result<Vec<Snippet>> {
        let query_terms = terms(query);
        let entries = self.entries.read().await;

        let mut scored: Vec<Snippet> = entries
            .iter()
            .map(|e| (e, cosine(&query_terms, &e.terms)))
            .filter(|(_, score)| *score > 0.0)
            .map(|(e, score)| Snippet {
                text: e.chunk.text.clone(),
                score,
                source: e.chunk.source.clone(),
            })
            .collect();
        scored.sort_by(|a, b| b.score.partial_cmp(&a.score).unwrap_or(Ordering::Equal));
        scored.truncate(k);
        Ok(scored)
    }
}

/// Starter education corpus.
pub fn seed_documents() -> Vec<Document> {
    vec![
        Document::new("ratios", "Financial ratios", RATIOS_DOC),
        Document::new("market", "Stock market basics", MARKET_DOC),
        Document::new("statements", "Financial statements", STATEMENTS_DOC),
    ]
}

const RATIOS_DOC: &str = "\
Financial ratios are analysis tools for judging the financial health of a company.

Liquidity ratios

Current ratio. Formula: current assets / current liabilities. The current ratio measures a \
company's ability to pay its short-term obligations. A current ratio above 1 means the company \
can cover its short-term debts with its short-term assets.

Quick ratio (acid test). Formula: (current assets - inventories) / current liabilities. Like the \
current ratio, but it excludes inventories, which can be hard to turn into cash quickly.

Profitability ratios

Net profit margin. Formula: net income / net sales * 100. Shows what percentage of sales becomes \
profit after all expenses.

Return on equity (ROE). Formula: net income / shareholders' equity * 100. Measures the return \
shareholders earn on their investment in the company.

Return on assets (ROA). Formula: net income / total assets * 100. Shows how efficiently a company \
uses its assets to generate profit.

Leverage ratios

Debt ratio. Formula: total liabilities / total assets * 100. Shows what share of assets is \
financed with debt.

Interest coverage ratio. Formula: EBIT / interest expense. Measures the ability to pay interest \
on debt out of operating profit.";

const MARKET_DOC: &str = "\
Stock market basics

What is a stock? A stock (share) represents a part of a company's capital. Buying a share buys a \
small piece of ownership and the right to receive dividends if the company pays them.

Fundamental analysis evaluates the intrinsic value of a company from economic, financial and \
qualitative factors: financial statements, competitive position, management, growth prospects \
and the macroeconomic environment.

Technical analysis studies historical price patterns and trading volume to anticipate future \
moves, on the idea that prices move in trends and history tends to repeat.

Market indices such as the S&P 500 or the Dow Jones track the behaviour of a representative \
group of stocks from a market or sector.

Market capitalization is the total market value of a company's outstanding shares: the current \
share price multiplied by the number of shares outstanding.

Investment strategies: value investing looks for stocks priced below their intrinsic value; \
growth investing focuses on companies with high growth potential; income investing seeks \
recurring income through dividends.";

const STATEMENTS_DOC: &str = "\
Financial statements provide essential information about a company's financial position and \
performance.

Balance sheet. The balance sheet shows a company's assets, liabilities and equity at a point in \
time. Current assets are expected to become cash within a year (cash, receivables, inventories); \
non-current assets are long-term (property, plant and equipment, long-term investments). Current \
liabilities are due within a year (payables, short-term loans); non-current liabilities are \
long-term (long-term debt, pension obligations). Equity is the owners' claim on assets after all \
liabilities.

Income statement. The income statement (profit and loss) shows revenue, expenses and profit or \
loss over a period: revenue, cost of sales, operating expenses, EBITDA (earnings before interest, \
taxes, depreciation and amortization), EBIT (earnings before interest and taxes) and net income.

Cash flow statement. Shows how changes in the balance sheet and income affect cash: cash flows \
from operating activities, from investing activities (buying or selling long-term assets) and \
from financing activities (loans, dividends).";
