//! Capability registry
//!
//! Capabilities are a closed set: retrieval, market data, and one entry per
//! calculation formula. Each is registered once at startup under a unique
//! name together with its descriptor; the registry is read-only afterwards.

pub mod calculation;
pub mod market_data;
pub mod retrieval;
pub mod schema;

use crate::calc::Formula;
use crate::error::RouterError;
use crate::models::Arguments;
use crate::Result;
use market_data::{MarketDataAdapter, MarketDataProvider};
use retrieval::{RetrievalAdapter, SemanticIndex};
use schema::InputSchema;
use serde::Serialize;
use serde_json::Value;
use std::collections::HashMap;
use std::sync::Arc;

/// What the decision step sees about a capability.
#[derive(Debug, Clone, Serialize)]
pub struct CapabilityDescriptor {
    pub name: String,
    pub description: String,
    /// Calculation formulas share the `financial_calculator` group.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub group: Option<String>,
    pub schema: InputSchema,
}

impl CapabilityDescriptor {
    /// `- name(params): description` line for prompts.
    pub fn menu_line(&self) -> String {
        format!("- {}: {}", self.schema.signature(&self.name), self.description)
    }
}

/// Invocation target, keyed by name in the registry.
#[derive(Clone)]
pub enum Capability {
    Retrieval(Arc<RetrievalAdapter>),
    MarketData(Arc<MarketDataAdapter>),
    Calculation(Formula),
}

impl Capability {
    pub async fn invoke(&self, args: &Arguments) -> Result<Value> {
        match self {
            Capability::Retrieval(adapter) => adapter.invoke(args).await,
            Capability::MarketData(adapter) => adapter.invoke(args).await,
            Capability::Calculation(formula) => calculation::invoke(*formula, args),
        }
    }
}

#[derive(Clone)]
pub struct RegisteredCapability {
    pub descriptor: CapabilityDescriptor,
    pub capability: Capability,
}

/// Registry for looking up capabilities by name
#[derive(Default)]
pub struct CapabilityRegistry {
    capabilities: HashMap<String, RegisteredCapability>,
    /// Registration order, so descriptions come out stable.
    order: Vec<String>,
}

impl CapabilityRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register(
        &mut self,
        descriptor: CapabilityDescriptor,
        capability: Capability,
    ) -> Result<()> {
        if self.capabilities.contains_key(&descriptor.name) {
            return Err(RouterError::DuplicateCapability(descriptor.name));
        }
        let name = descriptor.name.clone();
        self.capabilities.insert(
            name.clone(),
            RegisteredCapability {
                descriptor,
                capability,
            },
        );
        self.order.push(name);
        Ok(())
    }

    pub fn get(&self, name: &str) -> Result<&RegisteredCapability> {
        self.capabilities
            .get(name)
            .ok_or_else(|| RouterError::UnknownCapability(name.to_string()))
    }

    pub fn describe_all(&self) -> Vec<&CapabilityDescriptor> {
        self.order
            .iter()
            .filter_map(|name| self.capabilities.get(name))
            .map(|c| &c.descriptor)
            .collect()
    }

    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.order.iter().map(|s| s.as_str())
    }

    pub fn len(&self) -> usize {
        self.order.len()
    }

    pub fn is_empty(&self) -> bool {
        self.order.is_empty()
    }
}

/// Registry with knowledge search, market data and every calculation formula.
pub fn create_default_registry(
    index: Arc<dyn SemanticIndex>,
    provider: Arc<dyn MarketDataProvider>,
    retrieval_k: usize,
) -> Result<CapabilityRegistry> {
    let mut registry = CapabilityRegistry::new();

    registry.register(
        retrieval::descriptor(),
        Capability::Retrieval(Arc::new(RetrievalAdapter::new(index, retrieval_k))),
    )?;
    registry.register(
        market_data::descriptor(),
        Capability::MarketData(Arc::new(MarketDataAdapter::new(provider))),
    )?;
    for formula in Formula::ALL {
        registry.register(
            calculation::descriptor(formula),
            Capability::Calculation(formula),
        )?;
    }

    Ok(registry)
}
