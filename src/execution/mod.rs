//! Capability execution
//!
//! Runs one validated invocation under a timeout and turns the outcome into
//! an Observation. No decision making happens here.
//! Rate limiting is retried with doubling backoff; every other failure is
//! recorded as-is.

use crate::config::RouterConfig;
use crate::error::RouterError;
use crate::models::{InvocationRequest, Observation};
use crate::tools::CapabilityRegistry;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tracing::{debug, warn};

#[derive(Debug, Clone, Copy)]
pub struct ExecutionPolicy {
    pub timeout: Duration,
    /// Total attempts when rate limited, first try included.
    pub rate_limit_attempts: u32,
    pub backoff_base: Duration,
}

impl From<&RouterConfig> for ExecutionPolicy {
    fn from(config: &RouterConfig) -> Self {
        Self {
            timeout: config.invocation_timeout(),
            rate_limit_attempts: config.rate_limit_attempts.max(1),
            backoff_base: config.backoff_base(),
        }
    }
}

pub struct CapabilityExecutor {
    registry: Arc<CapabilityRegistry>,
    policy: ExecutionPolicy,
}

impl CapabilityExecutor {
    pub fn new(registry: Arc<CapabilityRegistry>, policy: ExecutionPolicy) -> Self {
        Self { registry, policy }
    }

    pub fn registry(&self) -> &CapabilityRegistry {
        &self.registry
    }

    /// Never fails: problems come back as a failed Observation.
    pub async fn execute(&self, request: &InvocationRequest) -> Observation {
        let start = Instant::now();
        let name = request.capability.as_str();
        let elapsed = || start.elapsed().as_millis() as u64;

        let entry = match self.registry.get(name) {
            Ok(entry) => entry,
            Err(e) => {
                warn!(capability = %name, "capability not registered");
                return Observation::failed(name, e.user_message(), 0, 0);
            }
        };

        if let Err(e) = entry.descriptor.schema.validate(name, &request.arguments) {
            warn!(capability = %name, error = %e, "arguments rejected before invocation");
            return Observation::failed(name, e.user_message(), 0, elapsed());
        }

        let mut attempts = 0;
        let mut delay = self.policy.backoff_base;

        loop {
            attempts += 1;
            let outcome =
                tokio::time::timeout(self.policy.timeout, entry.capability.invoke(&request.arguments))
                    .await
                    .unwrap_or_else(|_| {
                        Err(RouterError::InvocationTimeout {
                            capability: name.to_string(),
                            timeout_ms: self.policy.timeout.as_millis() as u64,
                        })
                    });

            match outcome {
                Ok(payload) => {
                    debug!(capability = %name, attempts, elapsed_ms = elapsed(), "capability succeeded");
                    return Observation::succeeded(name, payload, attempts, elapsed());
                }
                Err(e) if e.is_retryable() && attempts < self.policy.rate_limit_attempts => {
                    warn!(
                        capability = %name,
                        attempt = attempts,
                        delay_ms = delay.as_millis() as u64,
                        "rate limited, backing off"
                    );
                    tokio::time::sleep(delay).await;
                    delay = delay.saturating_mul(2);
                }
                Err(e) => {
                    warn!(capability = %name, attempts, error = %e, "capability failed");
                    return Observation::failed(name, e.user_message(), attempts, elapsed());
                }
            }
        }
    }
}
