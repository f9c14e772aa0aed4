//! Health tracking for the prediction server
//!
//! Components report their state here; the server exposes the aggregate on
//! its liveness and readiness endpoints. Readiness is tracked separately
//! because the server is live long before a model is available.

use chrono::Utc;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::sync::Arc;
use tokio::sync::RwLock;

/// Component names for health tracking
pub mod components {
    pub const PREDICTION_SERVICE: &str = "prediction_service";
    pub const TRAINER: &str = "trainer";
}

/// Health of one component, ordered from best to worst
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ComponentStatus {
    Healthy,
    /// Still answering, with reduced capability
    Degraded,
    Unhealthy,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ComponentHealth {
    pub status: ComponentStatus,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
    pub last_check_timestamp: i64,
}

impl ComponentHealth {
    pub fn new(status: ComponentStatus, message: Option<String>) -> Self {
        Self {
            status,
            message,
            last_check_timestamp: Utc::now().timestamp(),
        }
    }
}

/// Body of `/healthz`
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HealthResponse {
    /// Worst status across components
    pub status: ComponentStatus,
    pub components: BTreeMap<String, ComponentHealth>,
}

/// Body of `/readyz`
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ReadinessResponse {
    pub ready: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub reason: Option<String>,
}

/// Shared component health plus the reason the server is not ready, if any
#[derive(Debug, Clone)]
pub struct HealthRegistry {
    components: Arc<RwLock<BTreeMap<String, ComponentHealth>>>,
    not_ready: Arc<RwLock<Option<String>>>,
}

impl Default for HealthRegistry {
    fn default() -> Self {
        Self::new()
    }
}

impl HealthRegistry {
    pub fn new() -> Self {
        Self {
            components: Arc::new(RwLock::new(BTreeMap::new())),
            not_ready: Arc::new(RwLock::new(Some("no model loaded yet".to_string()))),
        }
    }

    /// Register a component as healthy
    pub async fn register(&self, name: &str) {
        self.set_healthy(name).await;
    }

    async fn update(&self, name: &str, status: ComponentStatus, message: Option<String>) {
        self.components
            .write()
            .await
            .insert(name.to_string(), ComponentHealth::new(status, message));
    }

    pub async fn set_healthy(&self, name: &str) {
        self.update(name, ComponentStatus::Healthy, None).await;
    }

    pub async fn set_degraded(&self, name: &str, message: impl Into<String>) {
        self.update(name, ComponentStatus::Degraded, Some(message.into()))
            .await;
    }

    pub async fn set_unhealthy(&self, name: &str, message: impl Into<String>) {
        self.update(name, ComponentStatus::Unhealthy, Some(message.into()))
            .await;
    }

    /// Mark ready, or not ready with the reason reported by `/readyz`
    pub async fn set_ready(&self, ready: bool, reason: Option<String>) {
        *self.not_ready.write().await = if ready {
            None
        } else {
            Some(reason.unwrap_or_else(|| "not ready".to_string()))
        };
    }

    pub async fn health(&self) -> HealthResponse {
        let components = self.components.read().await.clone();
        let status = components
            .values()
            .map(|c| c.status)
            .max()
            .unwrap_or(ComponentStatus::Healthy);
        HealthResponse { status, components }
    }

    pub async fn readiness(&self) -> ReadinessResponse {
        let reason = self.not_ready.read().await.clone();
        ReadinessResponse {
            ready: reason.is_none(),
            reason,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_health_registry_initial_state() {
        let registry = HealthRegistry::new();
        let health = registry.health().await;

        assert_eq!(health.status, ComponentStatus::Healthy);
        assert!(health.components.is_empty());
        assert!(!registry.readiness().await.ready);
    }

    #[tokio::test]
    async fn test_degraded_prediction_service() {
        let registry = HealthRegistry::new();
        registry.register(components::PREDICTION_SERVICE).await;
        registry.register(components::TRAINER).await;

        registry
            .set_degraded(components::PREDICTION_SERVICE, "model artifact not found")
            .await;

        let health = registry.health().await;
        assert_eq!(health.status, ComponentStatus::Degraded);
        assert_eq!(
            health.components[components::PREDICTION_SERVICE]
                .message
                .as_deref(),
            Some("model artifact not found")
        );
        assert_eq!(
            health.components[components::TRAINER].status,
            ComponentStatus::Healthy
        );
    }

    #[tokio::test]
    async fn test_worst_status_wins() {
        let registry = HealthRegistry::new();
        registry.set_degraded(components::PREDICTION_SERVICE, "slow").await;
        registry.set_unhealthy(components::TRAINER, "task panicked").await;
        assert_eq!(registry.health().await.status, ComponentStatus::Unhealthy);

        registry.set_healthy(components::TRAINER).await;
        assert_eq!(registry.health().await.status, ComponentStatus::Degraded);
    }

    #[tokio::test]
    async fn test_readiness_transitions() {
        let registry = HealthRegistry::new();
        registry.set_ready(true, None).await;
        assert!(registry.readiness().await.ready);

        registry
            .set_ready(false, Some("no model loaded".to_string()))
            .await;
        let readiness = registry.readiness().await;
        assert!(!readiness.ready);
        assert_eq!(readiness.reason.as_deref(), Some("no model loaded"));

        registry.set_ready(false, None).await;
        assert_eq!(registry.readiness().await.reason.as_deref(), Some("not ready"));
    }
}
