//! Telemetry plumbing around the correlator
//!
//! This module provides:
//! - `TelemetryConfig`: explicit configuration read from the environment
//! - `exporter`: the boundary where finished spans and log records leave the core
//! - `metrics`: Prometheus metrics about the correlator itself
//!
//! Nothing here is initialized globally. The caller builds a config and an
//! exporter at process start, passes both to `EventCorrelator::new`, and
//! calls `EventCorrelator::shutdown` at process end.

pub mod exporter;
pub mod metrics;

pub use exporter::{ExportError, ExportRecord, Exporter, InMemoryExporter, JsonLinesExporter};
pub use metrics::CorrelatorMetrics;

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Default service name reported in the resource.
pub const DEFAULT_SERVICE_NAME: &str = "ansible-playbook";
/// Default OTLP/HTTP traces endpoint.
pub const DEFAULT_TRACES_ENDPOINT: &str = "http://localhost:4318/v1/traces";
/// Default OTLP/HTTP logs endpoint.
pub const DEFAULT_LOGS_ENDPOINT: &str = "http://localhost:4318/v1/logs";

/// Telemetry errors
#[derive(Error, Debug)]
pub enum TelemetryError {
    #[error("Export error: {0}")]
    Export(#[from] ExportError),

    #[error("Metrics error: {0}")]
    Metrics(#[from] prometheus::Error),

    #[error("Configuration error: {0}")]
    Config(String),
}

pub type Result<T> = std::result::Result<T, TelemetryError>;

/// Resource attributes stamped on every exported record.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Resource {
    #[serde(rename = "service.name")]
    pub service_name: String,
}

/// Telemetry configuration
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TelemetryConfig {
    /// Service name reported in the resource
    pub service_name: String,

    /// Endpoint spans are exported to
    pub traces_endpoint: String,

    /// Endpoint log records are exported to
    pub logs_endpoint: String,

    /// Enable Prometheus metrics about the correlator
    pub enable_metrics: bool,
}

impl Default for TelemetryConfig {
    fn default() -> Self {
        Self {
            service_name: DEFAULT_SERVICE_NAME.to_string(),
            traces_endpoint: DEFAULT_TRACES_ENDPOINT.to_string(),
            logs_endpoint: DEFAULT_LOGS_ENDPOINT.to_string(),
            enable_metrics: true,
        }
    }
}

impl TelemetryConfig {
    /// Create a new config builder
    pub fn builder() -> TelemetryConfigBuilder {
        TelemetryConfigBuilder::new()
    }

    /// Create config from environment variables
    pub fn from_env() -> Self {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Create config from an arbitrary variable lookup.
    ///
    /// Empty values count as unset.
    pub fn from_lookup<F>(lookup: F) -> Self
    where
        F: Fn(&str) -> Option<String>,
    {
        let var = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());
        let defaults = Self::default();

        Self {
            service_name: var("OTEL_SERVICE_NAME").unwrap_or(defaults.service_name),
            traces_endpoint: var("OTEL_EXPORTER_OTLP_TRACES_ENDPOINT")
                .unwrap_or(defaults.traces_endpoint),
            logs_endpoint: var("OTEL_EXPORTER_OTLP_LOGS_ENDPOINT")
                .unwrap_or(defaults.logs_endpoint),
            enable_metrics: var("OTEL_CORRELATOR_ENABLE_METRICS")
                .map(|v| v.parse().unwrap_or(true))
                .unwrap_or(defaults.enable_metrics),
        }
    }

    /// Resource attributes derived from this config
    pub fn resource(&self) -> Resource {
        Resource {
            service_name: self.service_name.clone(),
        }
    }
}

/// Builder for TelemetryConfig
pub struct TelemetryConfigBuilder {
    config: TelemetryConfig,
}

impl TelemetryConfigBuilder {
    /// Create a new builder with defaults
    pub fn new() -> Self {
        Self {
            config: TelemetryConfig::default(),
        }
    }

    pub fn service_name(mut self, name: impl Into<String>) -> Self {
        self.config.service_name = name.into();
        self
    }

    pub fn traces_endpoint(mut self, endpoint: impl Into<String>) -> Self {
        self.config.traces_endpoint = endpoint.into();
        self
    }

    pub fn logs_endpoint(mut self, endpoint: impl Into<String>) -> Self {
        self.config.logs_endpoint = endpoint.into();
        self
    }

    /// Enable or disable metrics
    pub fn enable_metrics(mut self, enabled: bool) -> Self {
        self.config.enable_metrics = enabled;
        self
    }

    /// Build the configuration
    pub fn build(self) -> TelemetryConfig {
        self.config
    }
}

impl Default for TelemetryConfigBuilder {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    #[test]
    fn test_default_config() {
        let config = TelemetryConfig::default();
        assert_eq!(config.service_name, "ansible-playbook");
        assert_eq!(config.traces_endpoint, "http://localhost:4318/v1/traces");
        assert_eq!(config.logs_endpoint, "http://localhost:4318/v1/logs");
        assert!(config.enable_metrics);
    }

    #[test]
    fn test_from_lookup_overrides() {
        let vars: HashMap<&str, &str> = [
            ("OTEL_SERVICE_NAME", "deploy"),
            ("OTEL_EXPORTER_OTLP_TRACES_ENDPOINT", "http://collector:4318/v1/traces"),
            ("OTEL_CORRELATOR_ENABLE_METRICS", "false"),
        ]
        .into_iter()
        .collect();

        let config = TelemetryConfig::from_lookup(|k| vars.get(k).map(|v| v.to_string()));
        assert_eq!(config.service_name, "deploy");
        assert_eq!(config.traces_endpoint, "http://collector:4318/v1/traces");
        assert_eq!(config.logs_endpoint, DEFAULT_LOGS_ENDPOINT);
        assert!(!config.enable_metrics);
    }

    #[test]
    fn test_empty_values_fall_back_to_defaults() {
        let config = TelemetryConfig::from_lookup(|_| Some("  ".to_string()));
        assert_eq!(config, TelemetryConfig::default());
    }

    #[test]
    fn test_unparseable_flag_keeps_metrics_on() {
        let config = TelemetryConfig::from_lookup(|k| {
            (k == "OTEL_CORRELATOR_ENABLE_METRICS").then(|| "maybe".to_string())
        });
        assert!(config.enable_metrics);
    }

    #[test]
    fn test_config_builder() {
        let config = TelemetryConfig::builder()
            .service_name("site")
            .traces_endpoint("http://t")
            .logs_endpoint("http://l")
            .enable_metrics(false)
            .build();

        assert_eq!(config.service_name, "site");
        assert_eq!(config.traces_endpoint, "http://t");
        assert_eq!(config.logs_endpoint, "http://l");
        assert!(!config.enable_metrics);
        assert_eq!(config.resource().service_name, "site");
    }
}
