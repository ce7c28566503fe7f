use super::AUDIT_CHANGE_ROUTE;
use crate::core::{GridError, Result};
use crate::logging::LogFormat;
use std::collections::HashMap;

/// Minimum backend build that understands audit events
pub const AUDIT_MIN_VERSION: &str = "1.1.1";

/// Runtime configuration of a grid session
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GridConfig {
    /// Minimum backend version required before audit reporting activates
    pub audit_min_version: String,

    /// Backend route receiving audit events
    pub audit_route: String,

    /// First id handed out by the decrement strategy on a table without numeric ids
    pub decrement_seed: i64,

    /// Default log level directive (`info`, `gridscope=debug`, ...)
    pub log_level: String,

    pub log_format: LogFormat,
}

impl Default for GridConfig {
    fn default() -> Self {
        Self {
            audit_min_version: AUDIT_MIN_VERSION.to_string(),
            audit_route: AUDIT_CHANGE_ROUTE.to_string(),
            decrement_seed: 1_000_000,
            log_level: "info".to_string(),
            log_format: LogFormat::Compact,
        }
    }
}

impl GridConfig {
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the minimum backend version for audit reporting
    pub fn audit_min_version(mut self, version: &str) -> Self {
        self.audit_min_version = version.to_string();
        self
    }

    /// Set the audit route
    pub fn audit_route(mut self, route: &str) -> Self {
        self.audit_route = route.to_string();
        self
    }

    /// Set the decrement seed
    pub fn decrement_seed(mut self, seed: i64) -> Self {
        self.decrement_seed = seed;
        self
    }

    /// Set the log level
    pub fn log_level(mut self, level: &str) -> Self {
        self.log_level = level.to_string();
        self
    }

    /// Set the log format
    pub fn log_format(mut self, format: LogFormat) -> Self {
        self.log_format = format;
        self
    }

    /// Reads overrides from `GRIDSCOPE_*` environment variables.
    ///
    /// Recognised: `GRIDSCOPE_AUDIT_MIN_VERSION`, `GRIDSCOPE_AUDIT_ROUTE`,
    /// `GRIDSCOPE_DECREMENT_SEED`, `GRIDSCOPE_LOG_LEVEL`, `GRIDSCOPE_LOG_FORMAT`.
    pub fn from_env() -> Result<Self> {
        let vars: HashMap<String, String> = std::env::vars()
            .filter(|(key, _)| key.starts_with("GRIDSCOPE_"))
            .collect();
        Self::from_vars(&vars)
    }

    /// Same as [`GridConfig::from_env`] over an explicit variable map
    pub fn from_vars(vars: &HashMap<String, String>) -> Result<Self> {
        let mut config = Self::default();

        if let Some(version) = vars.get("GRIDSCOPE_AUDIT_MIN_VERSION") {
            if super::version::BackendVersion::parse(version).is_none() {
                return Err(GridError::Config(format!(
                    "GRIDSCOPE_AUDIT_MIN_VERSION is not a version: '{}'",
                    version
                )));
            }
            config.audit_min_version = version.clone();
        }

        if let Some(route) = vars.get("GRIDSCOPE_AUDIT_ROUTE") {
            if !route.starts_with('/') {
                return Err(GridError::Config(format!(
                    "GRIDSCOPE_AUDIT_ROUTE must start with '/': '{}'",
                    route
                )));
            }
            config.audit_route = route.clone();
        }

        if let Some(seed) = vars.get("GRIDSCOPE_DECREMENT_SEED") {
            config.decrement_seed = seed.parse().map_err(|_| {
                GridError::Config(format!("GRIDSCOPE_DECREMENT_SEED is not an integer: '{}'", seed))
            })?;
        }

        if let Some(level) = vars.get("GRIDSCOPE_LOG_LEVEL") {
            config.log_level = level.clone();
        }

        if let Some(format) = vars.get("GRIDSCOPE_LOG_FORMAT") {
            config.log_format = LogFormat::from_str(format);
        }

        Ok(config)
    }
}
