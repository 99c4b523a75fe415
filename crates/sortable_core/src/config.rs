//! Ordering configuration.
//!
//! # Responsibility
//! - Hold the named ordering options with their defaults.
//! - Validate the order column name before it reaches SQL text.
//!
//! # Invariants
//! - An empty `order_column_name` resolves to `order_column`.
//! - A resolved column name is a plain SQL identifier.

use once_cell::sync::Lazy;
use regex::Regex;
use serde::Deserialize;
use std::error::Error;
use std::fmt::{Display, Formatter};
use std::path::Path;

/// Column used when no order column name is configured.
pub const DEFAULT_ORDER_COLUMN: &str = "order_column";

static SQL_IDENTIFIER_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^[A-Za-z_][A-Za-z0-9_]*$").expect("valid identifier regex"));

/// Errors from loading or validating configuration.
#[derive(Debug)]
pub enum ConfigError {
    /// Column name is not a plain SQL identifier.
    InvalidColumnName(String),
    /// Config file could not be read.
    Io(std::io::Error),
    /// Config payload is not valid JSON for `SortableConfig`.
    Parse(serde_json::Error),
}

impl Display for ConfigError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::InvalidColumnName(name) => {
                write!(f, "order column name `{name}` is not a valid identifier")
            }
            Self::Io(err) => write!(f, "failed to read config: {err}"),
            Self::Parse(err) => write!(f, "failed to parse config: {err}"),
        }
    }
}

impl Error for ConfigError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            Self::InvalidColumnName(_) => None,
            Self::Io(err) => Some(err),
            Self::Parse(err) => Some(err),
        }
    }
}

/// Ordering options, resolved once when a store or service is built.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct SortableConfig {
    /// Name of the integer rank column.
    pub order_column_name: String,
    /// Whether new records get `max(order)+1` on creation.
    pub sort_when_creating: bool,
}

impl Default for SortableConfig {
    fn default() -> Self {
        Self {
            order_column_name: DEFAULT_ORDER_COLUMN.to_string(),
            sort_when_creating: true,
        }
    }
}

impl SortableConfig {
    pub fn with_order_column_name(mut self, name: impl Into<String>) -> Self {
        self.order_column_name = name.into();
        self
    }

    pub fn with_sort_when_creating(mut self, enabled: bool) -> Self {
        self.sort_when_creating = enabled;
        self
    }

    /// Returns the effective column name, falling back to the default when blank.
    pub fn resolved_order_column(&self) -> &str {
        let trimmed = self.order_column_name.trim();
        if trimmed.is_empty() {
            DEFAULT_ORDER_COLUMN
        } else {
            trimmed
        }
    }

    /// Checks that the resolved column name can be embedded in SQL.
    pub fn validate(&self) -> Result<(), ConfigError> {
        let column = self.resolved_order_column();
        if !SQL_IDENTIFIER_RE.is_match(column) {
            return Err(ConfigError::InvalidColumnName(column.to_string()));
        }
        Ok(())
    }

    /// Parses and validates a JSON config payload.
    pub fn from_json_str(raw: &str) -> Result<Self, ConfigError> {
        let config: Self = serde_json::from_str(raw).map_err(ConfigError::Parse)?;
        config.validate()?;
        Ok(config)
    }

    /// Reads, parses and validates a JSON config file.
    pub fn from_json_file(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let raw = std::fs::read_to_string(path).map_err(ConfigError::Io)?;
        Self::from_json_str(&raw)
    }
}
