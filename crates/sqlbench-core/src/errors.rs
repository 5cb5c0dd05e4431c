use std::fmt;

/// Run-configuration problem (unreadable file, bad YAML, unsupported
/// version). Aborts the run before any task is evaluated.
#[derive(Debug, Clone)]
pub struct ConfigError(pub String);

impl fmt::Display for ConfigError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "config error: {}", self.0)
    }
}

impl std::error::Error for ConfigError {}

/// Malformed task or candidate input file. Per-record field problems are
/// not a `DatasetError`; they surface as invalid records instead.
#[derive(Debug, Clone)]
pub struct DatasetError(pub String);

impl fmt::Display for DatasetError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "dataset error: {}", self.0)
    }
}

impl std::error::Error for DatasetError {}
