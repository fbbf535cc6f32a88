use std::collections::BTreeMap;
use std::env;

use serde::{Deserialize, Serialize};

use crate::error::{ConfigErrorCode, Error, Result};

pub const ENV_HOST_FALLBACK: &str = "NNADAPT_HOST_FALLBACK";
pub const ENV_STRICT_VALIDATION: &str = "NNADAPT_STRICT_VALIDATION";
pub const ENV_DEVICE: &str = "NNADAPT_DEVICE";

/// Backend-specific property key naming the target device.
pub const PROPERTY_DEVICE: &str = "device";

/// Knobs of one compile session.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CompileOptions {
    /// Run the whole graph on the host executor when the backend rejects an operation.
    #[serde(default = "default_true")]
    pub allow_host_fallback: bool,
    /// Report backend rejections even when the host could run the graph.
    #[serde(default)]
    pub strict_validation: bool,
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub properties: BTreeMap<String, String>,
}

fn default_true() -> bool {
    true
}

impl Default for CompileOptions {
    fn default() -> Self {
        Self {
            allow_host_fallback: true,
            strict_validation: false,
            properties: BTreeMap::new(),
        }
    }
}

impl CompileOptions {
    /// Defaults overridden by `NNADAPT_*` environment variables.
    pub fn from_env() -> Self {
        let mut options = Self::default();
        if let Some(value) = non_empty_var(ENV_HOST_FALLBACK) {
            options.allow_host_fallback = parse_bool(&value);
        }
        if let Some(value) = non_empty_var(ENV_STRICT_VALIDATION) {
            options.strict_validation = parse_bool(&value);
        }
        if let Some(device) = non_empty_var(ENV_DEVICE) {
            options
                .properties
                .insert(PROPERTY_DEVICE.to_string(), device.trim().to_string());
        }
        options
    }

    pub fn from_json_str(src: &str) -> Result<Self> {
        serde_json::from_str(src).map_err(|err| {
            Error::config(
                ConfigErrorCode::InvalidAttributeValue,
                format!("invalid compile options: {err}"),
            )
        })
    }

    pub fn with_property(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.properties.insert(key.into(), value.into());
        self
    }

    pub fn property(&self, key: &str) -> Option<&str> {
        self.properties.get(key).map(String::as_str)
    }

    pub fn digest(&self) -> Result<u64> {
        encoded_hash(self)
    }
}

/// Identifies one compiled artifact: graph, backend and options.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct CompileCacheKey {
    pub graph_hash: u64,
    pub backend: String,
    pub options_hash: u64,
}

impl CompileCacheKey {
    pub fn new(graph: &crate::core::graph::Graph, backend: &str, options: &CompileOptions) -> Result<Self> {
        Ok(Self {
            graph_hash: graph.fingerprint()?,
            backend: backend.to_string(),
            options_hash: options.digest()?,
        })
    }
}

fn non_empty_var(name: &str) -> Option<String> {
    match env::var(name) {
        Ok(value) if !value.trim().is_empty() => Some(value),
        _ => None,
    }
}

pub(crate) fn parse_bool(value: &str) -> bool {
    let normalized = value.trim().to_ascii_lowercase();
    matches!(normalized.as_str(), "1" | "true" | "yes" | "on")
}

/// FNV-1a over the bincode encoding of `value`.
pub(crate) fn encoded_hash<T: Serialize + ?Sized>(value: &T) -> Result<u64> {
    let bytes = bincode::serialize(value)
        .map_err(|err| Error::config(ConfigErrorCode::EncodingFailed, err.to_string()))?;
    Ok(fnv_hash(&bytes))
}

pub(crate) fn fnv_hash(bytes: &[u8]) -> u64 {
    const OFFSET: u64 = 0xcbf29ce484222325;
    const PRIME: u64 = 0x100000001b3;

    let mut hash = OFFSET;
    for byte in bytes {
        hash ^= *byte as u64;
        hash = hash.wrapping_mul(PRIME);
    }
    hash
}
