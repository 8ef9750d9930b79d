//! Logging and trace export settings.

use std::str::FromStr;

const DEFAULT_SERVICE_NAME: &str = "flourish";
const DEFAULT_FILTER: &str = "warn";

/// How log lines are written to stderr.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum LogFormat {
    /// No console output; spans may still be exported.
    Off,
    /// One short line per event.
    #[default]
    Compact,
    /// Targets, span context and thread ids.
    Full,
}

impl FromStr for LogFormat {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "off" | "none" => Ok(LogFormat::Off),
            "compact" => Ok(LogFormat::Compact),
            "full" | "pretty" => Ok(LogFormat::Full),
            other => Err(format!("unknown log format: {other}")),
        }
    }
}

/// Where spans go when OTLP export is on.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OtlpExport {
    pub endpoint: String,
    /// Extra resource attributes, from `OTEL_RESOURCE_ATTRIBUTES`.
    pub attributes: Vec<(String, String)>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ObservabilityConfig {
    pub service_name: String,
    pub service_version: String,
    /// `EnvFilter` directives, e.g. `flourish_runtime=debug,warn`.
    pub filter: String,
    pub format: LogFormat,
    pub otlp: Option<OtlpExport>,
}

impl Default for ObservabilityConfig {
    fn default() -> Self {
        Self {
            service_name: DEFAULT_SERVICE_NAME.to_string(),
            service_version: env!("CARGO_PKG_VERSION").to_string(),
            filter: DEFAULT_FILTER.to_string(),
            format: LogFormat::default(),
            otlp: None,
        }
    }
}

impl ObservabilityConfig {
    pub fn new(service_name: impl Into<String>) -> Self {
        Self {
            service_name: service_name.into(),
            ..Default::default()
        }
    }

    pub fn with_version(mut self, version: impl Into<String>) -> Self {
        self.service_version = version.into();
        self
    }

    pub fn with_filter(mut self, filter: impl Into<String>) -> Self {
        self.filter = filter.into();
        self
    }

    pub fn with_format(mut self, format: LogFormat) -> Self {
        self.format = format;
        self
    }

    pub fn with_otlp_endpoint(mut self, endpoint: impl Into<String>) -> Self {
        let endpoint = endpoint.into();
        match &mut self.otlp {
            Some(otlp) => otlp.endpoint = endpoint,
            None => {
                self.otlp = Some(OtlpExport {
                    endpoint,
                    attributes: Vec::new(),
                })
            }
        }
        self
    }

    /// Read the process environment. See [`Self::from_lookup`].
    pub fn from_env() -> Self {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Build from a key lookup:
    /// - `OTEL_SERVICE_NAME`, `OTEL_SERVICE_VERSION`
    /// - `OTEL_EXPORTER_OTLP_ENDPOINT` turns export on
    /// - `OTEL_RESOURCE_ATTRIBUTES` as `key=value,key=value`
    /// - `FLOURISH_LOG`, falling back to `RUST_LOG`, for the filter
    /// - `FLOURISH_LOG_FORMAT` (`off`, `compact`, `full`); unknown values are ignored
    pub fn from_lookup<F>(lookup: F) -> Self
    where
        F: Fn(&str) -> Option<String>,
    {
        let get = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());
        let mut config = Self::default();

        if let Some(name) = get("OTEL_SERVICE_NAME") {
            config.service_name = name;
        }
        if let Some(version) = get("OTEL_SERVICE_VERSION") {
            config.service_version = version;
        }
        if let Some(filter) = get("FLOURISH_LOG").or_else(|| get("RUST_LOG")) {
            config.filter = filter;
        }
        if let Some(format) = get("FLOURISH_LOG_FORMAT").and_then(|f| f.parse().ok()) {
            config.format = format;
        }
        if let Some(endpoint) = get("OTEL_EXPORTER_OTLP_ENDPOINT") {
            config.otlp = Some(OtlpExport {
                endpoint: endpoint.trim().to_string(),
                attributes: get("OTEL_RESOURCE_ATTRIBUTES")
                    .map(|raw| parse_attributes(&raw))
                    .unwrap_or_default(),
            });
        }
        config
    }
}

/// `a=1, b=2` → `[(a, 1), (b, 2)]`. Pairs without `=` or with an empty key
/// are skipped.
fn parse_attributes(raw: &str) -> Vec<(String, String)> {
    raw.split(',')
        .filter_map(|pair| {
            let (key, value) = pair.split_once('=')?;
            let key = key.trim();
            (!key.is_empty()).then(|| (key.to_string(), value.trim().to_string()))
        })
        .collect()
}
