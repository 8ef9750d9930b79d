//! flourish-observability - tracing setup and span helpers for flourish
//!
//! Console logging goes to stderr through `tracing-subscriber`, so it never
//! mixes with command output on stdout. Spans are exported over OTLP when an
//! endpoint is configured.
//!
//! # Quick Start
//!
//! ```no_run
//! use flourish_observability::{ObservabilityConfig, init};
//!
//! let config = ObservabilityConfig::new("flourish")
//!     .with_filter("flourish_runtime=info,warn");
//!
//! init(config)?;
//!
//! // Or initialize from environment variables
//! // flourish_observability::init_from_env()?;
//!
//! tracing::info!("Service started");
//! # Ok::<(), flourish_observability::ObservabilityError>(())
//! ```
//!
//! # Environment Variables
//!
//! - `OTEL_SERVICE_NAME` - Service name
//! - `OTEL_SERVICE_VERSION` - Service version
//! - `OTEL_EXPORTER_OTLP_ENDPOINT` - OTLP endpoint
//! - `OTEL_RESOURCE_ATTRIBUTES` - Extra resource attributes (`key=value,...`)
//! - `FLOURISH_LOG` or `RUST_LOG` - Log filter
//! - `FLOURISH_LOG_FORMAT` - `off`, `compact` or `full`

pub mod config;
pub mod error;
pub mod spans;
pub mod telemetry;

pub use config::{LogFormat, ObservabilityConfig, OtlpExport};
pub use error::ObservabilityError;
pub use spans::{record_duration, record_error};
pub use telemetry::{init, init_from_env, shutdown};

// Macros are exported via #[macro_export] and available as
// flourish_observability::turn_span!(), etc.
