pub mod assembler;
pub mod audit;
pub mod config;
pub mod context;
pub mod error;
pub mod normalizer;
pub mod runtime;
pub mod session;

pub use assembler::ResponseAssembler;
pub use audit::{AuditSink, FanoutAuditSink, JsonlAuditSink, TracingAuditSink};
pub use config::RuntimeConfig;
pub use error::{Result, RuntimeError};
pub use runtime::Runtime;
pub use session::{Session, TurnHandle, TurnUpdate};
