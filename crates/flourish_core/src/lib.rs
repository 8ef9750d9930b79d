pub mod error;
pub mod event;
pub mod policy;
pub mod session;
pub mod tool_call;
pub mod turn;

pub use error::{FlourishError, ProviderCause, Result, TurnError};
pub use event::{Event, FinishReason, TerminalMarker};
pub use policy::{BlockReason, Decision, MutationPolicy, SecurityPolicy, DEFAULT_BLACKLIST};
pub use session::{SessionId, SessionStatus};
pub use tool_call::{ToolCall, ToolInvocation, ToolResult};
pub use turn::{OutputPart, ToolPart, Turn, TurnId, TurnResult, TurnState};
