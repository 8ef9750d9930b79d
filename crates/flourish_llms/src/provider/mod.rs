//! Provider trait

use async_trait::async_trait;

use crate::error::Result;
use crate::types::{ProviderRequest, RawEventStream};

/// A model backend that streams raw events for a request.
///
/// Dropping the returned stream cancels the request.
#[async_trait]
pub trait Provider: Send + Sync {
    fn provider_id(&self) -> &str;

    async fn stream(&self, request: ProviderRequest) -> Result<RawEventStream>;
}
