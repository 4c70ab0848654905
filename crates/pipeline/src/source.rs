use async_trait::async_trait;

use vocalabel_domain::SourceExample;
use vocalabel_services::{HubClient, HubRequest, ServiceError};

/// Where source examples come from.
#[async_trait]
pub trait DatasetSource: Send + Sync {
    async fn load(&self, request: &HubRequest) -> Result<Vec<SourceExample>, ServiceError>;
}

#[async_trait]
impl DatasetSource for HubClient {
    async fn load(&self, request: &HubRequest) -> Result<Vec<SourceExample>, ServiceError> {
        self.fetch_examples(request).await
    }
}
