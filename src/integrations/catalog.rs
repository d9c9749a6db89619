// src/integrations/catalog.rs
//
// Live catalog service, consumed as a black box.

use async_trait::async_trait;

use crate::domain::ExternalCardRecord;
use crate::error::AppResult;

#[async_trait]
pub trait CatalogService: Send + Sync {
    /// One card by its catalog id, `None` when the catalog does not know it
    async fn get_card(&self, external_id: &str) -> AppResult<Option<ExternalCardRecord>>;

    async fn search_cards(&self, query: &str) -> AppResult<Vec<ExternalCardRecord>>;
}
