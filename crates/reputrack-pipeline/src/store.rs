//! Where tracked links are read from and their snapshots written to.

use async_trait::async_trait;
use reputrack_core::{LinkUpdate, Platform, TrackedLink};
use reputrack_db::DbError;
use sqlx::PgPool;

use crate::error::StoreError;

/// Persistence seam of the orchestrator.
///
/// `apply_update` must be atomic per link: either every field the update
/// carries is stored or none is.
#[async_trait]
pub trait LinkStore: Send + Sync {
    async fn get_link(&self, link_id: i64) -> Result<Option<TrackedLink>, StoreError>;

    async fn links_for_product(&self, product_id: i64) -> Result<Vec<TrackedLink>, StoreError>;

    async fn links_on_platforms(
        &self,
        platforms: &[Platform],
    ) -> Result<Vec<TrackedLink>, StoreError>;

    async fn apply_update(&self, update: &LinkUpdate) -> Result<(), StoreError>;
}

/// [`LinkStore`] over the Postgres `tracked_links` table.
#[derive(Clone)]
pub struct PgLinkStore {
    pool: PgPool,
}

impl PgLinkStore {
    #[must_use]
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl LinkStore for PgLinkStore {
    async fn get_link(&self, link_id: i64) -> Result<Option<TrackedLink>, StoreError> {
        Ok(reputrack_db::get_link(&self.pool, link_id).await?)
    }

    async fn links_for_product(&self, product_id: i64) -> Result<Vec<TrackedLink>, StoreError> {
        Ok(reputrack_db::list_links_for_product(&self.pool, product_id).await?)
    }

    async fn links_on_platforms(
        &self,
        platforms: &[Platform],
    ) -> Result<Vec<TrackedLink>, StoreError> {
        Ok(reputrack_db::list_links_by_platforms(&self.pool, platforms).await?)
    }

    async fn apply_update(&self, update: &LinkUpdate) -> Result<(), StoreError> {
        match reputrack_db::apply_link_update(&self.pool, update).await {
            Err(DbError::NotFound) => Err(StoreError::LinkNotFound(update.link_id)),
            other => Ok(other?),
        }
    }
}
