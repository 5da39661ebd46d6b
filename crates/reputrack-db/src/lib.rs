//! Postgres access for RepuTrack: pool setup, embedded migrations and the
//! `tracked_links` reads and snapshot write.

pub mod error;
pub mod links;
pub mod pool;

pub use error::DbError;
pub use links::{
    apply_link_update, get_link, list_links_by_platforms, list_links_for_product, LinkRow,
};
pub use pool::{connect_pool, health_check, ping, run_migrations, PoolConfig};
