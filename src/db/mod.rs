use std::collections::HashSet;

use crate::{
    error::AppResult,
    models::{Item, ItemId, Rating, UserId},
};

pub mod memory;
pub mod postgres;

pub use memory::MemoryStore;
pub use postgres::{create_pool, PgStore};

/// Read-only source of the item catalog
#[cfg_attr(test, mockall::automock)]
#[async_trait::async_trait]
pub trait CatalogStore: Send + Sync {
    /// Full catalog snapshot in insertion order
    async fn items(&self) -> AppResult<Vec<Item>>;
}

/// Append-only rating log
///
/// Implementations are the durable home of explicit ratings and of favorites.
/// Favorites are read back as top-of-scale ratings. The engine only ever appends.
#[cfg_attr(test, mockall::automock)]
#[async_trait::async_trait]
pub trait RatingStore: Send + Sync {
    /// Full rating log snapshot, duplicates included
    async fn ratings(&self) -> AppResult<Vec<Rating>>;

    /// Items the user has at least one rating for
    async fn rated_items(&self, user_id: UserId) -> AppResult<HashSet<ItemId>>;

    /// Records a favorite.
    ///
    /// `favorite` is the synthetic top-of-scale rating; it must show up in later
    /// `ratings()` and `rated_items()` reads.
    async fn append_favorite(&self, favorite: Rating) -> AppResult<()>;
}
