use std::collections::HashSet;

use sqlx::{postgres::PgPoolOptions, PgPool};

use super::{CatalogStore, RatingStore};
use crate::{
    error::AppResult,
    models::{Item, ItemId, Rating, RatingScale, UserId},
};

/// Creates a PostgreSQL connection pool
///
/// Establishes a pool of database connections for efficient reuse.
/// The pool automatically manages connection lifecycle and limits.
pub async fn create_pool(database_url: &str) -> anyhow::Result<PgPool> {
    let pool = PgPoolOptions::new()
        .max_connections(5)
        .connect(database_url)
        .await?;

    Ok(pool)
}

#[derive(Debug, sqlx::FromRow)]
struct MovieRow {
    id: i64,
    title: String,
    genres: Option<String>,
    keywords: Option<String>,
    tagline: Option<String>,
    cast_names: Option<String>,
    director: Option<String>,
}

impl From<MovieRow> for Item {
    fn from(row: MovieRow) -> Self {
        Item::from_fields(
            row.id,
            row.title,
            [
                row.genres.as_deref(),
                row.keywords.as_deref(),
                row.tagline.as_deref(),
                row.cast_names.as_deref(),
                row.director.as_deref(),
            ],
        )
    }
}

#[derive(Debug, sqlx::FromRow)]
struct RatingRow {
    user_id: i64,
    movie_id: i64,
    rating: f64,
}

impl From<RatingRow> for Rating {
    fn from(row: RatingRow) -> Self {
        Rating::new(row.user_id, row.movie_id, row.rating)
    }
}

#[derive(Debug, sqlx::FromRow)]
struct FavoriteRow {
    user_id: i64,
    movie_id: i64,
}

impl FavoriteRow {
    fn into_rating(self, scale: RatingScale) -> Rating {
        Rating::favorite(self.user_id, self.movie_id, scale)
    }
}

/// Explicit ratings followed by favorites expressed as top-of-scale ratings
fn merge_log(
    ratings: Vec<RatingRow>,
    favorites: Vec<FavoriteRow>,
    scale: RatingScale,
) -> Vec<Rating> {
    ratings
        .into_iter()
        .map(Rating::from)
        .chain(favorites.into_iter().map(|row| row.into_rating(scale)))
        .collect()
}

/// Catalog and rating log backed by the application's existing PostgreSQL schema
///
/// Expects `movies(id, title, genres, keywords, tagline, cast_names, director)`,
/// `ratings(user_id, movie_id, rating, created_at)` and
/// `favorites(user_id, movie_id, created_at)`. Explicit ratings and favorites stay in
/// their own tables; favorites only become ratings when the log is read for training.
/// Schema management is owned by the surrounding application.
#[derive(Clone)]
pub struct PgStore {
    pool: PgPool,
    scale: RatingScale,
}

impl PgStore {
    pub fn new(pool: PgPool, scale: RatingScale) -> Self {
        Self { pool, scale }
    }
}

#[async_trait::async_trait]
impl CatalogStore for PgStore {
    async fn items(&self) -> AppResult<Vec<Item>> {
        let rows: Vec<MovieRow> = sqlx::query_as(
            "SELECT id, title, genres, keywords, tagline, cast_names, director \
             FROM movies ORDER BY id",
        )
        .fetch_all(&self.pool)
        .await?;

        tracing::debug!(count = rows.len(), "Fetched catalog from database");

        Ok(rows.into_iter().map(Item::from).collect())
    }
}

#[async_trait::async_trait]
impl RatingStore for PgStore {
    async fn ratings(&self) -> AppResult<Vec<Rating>> {
        let ratings: Vec<RatingRow> = sqlx::query_as(
            "SELECT user_id, movie_id, rating FROM ratings ORDER BY created_at",
        )
        .fetch_all(&self.pool)
        .await?;

        let favorites: Vec<FavoriteRow> =
            sqlx::query_as("SELECT user_id, movie_id FROM favorites ORDER BY created_at")
                .fetch_all(&self.pool)
                .await?;

        tracing::debug!(
            ratings = ratings.len(),
            favorites = favorites.len(),
            "Fetched rating log from database"
        );

        Ok(merge_log(ratings, favorites, self.scale))
    }

    async fn rated_items(&self, user_id: UserId) -> AppResult<HashSet<ItemId>> {
        let ids: Vec<i64> = sqlx::query_scalar(
            "SELECT movie_id FROM ratings WHERE user_id = $1 \
             UNION SELECT movie_id FROM favorites WHERE user_id = $1",
        )
        .bind(user_id)
        .fetch_all(&self.pool)
        .await?;

        Ok(ids.into_iter().collect())
    }

    async fn append_favorite(&self, favorite: Rating) -> AppResult<()> {
        // The score is implied by the scale when the log is read back.
        sqlx::query("INSERT INTO favorites (user_id, movie_id, created_at) VALUES ($1, $2, now())")
            .bind(favorite.user_id)
            .bind(favorite.item_id)
            .execute(&self.pool)
            .await?;

        tracing::debug!(
            user_id = favorite.user_id,
            item_id = favorite.item_id,
            "Stored favorite"
        );

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_movie_row_to_item_combines_fields() {
        let row = MovieRow {
            id: 19995,
            title: "Avatar".to_string(),
            genres: Some("Action Adventure".to_string()),
            keywords: Some("future".to_string()),
            tagline: None,
            cast_names: Some("Sam Worthington".to_string()),
            director: Some("James Cameron".to_string()),
        };

        let item = Item::from(row);
        assert_eq!(item.id, 19995);
        assert_eq!(item.title, "Avatar");
        assert_eq!(
            item.text_features,
            "Action Adventure future  Sam Worthington James Cameron"
        );
    }

    #[test]
    fn test_rating_row_to_rating() {
        let row = RatingRow {
            user_id: 1,
            movie_id: 31,
            rating: 2.5,
        };
        assert_eq!(Rating::from(row), Rating::new(1, 31, 2.5));
    }

    #[test]
    fn test_favorite_row_maps_to_top_of_scale() {
        let row = FavoriteRow {
            user_id: 100,
            movie_id: 2,
        };
        assert_eq!(
            row.into_rating(RatingScale::new(1.0, 5.0)),
            Rating::new(100, 2, 5.0)
        );
    }

    #[test]
    fn test_merge_log_keeps_favorites_after_ratings() {
        let ratings = vec![RatingRow {
            user_id: 100,
            movie_id: 1,
            rating: 3.0,
        }];
        let favorites = vec![
            FavoriteRow {
                user_id: 100,
                movie_id: 2,
            },
            FavoriteRow {
                user_id: 100,
                movie_id: 2,
            },
        ];

        let log = merge_log(ratings, favorites, RatingScale::default());
        assert_eq!(
            log,
            vec![
                Rating::new(100, 1, 3.0),
                Rating::new(100, 2, 5.0),
                Rating::new(100, 2, 5.0),
            ]
        );
    }
}
