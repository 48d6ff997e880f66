//! SQLite-backed store for venues, reviews, and recommendation history.
//!
//! Write semantics mirror how the pipeline uses the data:
//! - venues are upserted (search results refresh existing rows)
//! - reviews are replaced wholesale per venue (never merged)
//! - recommendation records are append-only, one row per delivered
//!   session, never updated
//!
//! All failures surface as [`StorageError`]; callers in the pipeline
//! treat them as degradations (log and continue), never as session
//! aborts.

use std::str::FromStr;

use chrono::{DateTime, Duration, Utc};
use sqlx::sqlite::{SqliteConnectOptions, SqlitePoolOptions};
use sqlx::SqlitePool;
use tracing::{debug, info};

use crate::error::{Result, StorageError};
use crate::types::{RecommendationRecord, Review, Venue};

/// Handle to the SQLite database.
///
/// Cheap to clone; all methods take `&self` and are safe to call from
/// concurrent collection tasks (SQLite serializes writes internally).
#[derive(Clone)]
pub struct Store {
    pool: SqlitePool,
}

impl Store {
    /// Open (creating if missing) the database at `url` and ensure the
    /// schema exists.
    ///
    /// # Arguments
    /// * `url` - A sqlite URL, e.g. `sqlite://data/app.db`
    pub async fn connect(url: &str) -> Result<Self> {
        let options = SqliteConnectOptions::from_str(url)?.create_if_missing(true);
        let pool = SqlitePoolOptions::new().connect_with(options).await?;
        let store = Self { pool };
        store.init_schema().await?;
        info!("Connected to database at {}", url);
        Ok(store)
    }

    /// In-memory database for tests.
    ///
    /// Pinned to a single connection: every new `:memory:` connection
    /// would otherwise see a fresh empty database.
    pub async fn in_memory() -> Result<Self> {
        let pool = SqlitePoolOptions::new()
            .max_connections(1)
            .connect("sqlite::memory:")
            .await?;
        let store = Self { pool };
        store.init_schema().await?;
        Ok(store)
    }

    /// Access to the underlying pool (health checks, ad hoc queries in
    /// tests).
    pub fn pool(&self) -> &SqlitePool {
        &self.pool
    }

    async fn init_schema(&self) -> Result<()> {
        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS venues (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                place_id TEXT NOT NULL UNIQUE,
                name TEXT NOT NULL,
                rating REAL,
                user_ratings_total INTEGER,
                address TEXT,
                phone TEXT,
                website TEXT,
                map_url TEXT,
                last_update TEXT NOT NULL
            )
            "#,
        )
        .execute(&self.pool)
        .await?;

        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS reviews (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                venue_id INTEGER NOT NULL REFERENCES venues(id),
                review_id TEXT NOT NULL,
                text TEXT NOT NULL,
                stars REAL
            )
            "#,
        )
        .execute(&self.pool)
        .await?;

        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS recommendations (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                created_at TEXT NOT NULL,
                user_input TEXT NOT NULL,
                location TEXT NOT NULL,
                category TEXT NOT NULL,
                top_place_ids TEXT NOT NULL,
                recommendation_json TEXT NOT NULL
            )
            "#,
        )
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    /// Insert or refresh a venue row, keyed by place_id.
    ///
    /// `last_update` is bumped on every call; the review-cache
    /// freshness window is measured from it.
    pub async fn upsert_venue(&self, venue: &Venue) -> Result<()> {
        sqlx::query(
            r#"
            INSERT INTO venues
                (place_id, name, rating, user_ratings_total, address,
                 phone, website, map_url, last_update)
            VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?)
            ON CONFLICT(place_id) DO UPDATE SET
                name = excluded.name,
                rating = excluded.rating,
                user_ratings_total = excluded.user_ratings_total,
                address = excluded.address,
                phone = excluded.phone,
                website = excluded.website,
                map_url = excluded.map_url,
                last_update = excluded.last_update
            "#,
        )
        .bind(&venue.place_id)
        .bind(&venue.name)
        .bind(venue.rating)
        .bind(venue.user_ratings_total)
        .bind(&venue.address)
        .bind(&venue.phone)
        .bind(&venue.website)
        .bind(&venue.map_url)
        .bind(Utc::now())
        .execute(&self.pool)
        .await?;

        debug!("Upserted venue {}", venue.place_id);
        Ok(())
    }

    /// Replace all reviews for a venue in one transaction.
    ///
    /// Full replacement keeps the stored set consistent with the most
    /// recent successful collection; a failed collection leaves the
    /// previous reviews untouched because the caller skips this write.
    pub async fn replace_reviews(&self, place_id: &str, reviews: &[Review]) -> Result<()> {
        let mut tx = self.pool.begin().await?;

        let venue_id: Option<i64> = sqlx::query_scalar("SELECT id FROM venues WHERE place_id = ?")
            .bind(place_id)
            .fetch_optional(&mut *tx)
            .await?;
        let venue_id = venue_id.ok_or_else(|| StorageError::UnknownVenue {
            place_id: place_id.to_string(),
        })?;

        let deleted = sqlx::query("DELETE FROM reviews WHERE venue_id = ?")
            .bind(venue_id)
            .execute(&mut *tx)
            .await?
            .rows_affected();

        for review in reviews {
            sqlx::query("INSERT INTO reviews (venue_id, review_id, text, stars) VALUES (?, ?, ?, ?)")
                .bind(venue_id)
                .bind(&review.review_id)
                .bind(&review.text)
                .bind(review.stars)
                .execute(&mut *tx)
                .await?;
        }

        tx.commit().await?;
        debug!(
            "Replaced reviews for {}: removed {}, wrote {}",
            place_id,
            deleted,
            reviews.len()
        );
        Ok(())
    }

    /// Return cached reviews for a venue if the venue row was updated
    /// within the freshness window, else None.
    ///
    /// A venue with no stored reviews is treated as a cache miss even
    /// when fresh, matching the collector's expectation that a hit is
    /// always usable as-is.
    pub async fn fresh_reviews(
        &self,
        place_id: &str,
        max_age_days: i64,
    ) -> Result<Option<Vec<Review>>> {
        let row: Option<(i64, DateTime<Utc>)> =
            sqlx::query_as("SELECT id, last_update FROM venues WHERE place_id = ?")
                .bind(place_id)
                .fetch_optional(&self.pool)
                .await?;

        let (venue_id, last_update) = match row {
            Some(row) => row,
            None => return Ok(None),
        };

        if Utc::now() - last_update > Duration::days(max_age_days) {
            debug!("Cache for {} is stale, ignoring", place_id);
            return Ok(None);
        }

        let rows: Vec<(String, String, Option<f64>)> =
            sqlx::query_as("SELECT review_id, text, stars FROM reviews WHERE venue_id = ? ORDER BY id")
                .bind(venue_id)
                .fetch_all(&self.pool)
                .await?;

        if rows.is_empty() {
            return Ok(None);
        }

        Ok(Some(
            rows.into_iter()
                .map(|(review_id, text, stars)| Review {
                    review_id,
                    text,
                    stars,
                })
                .collect(),
        ))
    }

    /// Append one recommendation record. Rows are never updated or
    /// deleted afterwards.
    pub async fn insert_recommendation(&self, record: &RecommendationRecord) -> Result<()> {
        let payload = serde_json::to_string(&record.recommendation_json)?;

        sqlx::query(
            r#"
            INSERT INTO recommendations
                (created_at, user_input, location, category,
                 top_place_ids, recommendation_json)
            VALUES (?, ?, ?, ?, ?, ?)
            "#,
        )
        .bind(record.created_at)
        .bind(&record.user_input)
        .bind(&record.location)
        .bind(&record.category)
        .bind(&record.top_place_ids)
        .bind(payload)
        .execute(&self.pool)
        .await?;

        info!(
            "Recorded recommendation for '{}' / '{}'",
            record.location, record.category
        );
        Ok(())
    }

    /// Most recent recommendation records, newest first.
    pub async fn recent_recommendations(&self, limit: i64) -> Result<Vec<RecommendationRecord>> {
        let rows: Vec<(DateTime<Utc>, String, String, String, String, String)> = sqlx::query_as(
            r#"
            SELECT created_at, user_input, location, category,
                   top_place_ids, recommendation_json
            FROM recommendations
            ORDER BY id DESC
            LIMIT ?
            "#,
        )
        .bind(limit)
        .fetch_all(&self.pool)
        .await?;

        rows.into_iter()
            .map(|(created_at, user_input, location, category, top_place_ids, payload)| {
                Ok(RecommendationRecord {
                    user_input,
                    location,
                    category,
                    top_place_ids,
                    recommendation_json: serde_json::from_str(&payload)?,
                    created_at,
                })
            })
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample_venue(place_id: &str) -> Venue {
        Venue {
            place_id: place_id.to_string(),
            name: "Test Hot Pot".to_string(),
            rating: 4.4,
            user_ratings_total: 321,
            address: "1 Test Street".to_string(),
            phone: Some("02-1234-5678".to_string()),
            website: None,
            map_url: format!("https://www.google.com/maps/place/?q=place_id:{place_id}"),
        }
    }

    fn sample_reviews() -> Vec<Review> {
        vec![
            Review {
                review_id: "r1".to_string(),
                text: "湯頭很棒".to_string(),
                stars: Some(5.0),
            },
            Review {
                review_id: "r2".to_string(),
                text: "環境安靜".to_string(),
                stars: Some(4.0),
            },
        ]
    }

    #[tokio::test]
    async fn test_upsert_venue_inserts_then_updates() {
        let store = Store::in_memory().await.unwrap();

        store.upsert_venue(&sample_venue("p1")).await.unwrap();

        let mut updated = sample_venue("p1");
        updated.name = "Renamed Hot Pot".to_string();
        updated.rating = 4.8;
        store.upsert_venue(&updated).await.unwrap();

        let (count, name, rating): (i64, String, f64) =
            sqlx::query_as("SELECT COUNT(*), name, rating FROM venues WHERE place_id = 'p1'")
                .fetch_one(store.pool())
                .await
                .unwrap();

        assert_eq!(count, 1, "Upsert should not duplicate rows");
        assert_eq!(name, "Renamed Hot Pot");
        assert!((rating - 4.8).abs() < f64::EPSILON);
    }

    #[tokio::test]
    async fn test_replace_reviews_swaps_full_set() {
        let store = Store::in_memory().await.unwrap();
        store.upsert_venue(&sample_venue("p1")).await.unwrap();

        store.replace_reviews("p1", &sample_reviews()).await.unwrap();

        let replacement = vec![Review {
            review_id: "r9".to_string(),
            text: "新評論".to_string(),
            stars: None,
        }];
        store.replace_reviews("p1", &replacement).await.unwrap();

        let cached = store.fresh_reviews("p1", 30).await.unwrap().unwrap();
        assert_eq!(cached, replacement, "Old reviews should be gone");
    }

    #[tokio::test]
    async fn test_replace_reviews_unknown_venue() {
        let store = Store::in_memory().await.unwrap();
        let result = store.replace_reviews("missing", &sample_reviews()).await;
        assert!(matches!(
            result,
            Err(StorageError::UnknownVenue { .. })
        ));
    }

    #[tokio::test]
    async fn test_fresh_reviews_miss_on_stale_venue() {
        let store = Store::in_memory().await.unwrap();
        store.upsert_venue(&sample_venue("p1")).await.unwrap();
        store.replace_reviews("p1", &sample_reviews()).await.unwrap();

        // Backdate the venue past the freshness window
        let old = Utc::now() - Duration::days(45);
        sqlx::query("UPDATE venues SET last_update = ? WHERE place_id = 'p1'")
            .bind(old)
            .execute(store.pool())
            .await
            .unwrap();

        assert!(store.fresh_reviews("p1", 30).await.unwrap().is_none());
        // A fresh venue with reviews is a hit again after re-upsert
        store.upsert_venue(&sample_venue("p1")).await.unwrap();
        assert!(store.fresh_reviews("p1", 30).await.unwrap().is_some());
    }

    #[tokio::test]
    async fn test_fresh_reviews_miss_without_rows() {
        let store = Store::in_memory().await.unwrap();
        store.upsert_venue(&sample_venue("p1")).await.unwrap();
        assert!(
            store.fresh_reviews("p1", 30).await.unwrap().is_none(),
            "Fresh venue without reviews is still a miss"
        );
    }

    #[tokio::test]
    async fn test_insert_recommendation_appends() {
        let store = Store::in_memory().await.unwrap();

        let record = RecommendationRecord {
            user_input: "想在信義區吃火鍋".to_string(),
            location: "信義區".to_string(),
            category: "火鍋".to_string(),
            top_place_ids: "p1,p2,p3".to_string(),
            recommendation_json: serde_json::json!([{"place_id": "p1"}]),
            created_at: Utc::now(),
        };

        store.insert_recommendation(&record).await.unwrap();
        store.insert_recommendation(&record).await.unwrap();

        let count: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM recommendations")
            .fetch_one(store.pool())
            .await
            .unwrap();
        assert_eq!(count, 2, "History is append-only, one row per call");
    }

    #[tokio::test]
    async fn test_recent_recommendations_newest_first() {
        let store = Store::in_memory().await.unwrap();

        for input in ["第一次", "第二次", "第三次"] {
            let record = RecommendationRecord {
                user_input: input.to_string(),
                location: "信義區".to_string(),
                category: "火鍋".to_string(),
                top_place_ids: "p1".to_string(),
                recommendation_json: serde_json::json!([]),
                created_at: Utc::now(),
            };
            store.insert_recommendation(&record).await.unwrap();
        }

        let records = store.recent_recommendations(2).await.unwrap();
        assert_eq!(records.len(), 2);
        assert_eq!(records[0].user_input, "第三次");
        assert_eq!(records[1].user_input, "第二次");
    }
}
