use anyhow::{anyhow, Result};
use sqlx::postgres::PgRow;
use sqlx::Row;

use crate::domain::listing::{Listing, ListingStatus};
use crate::infra::db::Db;

pub(crate) const LISTING_SELECT: &str =
    "SELECT l.id, l.title, l.description, l.status, l.poster_id, u.name AS poster_name, \
            l.created_at, l.updated_at \
     FROM listings l \
     LEFT JOIN users u ON u.id = l.poster_id";

pub(crate) fn listing_from_row(row: &PgRow) -> Result<Listing> {
    let status: String = row.get("status");
    let status = ListingStatus::from_db(&status)
        .ok_or_else(|| anyhow!("unknown listing status: {}", status))?;

    Ok(Listing {
        id: row.get("id"),
        title: row.get("title"),
        description: row.get("description"),
        status,
        poster_id: row.get("poster_id"),
        poster_name: row.get("poster_name"),
        created_at: row.get("created_at"),
        updated_at: row.get("updated_at"),
    })
}

#[derive(Clone)]
pub struct ListingService {
    db: Db,
}

impl ListingService {
    pub fn new(db: Db) -> Self {
        Self { db }
    }

    pub async fn get(&self, listing_id: i64) -> Result<Option<Listing>> {
        let row = sqlx::query(&format!("{} WHERE l.id = $1", LISTING_SELECT))
            .bind(listing_id)
            .fetch_optional(self.db.pool())
            .await?;

        row.as_ref().map(listing_from_row).transpose()
    }

    pub async fn list(
        &self,
        status: Option<ListingStatus>,
        limit: i64,
        offset: i64,
    ) -> Result<Vec<Listing>> {
        let rows = sqlx::query(&format!(
            "{} \
             WHERE ($1::text IS NULL OR l.status = $1) \
             ORDER BY l.created_at DESC, l.id DESC \
             LIMIT $2 OFFSET $3",
            LISTING_SELECT
        ))
        .bind(status.map(|status| status.as_db()))
        .bind(limit)
        .bind(offset)
        .fetch_all(self.db.pool())
        .await?;

        rows.iter().map(listing_from_row).collect()
    }

    /// Plain status overwrite back to active. No audit trail is written.
    pub async fn reactivate(&self, listing_id: i64) -> Result<Option<Listing>> {
        let result = sqlx::query(
            "UPDATE listings SET status = 'active', updated_at = now() WHERE id = $1",
        )
        .bind(listing_id)
        .execute(self.db.pool())
        .await?;

        if result.rows_affected() == 0 {
            return Ok(None);
        }

        self.get(listing_id).await
    }
}
