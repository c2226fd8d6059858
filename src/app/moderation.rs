use anyhow::Result;
use serde_json::json;
use sqlx::postgres::PgRow;
use sqlx::{Postgres, Row, Transaction};
use time::OffsetDateTime;

use crate::app::fanout::{user_channel, Fanout, WARNINGS_CHANNEL};
use crate::app::listings::{listing_from_row, LISTING_SELECT};
use crate::domain::listing::Listing;
use crate::domain::moderation::{ModerationKind, Severity, Warning};
use crate::infra::db::Db;

const NEW_NOTIFICATION_EVENT: &str = "new-notification";
const WARNINGS_CREATED_EVENT: &str = "created";
const WARNING_CREATED_EVENT: &str = "warning-created";

/// Result of a committed suspend/warn action on a listing.
#[derive(Debug, Clone)]
pub struct ModerationOutcome {
    pub listing: Listing,
    pub suspended: bool,
    pub warning: Option<Warning>,
    /// Present only when an audit trail was written.
    pub fanout: Option<Fanout>,
}

#[derive(Debug, Clone)]
pub struct NewWarning {
    pub user_id: String,
    pub severity: Severity,
    pub reason: String,
    pub comment: Option<String>,
    pub listing_id: Option<i64>,
    pub created_at: Option<OffsetDateTime>,
}

#[derive(Clone)]
pub struct ModerationService {
    db: Db,
}

impl ModerationService {
    pub fn new(db: Db) -> Self {
        Self { db }
    }

    /// Suspend a listing and/or warn its poster in one transaction.
    ///
    /// Returns `Ok(None)` when the listing does not exist; nothing is written in that case.
    /// The returned fanout must be delivered by the caller after this returns.
    pub async fn moderate_listing(
        &self,
        listing_id: i64,
        suspend: bool,
        reason: Option<&str>,
        severity: Option<Severity>,
    ) -> Result<Option<ModerationOutcome>> {
        let mut tx = self.db.pool().begin().await?;

        let Some(mut listing) = fetch_listing(&mut tx, listing_id).await? else {
            tx.rollback().await?;
            return Ok(None);
        };

        if suspend {
            sqlx::query(
                "UPDATE listings SET status = 'suspended', updated_at = now() WHERE id = $1",
            )
            .bind(listing_id)
            .execute(&mut *tx)
            .await?;

            listing = match fetch_listing(&mut tx, listing_id).await? {
                Some(listing) => listing,
                None => {
                    tx.rollback().await?;
                    return Ok(None);
                }
            };
        }

        let mut warning = None;
        let mut fanout = None;

        if let Some(reason) = reason.filter(|reason| !reason.trim().is_empty()) {
            let kind = ModerationKind::from_suspended(suspend);
            let severity = Severity::effective(severity, suspend);

            let event_id = insert_event(
                &mut tx,
                &listing.id.to_string(),
                "listing",
                kind.event_description(),
            )
            .await?;

            let created = insert_warning(
                &mut tx,
                Some(listing.id),
                &listing.poster_id,
                severity,
                reason,
                None,
                None,
            )
            .await?;

            let message = listing_message(&listing.title, kind, reason);
            insert_notification(&mut tx, &message, &listing.poster_id, event_id).await?;

            fanout = Some(Fanout::new().push(
                user_channel(&listing.poster_id),
                NEW_NOTIFICATION_EVENT,
                json!({
                    "message": message,
                    "event_type": kind.event_description(),
                    "service_id": listing.id,
                    "severity": severity,
                }),
            ));
            warning = Some(created);
        }

        tx.commit().await?;

        Ok(Some(ModerationOutcome {
            listing,
            suspended: suspend,
            warning,
            fanout,
        }))
    }

    /// Warn the poster of a listing without touching its status.
    ///
    /// The recipient is always the listing's poster, never a caller-supplied id.
    pub async fn warn_listing(
        &self,
        listing_id: i64,
        severity: Severity,
        reason: &str,
        comment: &str,
    ) -> Result<Option<(Warning, Fanout)>> {
        let mut tx = self.db.pool().begin().await?;

        let Some(listing) = fetch_listing(&mut tx, listing_id).await? else {
            tx.rollback().await?;
            return Ok(None);
        };

        let kind = ModerationKind::Warning;
        let event_id = insert_event(
            &mut tx,
            &listing.id.to_string(),
            "listing",
            kind.event_description(),
        )
        .await?;

        let warning = insert_warning(
            &mut tx,
            Some(listing.id),
            &listing.poster_id,
            severity,
            reason,
            Some(comment),
            None,
        )
        .await?;

        let message = listing_message(&listing.title, kind, reason);
        insert_notification(&mut tx, &message, &listing.poster_id, event_id).await?;

        tx.commit().await?;

        let payload = json!({
            "message": message,
            "eventType": kind.event_description(),
            "listing_id": listing.id,
            "severity": severity,
        });
        let fanout = Fanout::new()
            .push(
                user_channel(&listing.poster_id),
                NEW_NOTIFICATION_EVENT,
                payload.clone(),
            )
            .push(WARNINGS_CHANNEL, WARNINGS_CREATED_EVENT, payload);

        Ok(Some((warning, fanout)))
    }

    /// Issue a warning straight to a user, optionally tied to a listing.
    ///
    /// When a listing is given its poster is the recipient, whatever `user_id` says.
    /// Returns `Ok(None)` when the user, or the referenced listing, does not exist.
    pub async fn create_warning(&self, new: NewWarning) -> Result<Option<(Warning, Fanout)>> {
        let mut tx = self.db.pool().begin().await?;

        let listing = match new.listing_id {
            Some(listing_id) => match fetch_listing(&mut tx, listing_id).await? {
                Some(listing) => Some(listing),
                None => {
                    tx.rollback().await?;
                    return Ok(None);
                }
            },
            None => {
                let user_exists: bool =
                    sqlx::query_scalar("SELECT EXISTS(SELECT 1 FROM users WHERE id = $1)")
                        .bind(&new.user_id)
                        .fetch_one(&mut *tx)
                        .await?;
                if !user_exists {
                    tx.rollback().await?;
                    return Ok(None);
                }
                None
            }
        };

        let recipient_id = match &listing {
            Some(listing) => {
                if listing.poster_id != new.user_id {
                    tracing::warn!(
                        listing_id = listing.id,
                        requested_user_id = %new.user_id,
                        poster_id = %listing.poster_id,
                        "warning redirected to listing poster"
                    );
                }
                listing.poster_id.clone()
            }
            None => new.user_id.clone(),
        };

        let kind = ModerationKind::Warning;
        let event_id = match &listing {
            Some(listing) => {
                insert_event(
                    &mut tx,
                    &listing.id.to_string(),
                    "listing",
                    kind.event_description(),
                )
                .await?
            }
            None => insert_event(&mut tx, &recipient_id, "user", kind.event_description()).await?,
        };

        let warning = insert_warning(
            &mut tx,
            new.listing_id,
            &recipient_id,
            new.severity,
            &new.reason,
            new.comment.as_deref(),
            new.created_at,
        )
        .await?;

        let message = match &listing {
            Some(listing) => listing_message(&listing.title, kind, &new.reason),
            None => format!("You have received a warning. Reason: {}", new.reason),
        };
        insert_notification(&mut tx, &message, &recipient_id, event_id).await?;

        tx.commit().await?;

        let payload = json!({
            "message": message,
            "eventType": kind.event_description(),
            "listing_id": new.listing_id,
            "severity": new.severity,
        });
        let fanout = Fanout::new()
            .push(
                user_channel(&recipient_id),
                NEW_NOTIFICATION_EVENT,
                payload.clone(),
            )
            .push(WARNINGS_CHANNEL, WARNING_CREATED_EVENT, payload);

        Ok(Some((warning, fanout)))
    }

    pub async fn list_warnings(
        &self,
        user_id: Option<&str>,
        listing_id: Option<i64>,
        limit: i64,
    ) -> Result<Vec<Warning>> {
        let rows = sqlx::query(
            "SELECT id, listing_id, user_id, severity, reason, comment, created_at \
             FROM warnings \
             WHERE ($1::text IS NULL OR user_id = $1) \
               AND ($2::bigint IS NULL OR listing_id = $2) \
             ORDER BY created_at DESC, id DESC \
             LIMIT $3",
        )
        .bind(user_id)
        .bind(listing_id)
        .bind(limit)
        .fetch_all(self.db.pool())
        .await?;

        rows.iter().map(warning_from_row).collect()
    }
}

fn listing_message(title: &str, kind: ModerationKind, reason: &str) -> String {
    match kind {
        ModerationKind::Suspension => format!(
            "Your listing \"{}\" has been suspended. Reason: {}",
            title, reason
        ),
        ModerationKind::Warning => format!(
            "Your listing \"{}\" has received a warning. Reason: {}",
            title, reason
        ),
    }
}

async fn fetch_listing(
    tx: &mut Transaction<'_, Postgres>,
    listing_id: i64,
) -> Result<Option<Listing>> {
    let row = sqlx::query(&format!("{} WHERE l.id = $1", LISTING_SELECT))
        .bind(listing_id)
        .fetch_optional(&mut **tx)
        .await?;

    row.as_ref().map(listing_from_row).transpose()
}

async fn insert_event(
    tx: &mut Transaction<'_, Postgres>,
    target_id: &str,
    event_type: &str,
    description: &str,
) -> Result<i64> {
    let id: i64 = sqlx::query_scalar(
        "INSERT INTO events (target_id, event_type, description) \
         VALUES ($1, $2, $3) \
         RETURNING id",
    )
    .bind(target_id)
    .bind(event_type)
    .bind(description)
    .fetch_one(&mut **tx)
    .await?;

    Ok(id)
}

async fn insert_warning(
    tx: &mut Transaction<'_, Postgres>,
    listing_id: Option<i64>,
    user_id: &str,
    severity: Severity,
    reason: &str,
    comment: Option<&str>,
    created_at: Option<OffsetDateTime>,
) -> Result<Warning> {
    let row = sqlx::query(
        "INSERT INTO warnings (listing_id, user_id, severity, reason, comment, created_at) \
         VALUES ($1, $2, $3, $4, $5, COALESCE($6, now())) \
         RETURNING id, listing_id, user_id, severity, reason, comment, created_at",
    )
    .bind(listing_id)
    .bind(user_id)
    .bind(severity.as_db())
    .bind(reason)
    .bind(comment)
    .bind(created_at)
    .fetch_one(&mut **tx)
    .await?;

    warning_from_row(&row)
}

async fn insert_notification(
    tx: &mut Transaction<'_, Postgres>,
    message: &str,
    user_id: &str,
    event_id: i64,
) -> Result<()> {
    sqlx::query(
        "INSERT INTO notifications (message, user_id, event_id, is_read) \
         VALUES ($1, $2, $3, false)",
    )
    .bind(message)
    .bind(user_id)
    .bind(event_id)
    .execute(&mut **tx)
    .await?;

    Ok(())
}

fn warning_from_row(row: &PgRow) -> Result<Warning> {
    let severity: String = row.get("severity");
    let severity = Severity::parse(&severity)
        .ok_or_else(|| anyhow::anyhow!("unknown warning severity: {}", severity))?;

    Ok(Warning {
        id: row.get("id"),
        listing_id: row.get("listing_id"),
        user_id: row.get("user_id"),
        severity,
        reason: row.get("reason"),
        comment: row.get("comment"),
        created_at: row.get("created_at"),
    })
}
