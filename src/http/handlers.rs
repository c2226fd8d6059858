use axum::{extract::State, http::StatusCode, Json};
use serde::{Deserialize, Serialize};
use time::format_description::well_known::Rfc3339;
use time::OffsetDateTime;

use crate::app::fanout;
use crate::app::listings::ListingService;
use crate::app::moderation::{ModerationService, NewWarning};
use crate::app::notifications::NotificationService;
use crate::domain::listing::{Listing, ListingStatus};
use crate::domain::moderation::{Severity, Warning};
use crate::domain::notification::Notification;
use crate::http::extract::{ApiJson, ApiPath, ApiQuery};
use crate::http::{ApiResponse, AppError, Moderator};
use crate::AppState;

#[derive(Serialize)]
pub(crate) struct HealthResponse {
    status: &'static str,
}

pub(crate) async fn health(State(state): State<AppState>) -> Json<HealthResponse> {
    let status = if state.db.ping().await.is_ok() {
        "ok"
    } else {
        "degraded"
    };

    Json(HealthResponse { status })
}

/// Trimmed value, with blank strings treated as absent.
fn present(value: Option<String>) -> Option<String> {
    value
        .map(|value| value.trim().to_string())
        .filter(|value| !value.is_empty())
}

fn parse_severity(value: Option<String>) -> Result<Option<Severity>, AppError> {
    match present(value) {
        Some(value) => Severity::parse(&value)
            .map(Some)
            .ok_or_else(|| AppError::bad_request("severity must be one of: mild, severe")),
        None => Ok(None),
    }
}

#[derive(Deserialize)]
pub struct ListServicesQuery {
    pub status: Option<String>,
    pub limit: Option<i64>,
    pub offset: Option<i64>,
}

pub async fn list_services(
    _moderator: Moderator,
    State(state): State<AppState>,
    ApiQuery(query): ApiQuery<ListServicesQuery>,
) -> Result<Json<ApiResponse<Vec<Listing>>>, AppError> {
    let limit = query.limit.unwrap_or(20);
    if !(1..=100).contains(&limit) {
        return Err(AppError::bad_request("limit must be between 1 and 100"));
    }
    let offset = query.offset.unwrap_or(0);
    if offset < 0 {
        return Err(AppError::bad_request("offset must not be negative"));
    }
    let status = match present(query.status) {
        Some(label) => Some(
            ListingStatus::from_label(&label)
                .ok_or_else(|| AppError::bad_request("invalid status filter"))?,
        ),
        None => None,
    };

    let service = ListingService::new(state.db.clone());
    let listings = service.list(status, limit, offset).await.map_err(|err| {
        tracing::error!(error = ?err, "failed to list services");
        AppError::internal("failed to list services")
    })?;

    Ok(Json(ApiResponse::success(listings)))
}

pub async fn get_service(
    _moderator: Moderator,
    ApiPath(id): ApiPath<i64>,
    State(state): State<AppState>,
) -> Result<Json<ApiResponse<Listing>>, AppError> {
    let service = ListingService::new(state.db.clone());
    let listing = service.get(id).await.map_err(|err| {
        tracing::error!(error = ?err, listing_id = id, "failed to get service");
        AppError::internal("failed to get service")
    })?;

    match listing {
        Some(listing) => Ok(Json(ApiResponse::success(listing))),
        None => Err(AppError::not_found("service not found")),
    }
}

#[derive(Deserialize)]
pub struct ModerateServiceRequest {
    pub status: Option<String>,
    pub reason: Option<String>,
    pub severity: Option<String>,
}

pub async fn moderate_service(
    _moderator: Moderator,
    ApiPath(id): ApiPath<i64>,
    State(state): State<AppState>,
    ApiJson(payload): ApiJson<ModerateServiceRequest>,
) -> Result<Json<ApiResponse<Listing>>, AppError> {
    let status = present(payload.status);
    let reason = present(payload.reason);
    if status.is_none() && reason.is_none() {
        return Err(AppError::bad_request("status or reason is required"));
    }
    let severity = parse_severity(payload.severity)?;
    let suspend = match status.as_deref() {
        Some("suspended") => true,
        Some(_) => return Err(AppError::bad_request("invalid status")),
        None => false,
    };

    let service = ModerationService::new(state.db.clone());
    let outcome = service
        .moderate_listing(id, suspend, reason.as_deref(), severity)
        .await
        .map_err(|err| {
            tracing::error!(error = ?err, listing_id = id, "failed to moderate service");
            AppError::internal("failed to update service")
        })?
        .ok_or_else(|| AppError::not_found("service not found"))?;

    if let Some(fanout) = &outcome.fanout {
        fanout::deliver(state.realtime.as_ref(), fanout).await;
    }

    let message = if outcome.suspended {
        "Service suspended successfully"
    } else {
        "Warning issued successfully"
    };
    tracing::info!(
        listing_id = id,
        suspended = outcome.suspended,
        warned = outcome.warning.is_some(),
        "service moderated"
    );

    Ok(Json(ApiResponse::success(outcome.listing).with_message(message)))
}

pub async fn reactivate_service(
    _moderator: Moderator,
    ApiPath(id): ApiPath<i64>,
    State(state): State<AppState>,
) -> Result<Json<ApiResponse<Listing>>, AppError> {
    let service = ListingService::new(state.db.clone());
    let listing = service.reactivate(id).await.map_err(|err| {
        tracing::error!(error = ?err, listing_id = id, "failed to reactivate service");
        AppError::internal("failed to reactivate service")
    })?;

    match listing {
        Some(listing) => {
            Ok(Json(ApiResponse::success(listing).with_message("Service reactivated successfully")))
        }
        None => Err(AppError::not_found("service not found")),
    }
}

#[derive(Deserialize)]
pub struct WarnServiceRequest {
    pub listing_id: Option<i64>,
    pub user_id: Option<String>,
    pub severity: Option<String>,
    pub comment: Option<String>,
    pub reason: Option<String>,
}

pub async fn warn_service(
    _moderator: Moderator,
    State(state): State<AppState>,
    ApiJson(payload): ApiJson<WarnServiceRequest>,
) -> Result<Json<ApiResponse<Warning>>, AppError> {
    let (Some(listing_id), Some(_user_id), Some(severity), Some(comment), Some(reason)) = (
        payload.listing_id,
        present(payload.user_id),
        present(payload.severity),
        present(payload.comment),
        present(payload.reason),
    ) else {
        return Err(AppError::bad_request(
            "listing_id, user_id, severity, comment and reason are required",
        ));
    };
    let severity = Severity::parse(&severity)
        .ok_or_else(|| AppError::bad_request("severity must be one of: mild, severe"))?;

    let service = ModerationService::new(state.db.clone());
    let (warning, fanout) = service
        .warn_listing(listing_id, severity, &reason, &comment)
        .await
        .map_err(|err| {
            tracing::error!(error = ?err, listing_id, "failed to warn service");
            AppError::internal("failed to create warning")
        })?
        .ok_or_else(|| AppError::not_found("service not found"))?;

    fanout::deliver(state.realtime.as_ref(), &fanout).await;

    Ok(Json(
        ApiResponse::success(warning).with_message("Warning issued successfully"),
    ))
}

#[derive(Deserialize)]
pub struct CreateWarningRequest {
    pub user_id: Option<String>,
    pub severity: Option<String>,
    pub reason: Option<String>,
    pub comment: Option<String>,
    pub listing_id: Option<i64>,
    pub created_at: Option<String>,
}

pub async fn create_warning(
    _moderator: Moderator,
    State(state): State<AppState>,
    ApiJson(payload): ApiJson<CreateWarningRequest>,
) -> Result<(StatusCode, Json<ApiResponse<Warning>>), AppError> {
    let (Some(user_id), Some(reason)) = (present(payload.user_id), present(payload.reason)) else {
        return Err(AppError::bad_request("user_id, severity and reason are required"));
    };
    let severity = parse_severity(payload.severity)?
        .ok_or_else(|| AppError::bad_request("user_id, severity and reason are required"))?;
    let created_at = match present(payload.created_at) {
        Some(value) => Some(
            OffsetDateTime::parse(&value, &Rfc3339)
                .map_err(|_| AppError::bad_request("created_at must be an RFC 3339 timestamp"))?,
        ),
        None => None,
    };

    let service = ModerationService::new(state.db.clone());
    let (warning, fanout) = service
        .create_warning(NewWarning {
            user_id: user_id.clone(),
            severity,
            reason,
            comment: present(payload.comment),
            listing_id: payload.listing_id,
            created_at,
        })
        .await
        .map_err(|err| {
            tracing::error!(error = ?err, user_id = %user_id, "failed to create warning");
            AppError::internal("failed to create warning")
        })?
        .ok_or_else(|| AppError::not_found("warning target not found"))?;

    fanout::deliver(state.realtime.as_ref(), &fanout).await;

    Ok((StatusCode::CREATED, Json(ApiResponse::success(warning))))
}

#[derive(Deserialize)]
pub struct ListWarningsQuery {
    pub user_id: Option<String>,
    pub listing_id: Option<i64>,
    pub limit: Option<i64>,
}

pub async fn list_warnings(
    _moderator: Moderator,
    State(state): State<AppState>,
    ApiQuery(query): ApiQuery<ListWarningsQuery>,
) -> Result<Json<ApiResponse<Vec<Warning>>>, AppError> {
    let limit = query.limit.unwrap_or(50);
    if !(1..=200).contains(&limit) {
        return Err(AppError::bad_request("limit must be between 1 and 200"));
    }
    let user_id = present(query.user_id);

    let service = ModerationService::new(state.db.clone());
    let warnings = service
        .list_warnings(user_id.as_deref(), query.listing_id, limit)
        .await
        .map_err(|err| {
            tracing::error!(error = ?err, "failed to list warnings");
            AppError::internal("failed to list warnings")
        })?;

    Ok(Json(ApiResponse::success(warnings)))
}

#[derive(Deserialize)]
pub struct ListNotificationsQuery {
    pub user_id: Option<String>,
    pub limit: Option<i64>,
}

pub async fn list_notifications(
    _moderator: Moderator,
    State(state): State<AppState>,
    ApiQuery(query): ApiQuery<ListNotificationsQuery>,
) -> Result<Json<ApiResponse<Vec<Notification>>>, AppError> {
    let user_id =
        present(query.user_id).ok_or_else(|| AppError::bad_request("user_id is required"))?;
    let limit = query.limit.unwrap_or(50);
    if !(1..=200).contains(&limit) {
        return Err(AppError::bad_request("limit must be between 1 and 200"));
    }

    let service = NotificationService::new(state.db.clone());
    let notifications = service.list(&user_id, limit).await.map_err(|err| {
        tracing::error!(error = ?err, user_id = %user_id, "failed to list notifications");
        AppError::internal("failed to list notifications")
    })?;

    Ok(Json(ApiResponse::success(notifications)))
}

pub async fn mark_notification_read(
    _moderator: Moderator,
    ApiPath(id): ApiPath<i64>,
    State(state): State<AppState>,
) -> Result<StatusCode, AppError> {
    let service = NotificationService::new(state.db.clone());
    let updated = service.mark_read(id).await.map_err(|err| {
        tracing::error!(error = ?err, notification_id = id, "failed to mark notification read");
        AppError::internal("failed to mark notification read")
    })?;

    if updated {
        Ok(StatusCode::NO_CONTENT)
    } else {
        Err(AppError::not_found("notification not found"))
    }
}
