// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

use std::sync::Arc;

use axum::{
    extract::{Path, Query, State},
    http::{header, HeaderName, HeaderValue, StatusCode},
    response::{IntoResponse, Response},
    Json,
};

use super::run_blocking;
use crate::{
    error::ApiError,
    models::{
        AuthorizeDownloadRequest, AuthorizeDownloadResponse, DownloadRequest, ParamsQuery,
        ParamsResponse, VerifyTokenRequest, VerifyTokenResponse,
    },
    state::AppState,
    workflow::Delivery,
};

/// Response header carrying the hex checksum of delivered content.
pub const CHECKSUM_HEADER: HeaderName = HeaderName::from_static("x-content-sha256");

#[utoipa::path(
    post,
    path = "/verify-token",
    request_body = VerifyTokenRequest,
    tag = "Redeem",
    responses(
        (status = 200, body = VerifyTokenResponse),
        (status = 404, body = VerifyTokenResponse, description = "Invalid or expired token")
    )
)]
pub async fn verify_token(
    State(state): State<AppState>,
    Json(request): Json<VerifyTokenRequest>,
) -> Result<(StatusCode, Json<VerifyTokenResponse>), ApiError> {
    let token = request
        .token
        .filter(|t| !t.is_empty())
        .ok_or_else(|| ApiError::bad_request("Token missing"))?;

    if state.workflow.redeem_check(&token) {
        Ok((
            StatusCode::OK,
            Json(VerifyTokenResponse {
                valid: true,
                error: None,
            }),
        ))
    } else {
        Ok((
            StatusCode::NOT_FOUND,
            Json(VerifyTokenResponse {
                valid: false,
                error: Some("Invalid or expired token".to_string()),
            }),
        ))
    }
}

#[utoipa::path(
    post,
    path = "/download",
    request_body = DownloadRequest,
    tag = "Redeem",
    responses(
        (status = 200, description = "Decrypted file as attachment"),
        (status = 400, description = "Missing token or password"),
        (status = 401, description = "Invalid or expired token"),
        (status = 403, description = "Incorrect password"),
        (status = 422, description = "Checksum mismatch"),
        (status = 500, description = "Decryption failed")
    )
)]
pub async fn download_file(
    State(state): State<AppState>,
    Json(request): Json<DownloadRequest>,
) -> Result<Response, ApiError> {
    let (Some(token), Some(password)) = (
        request.token.filter(|t| !t.is_empty()),
        request.password.filter(|p| !p.is_empty()),
    ) else {
        return Err(ApiError::bad_request("Missing token or password"));
    };

    let workflow = Arc::clone(&state.workflow);
    let delivery = run_blocking(move || workflow.redeem_download(&token, &password)).await?;
    Ok(attachment(delivery))
}

#[utoipa::path(
    get,
    path = "/params",
    params(ParamsQuery),
    tag = "Redeem",
    responses(
        (status = 200, body = ParamsResponse),
        (status = 401, body = ParamsResponse, description = "Invalid token or password")
    )
)]
pub async fn get_params(
    State(state): State<AppState>,
    Query(query): Query<ParamsQuery>,
) -> Result<(StatusCode, Json<ParamsResponse>), ApiError> {
    let invalid = || {
        (
            StatusCode::UNAUTHORIZED,
            Json(ParamsResponse {
                valid: false,
                checksum: None,
            }),
        )
    };

    let (Some(token), Some(password)) = (query.token, query.password) else {
        return Ok(invalid());
    };

    let workflow = Arc::clone(&state.workflow);
    let check = run_blocking(move || workflow.params_check(&token, &password)).await?;
    if !check.valid {
        return Ok(invalid());
    }

    Ok((
        StatusCode::OK,
        Json(ParamsResponse {
            valid: true,
            checksum: check.checksum.map(|c| c.to_hex()),
        }),
    ))
}

#[utoipa::path(
    post,
    path = "/access/authorize",
    request_body = AuthorizeDownloadRequest,
    tag = "Redeem",
    responses(
        (status = 200, body = AuthorizeDownloadResponse),
        (status = 400, description = "Missing token, password or checksum"),
        (status = 401, description = "Invalid or expired token"),
        (status = 403, description = "Incorrect password"),
        (status = 422, description = "Checksum mismatch")
    )
)]
pub async fn authorize_download(
    State(state): State<AppState>,
    Json(request): Json<AuthorizeDownloadRequest>,
) -> Result<Json<AuthorizeDownloadResponse>, ApiError> {
    let (Some(token), Some(password)) = (
        request.token.filter(|t| !t.is_empty()),
        request.password.filter(|p| !p.is_empty()),
    ) else {
        return Err(ApiError::bad_request("Missing token or password"));
    };
    let checksum = request.checksum.unwrap_or_default();

    let workflow = Arc::clone(&state.workflow);
    let grant =
        run_blocking(move || workflow.authorize_download(&token, &password, &checksum)).await?;

    Ok(Json(AuthorizeDownloadResponse {
        download_grant: grant.id,
        expires_at: grant.expires_at,
    }))
}

#[utoipa::path(
    get,
    path = "/access/download/{grant}",
    params(("grant" = String, Path, description = "Grant from /access/authorize")),
    tag = "Redeem",
    responses(
        (status = 200, description = "Decrypted file as attachment"),
        (status = 401, description = "Unknown, used or expired grant")
    )
)]
pub async fn grant_download(
    State(state): State<AppState>,
    Path(grant): Path<String>,
) -> Result<Response, ApiError> {
    let workflow = Arc::clone(&state.workflow);
    let delivery = run_blocking(move || workflow.take_download(&grant)).await?;
    Ok(attachment(delivery))
}

/// Turn decrypted content into a file download response.
pub fn attachment(delivery: Delivery) -> Response {
    let disposition = HeaderValue::from_str(&format!(
        "attachment; filename=\"{}\"",
        header_safe_file_name(&delivery.file_name)
    ))
    .unwrap_or_else(|_| HeaderValue::from_static("attachment"));

    let checksum = HeaderValue::from_str(&delivery.checksum.to_hex())
        .unwrap_or_else(|_| HeaderValue::from_static(""));

    (
        [
            (
                header::CONTENT_TYPE,
                HeaderValue::from_static("application/octet-stream"),
            ),
            (header::CONTENT_DISPOSITION, disposition),
            (CHECKSUM_HEADER, checksum),
        ],
        delivery.bytes,
    )
        .into_response()
}

/// Printable ASCII only, without quotes or backslashes.
fn header_safe_file_name(name: &str) -> String {
    name.chars()
        .map(|c| match c {
            '"' | '\\' => '_',
            c if c.is_ascii_graphic() || c == ' ' => c,
            _ => '_',
        })
        .collect()
}
