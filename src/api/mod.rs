// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

use axum::{
    extract::DefaultBodyLimit,
    routing::{get, post},
    Router,
};
use tower::ServiceBuilder;
use tower_http::{cors::CorsLayer, trace::TraceLayer};
use utoipa::OpenApi;
use utoipa_swagger_ui::SwaggerUi;

use crate::{
    error::ApiError,
    models::{
        AuthorizeDownloadRequest, AuthorizeDownloadResponse, DownloadRequest, ParamsResponse,
        UploadForm, UploadResponse, VerifyTokenRequest, VerifyTokenResponse,
    },
    state::AppState,
    workflow::WorkflowError,
};

pub mod health;
pub mod redeem;
pub mod upload;

pub fn router(state: AppState, max_upload_bytes: usize) -> Router {
    let routes = Router::new()
        .route("/upload", post(upload::upload_file))
        .route("/verify-token", post(redeem::verify_token))
        .route("/download", post(redeem::download_file))
        .route("/params", get(redeem::get_params))
        .route("/access/authorize", post(redeem::authorize_download))
        .route("/access/download/{grant}", get(redeem::grant_download))
        .route("/health", get(health::health))
        .route("/health/live", get(health::liveness))
        .route("/health/ready", get(health::readiness))
        .with_state(state);

    Router::new()
        .merge(routes)
        .merge(SwaggerUi::new("/docs").url("/api-doc/openapi.json", ApiDoc::openapi()))
        .layer(DefaultBodyLimit::max(max_upload_bytes))
        .layer(
            ServiceBuilder::new()
                .layer(TraceLayer::new_for_http())
                .layer(CorsLayer::permissive()),
        )
}

/// Run blocking workflow code (file I/O, AES) off the async executor.
pub(crate) async fn run_blocking<T, F>(f: F) -> Result<T, ApiError>
where
    F: FnOnce() -> Result<T, WorkflowError> + Send + 'static,
    T: Send + 'static,
{
    tokio::task::spawn_blocking(f)
        .await
        .map_err(|e| {
            tracing::error!(error = %e, "Blocking task failed");
            ApiError::internal("Internal error")
        })?
        .map_err(ApiError::from)
}

#[derive(OpenApi)]
#[openapi(
    paths(
        upload::upload_file,
        redeem::verify_token,
        redeem::download_file,
        redeem::get_params,
        redeem::authorize_download,
        redeem::grant_download,
        health::health,
        health::liveness,
        health::readiness
    ),
    components(
        schemas(
            UploadForm,
            UploadResponse,
            VerifyTokenRequest,
            VerifyTokenResponse,
            DownloadRequest,
            ParamsResponse,
            AuthorizeDownloadRequest,
            AuthorizeDownloadResponse,
            health::ReadyResponse,
            health::HealthChecks,
            health::HealthResponse
        )
    ),
    tags(
        (name = "Upload", description = "Encrypt a file and issue an access token"),
        (name = "Redeem", description = "Token validation, checksum confirmation and download"),
        (name = "Health", description = "Liveness and readiness probes")
    )
)]
struct ApiDoc;
