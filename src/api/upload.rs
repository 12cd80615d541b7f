// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

use std::sync::Arc;

use axum::{
    extract::{Multipart, State},
    Json,
};

use super::run_blocking;
use crate::{
    error::ApiError,
    models::{UploadForm, UploadResponse},
    state::AppState,
    workflow::UploadedFile,
};

#[utoipa::path(
    post,
    path = "/upload",
    request_body(content = UploadForm, content_type = "multipart/form-data"),
    tag = "Upload",
    responses(
        (status = 200, body = UploadResponse),
        (status = 400, description = "Missing file or password")
    )
)]
pub async fn upload_file(
    State(state): State<AppState>,
    mut multipart: Multipart,
) -> Result<Json<UploadResponse>, ApiError> {
    let mut file = None;
    let mut password = None;

    while let Some(field) = multipart
        .next_field()
        .await
        .map_err(|e| ApiError::bad_request(format!("Invalid multipart body: {e}")))?
    {
        let name = field.name().map(str::to_owned);
        match name.as_deref() {
            Some("file") => {
                let file_name = field.file_name().unwrap_or_default().to_string();
                let bytes = field
                    .bytes()
                    .await
                    .map_err(|e| ApiError::bad_request(format!("Failed to read file: {e}")))?;
                file = Some(UploadedFile {
                    name: file_name,
                    bytes: bytes.to_vec(),
                });
            }
            Some("password") => {
                let text = field
                    .text()
                    .await
                    .map_err(|e| ApiError::bad_request(format!("Failed to read password: {e}")))?;
                password = Some(text);
            }
            _ => {}
        }
    }

    let workflow = Arc::clone(&state.workflow);
    let receipt = run_blocking(move || workflow.upload(file, password.as_deref())).await?;
    Ok(Json(receipt.into()))
}
