use std::collections::HashMap;

use axum::{
    Form, Json,
    extract::{Path, Query, State},
    http::{StatusCode, header},
    response::{IntoResponse, Response},
};
use serde::Serialize;

use crate::{
    core::GroupRecord,
    dispatch::{DispatchRequest, Outcome},
    error::AppResult,
    state::AppState,
};

#[derive(Debug, Serialize)]
pub struct ApiResponse<T> {
    pub data: T,
}

#[derive(Debug, Serialize)]
pub struct ApiMessage {
    pub message: String,
}

pub async fn healthcheck() -> Json<ApiResponse<ApiMessage>> {
    Json(ApiResponse {
        data: ApiMessage {
            message: "ok".to_string(),
        },
    })
}

/// `GET /lug/submit?name=...` from the form wizard.
pub async fn legacy_submit_query(
    State(state): State<AppState>,
    Query(fields): Query<HashMap<String, String>>,
) -> Response {
    legacy_dispatch(&state, fields).await
}

/// `POST /lug/submit` with a form-urlencoded body.
pub async fn legacy_submit_form(
    State(state): State<AppState>,
    Form(fields): Form<HashMap<String, String>>,
) -> Response {
    legacy_dispatch(&state, fields).await
}

/// `POST /api/v1/groups/dispatch` with a JSON body.
pub async fn dispatch_group(
    State(state): State<AppState>,
    Json(request): Json<DispatchRequest>,
) -> AppResult<(StatusCode, Json<ApiResponse<Outcome>>)> {
    let cancel = state.shutdown.child_token();
    let outcome = state.dispatcher.handle_cancellable(request, &cancel).await?;

    let status = match outcome {
        Outcome::Created { .. } => StatusCode::CREATED,
        Outcome::Updated { .. } | Outcome::Deleted { .. } => StatusCode::OK,
    };

    Ok((status, Json(ApiResponse { data: outcome })))
}

pub async fn get_group(
    State(state): State<AppState>,
    Path(token): Path<String>,
) -> AppResult<Json<ApiResponse<GroupRecord>>> {
    let record = state.dispatcher.lookup(&token).await?;
    Ok(Json(ApiResponse { data: record }))
}

async fn legacy_dispatch(state: &AppState, fields: HashMap<String, String>) -> Response {
    let cancel = state.shutdown.child_token();
    let result = match DispatchRequest::from_fields(&fields) {
        Ok(request) => state.dispatcher.handle_cancellable(request, &cancel).await,
        Err(err) => Err(err),
    };

    match result {
        Ok(outcome) => (
            StatusCode::OK,
            [(header::CONTENT_TYPE, "text/plain; charset=utf-8")],
            outcome.legacy_text(),
        )
            .into_response(),
        Err(err) => err.into_plaintext_response(),
    }
}
