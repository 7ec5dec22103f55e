//! # Mail Service アプリケーション構築
//!
//! ルーター定義とレイヤー構成を担当する。
//! 依存（リゾルバ・トランスポートファクトリ・ペーサー）の具象型の選択は
//! `main.rs` が行い、ここでは組み立て済みの State を受け取る。

use std::sync::Arc;

use axum::{
    Json,
    Router,
    extract::DefaultBodyLimit,
    http::StatusCode,
    middleware::from_fn_with_state,
    response::IntoResponse,
    routing::{get, post},
};
use bulkmail_shared::{ErrorResponse, observability::make_request_span};
use tower_http::{limit::RequestBodyLimitLayer, trace::TraceLayer};

use crate::{
    auth::{JwtVerifier, require_bearer},
    handler::{BulkMailState, health_check, send_bulk_email},
};

/// ルーターを構築する
///
/// 一斉送信エンドポイントにのみ Bearer 認証とボディ上限を適用する。
pub fn build_app(
    verifier: Arc<JwtVerifier>,
    bulk_mail_state: Arc<BulkMailState>,
    body_limit_bytes: usize,
) -> Router {
    Router::new()
        .route("/health", get(health_check))
        .merge(
            Router::new()
                .route("/api/mail/send-bulk-email", post(send_bulk_email))
                .layer(from_fn_with_state(verifier, require_bearer))
                // axum 既定の 2 MiB 上限を外し、設定値の上限に置き換える
                .layer(DefaultBodyLimit::disable())
                .layer(RequestBodyLimitLayer::new(body_limit_bytes))
                .with_state(bulk_mail_state),
        )
        .fallback(not_found)
        .layer(TraceLayer::new_for_http().make_span_with(make_request_span))
}

async fn not_found() -> impl IntoResponse {
    (
        StatusCode::NOT_FOUND,
        Json(ErrorResponse::not_found("Route not found")),
    )
}
