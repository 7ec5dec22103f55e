//! # Mail Service エラー定義
//!
//! 一斉送信で発生する致命的なエラーと、HTTP レスポンスへの変換を定義する。
//!
//! 宛先ごとの送信失敗はここには現れない。それらは `DispatchResult` の
//! `errors` に集約され、レスポンスポリシー（[`BulkMailResponse::from_result`]）が扱う。

use axum::{
    Json,
    extract::multipart::{MultipartError, MultipartRejection},
    http::StatusCode,
    response::{IntoResponse, Response},
};
use bulkmail_domain::{
    bulk_mail::{BatchClassification, DispatchResult, ValidationError},
    credential::CredentialError,
};
use bulkmail_infra::{IdentityProviderError, InfraError, TransportError};
use bulkmail_shared::event_log::error::{category, kind};
use serde::Serialize;
use thiserror::Error;

/// 一斉送信 API のレスポンスボディ
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct BulkMailResponse {
    pub success: bool,
    pub message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub results: Option<DispatchResult>,
}

impl BulkMailResponse {
    /// 送信結果の分類から HTTP ステータスとボディを決める
    ///
    /// | 分類 | ステータス | `success` |
    /// |------|-----------|-----------|
    /// | 全件成功 | 200 | `true` |
    /// | 一部失敗 | 206 | `true` |
    /// | 全件失敗 | 500 | `false` |
    pub fn from_result(result: DispatchResult) -> (StatusCode, Self) {
        let (status, success, message) = match result.classification() {
            BatchClassification::AllSucceeded => (
                StatusCode::OK,
                true,
                format!("Successfully sent {} emails", result.sent),
            ),
            BatchClassification::PartialFailure => (
                StatusCode::PARTIAL_CONTENT,
                true,
                format!("Sent {} emails, failed {}", result.sent, result.failed),
            ),
            BatchClassification::AllFailed => (
                StatusCode::INTERNAL_SERVER_ERROR,
                false,
                "Failed to send all emails".to_string(),
            ),
        };

        (
            status,
            Self {
                success,
                message,
                results: Some(result),
            },
        )
    }

    fn failure(message: String) -> Self {
        Self {
            success: false,
            message,
            results: None,
        }
    }
}

impl IntoResponse for BulkMailResponse {
    fn into_response(self) -> Response {
        Json(self).into_response()
    }
}

/// 送信開始前に発生する致命的なエラー
#[derive(Debug, Error)]
pub enum MailServiceError {
    /// 入力が不正
    #[error(transparent)]
    Validation(#[from] ValidationError),

    /// multipart ボディを読み取れない
    #[error("unreadable form data: {0}")]
    MalformedForm(String),

    /// 送信に使う認証情報を解決できない
    #[error(transparent)]
    Credential(#[from] CredentialError),

    /// ID ストアの参照に失敗した
    #[error("identity store lookup failed: {0}")]
    IdentityStore(#[from] InfraError),

    /// プロバイダの応答を解釈できない
    #[error(transparent)]
    IdentityProvider(IdentityProviderError),

    /// トランスポートを組み立てられない
    #[error(transparent)]
    Transport(#[from] TransportError),
}

impl From<MultipartError> for MailServiceError {
    fn from(e: MultipartError) -> Self {
        Self::MalformedForm(e.body_text())
    }
}

impl From<MultipartRejection> for MailServiceError {
    fn from(e: MultipartRejection) -> Self {
        Self::MalformedForm(e.body_text())
    }
}

impl MailServiceError {
    pub fn status(&self) -> StatusCode {
        match self {
            Self::Validation(_) | Self::MalformedForm(_) => StatusCode::BAD_REQUEST,
            Self::Credential(_)
            | Self::IdentityStore(_)
            | Self::IdentityProvider(_)
            | Self::Transport(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl IntoResponse for MailServiceError {
    fn into_response(self) -> Response {
        match &self {
            Self::IdentityStore(e) => {
                tracing::error!(
                    error.category = category::INFRASTRUCTURE,
                    error.kind = kind::DATABASE,
                    span_trace = %e.span_trace(),
                    "リフレッシュトークンの参照に失敗: {e}"
                );
            }
            Self::IdentityProvider(e) => {
                tracing::error!(
                    error.category = category::EXTERNAL_SERVICE,
                    error.kind = kind::IDENTITY_PROVIDER,
                    "プロバイダの応答を解釈できません: {e}"
                );
            }
            Self::Transport(e) => {
                tracing::error!(
                    error.category = category::EXTERNAL_SERVICE,
                    error.kind = kind::SMTP,
                    "トランスポートの組み立てに失敗: {e}"
                );
            }
            Self::Credential(e) => {
                tracing::warn!(
                    error.category = category::EXTERNAL_SERVICE,
                    error.kind = kind::IDENTITY_PROVIDER,
                    "認証情報を解決できません: {e}"
                );
            }
            Self::Validation(_) | Self::MalformedForm(_) => {}
        }

        (self.status(), BulkMailResponse::failure(self.to_string())).into_response()
    }
}
