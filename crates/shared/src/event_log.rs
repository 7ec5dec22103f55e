//! # ビジネスイベントログとエラーコンテキストの構造化ヘルパー
//!
//! ## ビジネスイベント
//!
//! [`log_business_event!`] マクロで出力する。`event.kind = "business_event"` マーカーが
//! 自動付与され、`jq 'select(.["event.kind"] == "business_event")'` でフィルタできる。
//!
//! ## エラーコンテキスト
//!
//! `tracing::error!` / `tracing::warn!` に `error.category` + `error.kind` フィールドを
//! 直接追加する。定数は [`error`] モジュールで提供。
//!
//! ## フィールド命名規約
//!
//! ドット記法（`event.category`、`error.kind`）を使用。JSON 出力でフラットなキーになる。

/// ビジネスイベントを構造化ログとして出力する。
///
/// `event.kind = "business_event"` マーカーを自動付与し、
/// `tracing::info!` レベルで出力する。
///
/// ## 必須フィールド（慣例）
///
/// - `event.category`: イベントカテゴリ（[`event::category`] の定数を使用）
/// - `event.action`: アクション名（[`event::action`] の定数を使用）
/// - `event.result`: 結果（[`event::result`] の定数を使用）
///
/// ## 推奨フィールド
///
/// - `event.actor_id`: 送信者のユーザー ID
#[macro_export]
macro_rules! log_business_event {
    ($($args:tt)*) => {
        ::tracing::info!(
            event.kind = "business_event",
            $($args)*
        )
    };
}

/// イベントフィールドの定数
pub mod event {
    /// イベントカテゴリ
    pub mod category {
        pub const MAIL: &str = "mail";
        pub const CREDENTIAL: &str = "credential";
    }

    /// イベントアクション
    pub mod action {
        // 一斉送信
        pub const RECIPIENT_SENT: &str = "recipient.sent";
        pub const RECIPIENT_FAILED: &str = "recipient.failed";
        pub const BATCH_COMPLETED: &str = "batch.completed";

        // 認証情報
        pub const CREDENTIAL_RESOLVED: &str = "credential.resolved";
        pub const CREDENTIAL_REJECTED: &str = "credential.rejected";
        pub const ACCESS_TOKEN_REFRESHED: &str = "credential.access_token_refreshed";
    }

    /// イベント結果
    pub mod result {
        pub const SUCCESS: &str = "success";
        pub const PARTIAL: &str = "partial";
        pub const FAILURE: &str = "failure";
    }
}

/// エラーコンテキストフィールドの定数
pub mod error {
    /// エラーカテゴリ
    pub mod category {
        /// インフラストラクチャ（DB）
        pub const INFRASTRUCTURE: &str = "infrastructure";
        /// 外部サービス呼び出し（OAuth2 プロバイダ、SMTP サーバー）
        pub const EXTERNAL_SERVICE: &str = "external_service";
        /// 認証（Bearer トークン）
        pub const SECURITY: &str = "security";
    }

    /// エラー種別
    pub mod kind {
        pub const DATABASE: &str = "database";
        pub const IDENTITY_PROVIDER: &str = "identity_provider";
        pub const SMTP: &str = "smtp";
        pub const AUTHENTICATION: &str = "authentication";
    }
}
