//! # ドメイン層エラー定義
//!
//! 値オブジェクトの生成時など、特定のユースケースに属さないルール違反を表現する。
//! 送信リクエスト固有の入力エラーは [`crate::bulk_mail::ValidationError`]、
//! 認証情報の解決失敗は [`crate::credential::CredentialError`] で表現する。

use thiserror::Error;

/// ドメイン層で発生するエラー
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum DomainError {
    /// バリデーションエラー
    ///
    /// 値オブジェクトの形式が不正な場合に使用する。
    #[error("バリデーションエラー: {0}")]
    Validation(String),
}
