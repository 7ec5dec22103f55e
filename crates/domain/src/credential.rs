//! # メール送信用の認証情報
//!
//! 送信トランスポートがそのまま使える形に解決済みの認証情報を表現する。
//!
//! | バリアント | 用途 | ライフタイム |
//! |-----------|------|-------------|
//! | [`MailCredential::StaticAccount`] | プロセス全体で共有する固定アカウント | 起動時に一度だけ生成 |
//! | [`MailCredential::DelegatedOAuth2`] | 呼び出し元の OAuth2 委任アカウント | リクエストごとに生成、キャッシュしない |

use std::fmt;

use chrono::{DateTime, Duration, Utc};
use thiserror::Error;

use crate::user::Email;

/// アクセストークンを期限切れとみなす余裕時間（秒）
///
/// 送信中に失効しないよう、期限の少し前からリフレッシュ対象にする。
pub const TOKEN_EXPIRY_MARGIN_SECS: i64 = 60;

/// 固定アカウント
///
/// 全リクエストで共有される読み取り専用の認証情報。
#[derive(Clone, PartialEq, Eq)]
pub struct StaticAccount {
    pub address:  Email,
    pub password: String,
}

impl fmt::Debug for StaticAccount {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("StaticAccount")
            .field("address", &self.address)
            .field("password", &"[REDACTED]")
            .finish()
    }
}

/// OAuth2 委任アカウント
///
/// `address` は呼び出し元の申告値ではなく、プロバイダが返した正規のアドレス。
#[derive(Clone, PartialEq, Eq)]
pub struct DelegatedOAuth2Account {
    pub address:       Email,
    pub access_token:  String,
    pub refresh_token: String,
    /// プロバイダが報告した有効期限。不明な場合は `None`
    pub expires_at:    Option<DateTime<Utc>>,
}

impl DelegatedOAuth2Account {
    /// アクセストークンのリフレッシュが必要か判定する
    ///
    /// 有効期限が不明な場合はリフレッシュしない（プロバイダの検証を通過した直後のため）。
    pub fn needs_refresh(&self, now: DateTime<Utc>) -> bool {
        match self.expires_at {
            Some(expires_at) => now + Duration::seconds(TOKEN_EXPIRY_MARGIN_SECS) >= expires_at,
            None => false,
        }
    }

    /// リフレッシュ後のアクセストークンで置き換える
    pub fn renew(&mut self, access_token: String, expires_at: Option<DateTime<Utc>>) {
        self.access_token = access_token;
        self.expires_at = expires_at;
    }
}

impl fmt::Debug for DelegatedOAuth2Account {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("DelegatedOAuth2Account")
            .field("address", &self.address)
            .field("access_token", &"[REDACTED]")
            .field("refresh_token", &"[REDACTED]")
            .field("expires_at", &self.expires_at)
            .finish()
    }
}

/// 解決済みのメール送信用認証情報
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MailCredential {
    StaticAccount(StaticAccount),
    DelegatedOAuth2(DelegatedOAuth2Account),
}

impl MailCredential {
    /// 送信元（From）に使うアカウントのアドレス
    pub fn sender_address(&self) -> &Email {
        match self {
            Self::StaticAccount(account) => &account.address,
            Self::DelegatedOAuth2(account) => &account.address,
        }
    }
}

/// 認証情報の解決エラー
///
/// いずれも致命的で、送信は一件も試行されない。
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum CredentialError {
    /// 呼び出し元がアクセストークンを提示していない
    #[error("access token required")]
    AccessTokenMissing,

    /// ID ストアにリフレッシュトークンが保存されていない
    #[error("refresh token unavailable")]
    RefreshTokenUnavailable,

    /// プロバイダでアクセストークンを検証できなかった（ネットワーク障害・非 2xx 含む）
    #[error("invalid or unverifiable access token")]
    InvalidAccessToken,
}
