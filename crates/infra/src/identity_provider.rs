//! # OAuth2 プロバイダクライアント
//!
//! 委任モードで使用する。呼び出し元が提示したアクセストークンの検証と、
//! 保存済みリフレッシュトークンによるアクセストークンの再取得を行う。
//!
//! | 操作 | エンドポイント | 用途 |
//! |------|---------------|------|
//! | [`verify_access_token`](IdentityProviderClient::verify_access_token) | tokeninfo (GET) | トークンの有効性と正規のアドレスを確認 |
//! | [`refresh_access_token`](IdentityProviderClient::refresh_access_token) | token (POST, `refresh_token` grant) | 期限切れ間近のトークンを更新 |

use std::time::Duration;

use async_trait::async_trait;
use bulkmail_domain::user::Email;
use chrono::{DateTime, Utc};
use serde::Deserialize;
use thiserror::Error;

/// Google の tokeninfo エンドポイント
pub const GOOGLE_TOKENINFO_URL: &str = "https://oauth2.googleapis.com/tokeninfo";

/// Google の token エンドポイント
pub const GOOGLE_TOKEN_URL: &str = "https://oauth2.googleapis.com/token";

/// プロバイダへのリクエストタイムアウト
pub const PROVIDER_REQUEST_TIMEOUT: Duration = Duration::from_secs(5);

/// アクセストークンの検証結果
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TokenInfo {
    /// プロバイダが報告したアカウントのアドレス
    pub email:      Email,
    pub expires_at: Option<DateTime<Utc>>,
}

/// リフレッシュで得たアクセストークン
#[derive(Clone, PartialEq, Eq)]
pub struct RefreshedToken {
    pub access_token: String,
    pub expires_at:   Option<DateTime<Utc>>,
}

impl std::fmt::Debug for RefreshedToken {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RefreshedToken")
            .field("access_token", &"[REDACTED]")
            .field("expires_at", &self.expires_at)
            .finish()
    }
}

/// OAuth2 プロバイダとの通信エラー
#[derive(Debug, Error)]
pub enum IdentityProviderError {
    /// ネットワーク障害、タイムアウトなど
    #[error("identity provider request failed: {0}")]
    Request(#[from] reqwest::Error),

    /// 非 2xx 応答
    #[error("identity provider rejected the request with status {0}")]
    Rejected(u16),

    /// 応答の形式が想定外
    #[error("unexpected identity provider response: {0}")]
    InvalidResponse(String),
}

impl IdentityProviderError {
    /// 呼び出し元のトークンを検証できなかったことを表すか
    ///
    /// 到達不能・タイムアウト・非 2xx はトークン側の問題として扱う。
    /// 想定外の応答形式はプロバイダ側の問題なので含めない。
    pub fn is_unverifiable_token(&self) -> bool {
        matches!(self, Self::Request(_) | Self::Rejected(_))
    }
}

/// OAuth2 プロバイダクライアントトレイト
#[async_trait]
pub trait IdentityProviderClient: Send + Sync {
    /// アクセストークンを検証し、紐づくアカウントのアドレスを返す
    async fn verify_access_token(&self, access_token: &str)
    -> Result<TokenInfo, IdentityProviderError>;

    /// リフレッシュトークンで新しいアクセストークンを取得する
    async fn refresh_access_token(
        &self,
        refresh_token: &str,
    ) -> Result<RefreshedToken, IdentityProviderError>;
}

/// Google OAuth2 の接続設定
#[derive(Clone)]
pub struct GoogleOAuthConfig {
    pub client_id:     String,
    pub client_secret: String,
    pub tokeninfo_url: String,
    pub token_url:     String,
}

impl std::fmt::Debug for GoogleOAuthConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("GoogleOAuthConfig")
            .field("client_id", &self.client_id)
            .field("client_secret", &"[REDACTED]")
            .field("tokeninfo_url", &self.tokeninfo_url)
            .field("token_url", &self.token_url)
            .finish()
    }
}

/// Google OAuth2 プロバイダクライアント
pub struct GoogleIdentityProviderClient {
    http:   reqwest::Client,
    config: GoogleOAuthConfig,
}

impl GoogleIdentityProviderClient {
    /// 新しいクライアントを作成する
    ///
    /// すべてのリクエストに [`PROVIDER_REQUEST_TIMEOUT`] を適用する。
    pub fn new(config: GoogleOAuthConfig) -> Result<Self, IdentityProviderError> {
        let http = reqwest::Client::builder()
            .timeout(PROVIDER_REQUEST_TIMEOUT)
            .build()?;

        Ok(Self { http, config })
    }
}

#[async_trait]
impl IdentityProviderClient for GoogleIdentityProviderClient {
    #[tracing::instrument(skip_all, level = "debug")]
    async fn verify_access_token(
        &self,
        access_token: &str,
    ) -> Result<TokenInfo, IdentityProviderError> {
        let response = self
            .http
            .get(&self.config.tokeninfo_url)
            .query(&[("access_token", access_token)])
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            return Err(IdentityProviderError::Rejected(status.as_u16()));
        }

        let body: TokenInfoBody = response.json().await.map_err(decode_error)?;
        body.into_token_info(Utc::now())
    }

    #[tracing::instrument(skip_all, level = "debug")]
    async fn refresh_access_token(
        &self,
        refresh_token: &str,
    ) -> Result<RefreshedToken, IdentityProviderError> {
        let response = self
            .http
            .post(&self.config.token_url)
            .form(&[
                ("grant_type", "refresh_token"),
                ("refresh_token", refresh_token),
                ("client_id", self.config.client_id.as_str()),
                ("client_secret", self.config.client_secret.as_str()),
            ])
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            return Err(IdentityProviderError::Rejected(status.as_u16()));
        }

        let body: TokenGrantBody = response.json().await.map_err(decode_error)?;
        Ok(body.into_refreshed_token(Utc::now()))
    }
}

/// 2xx 応答のボディを解釈できない場合は通信失敗ではなく形式エラーとする
fn decode_error(e: reqwest::Error) -> IdentityProviderError {
    IdentityProviderError::InvalidResponse(e.to_string())
}

/// 秒数（tokeninfo は文字列、token は数値で返す）
#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum Seconds {
    Number(i64),
    Text(String),
}

impl Seconds {
    fn as_secs(&self) -> Option<i64> {
        match self {
            Self::Number(secs) => Some(*secs),
            Self::Text(text) => text.trim().parse().ok(),
        }
    }
}

fn expiry_from(now: DateTime<Utc>, expires_in: Option<&Seconds>) -> Option<DateTime<Utc>> {
    expires_in
        .and_then(Seconds::as_secs)
        .map(|secs| now + chrono::Duration::seconds(secs))
}

#[derive(Debug, Deserialize)]
struct TokenInfoBody {
    email:      Option<String>,
    expires_in: Option<Seconds>,
}

impl TokenInfoBody {
    fn into_token_info(self, now: DateTime<Utc>) -> Result<TokenInfo, IdentityProviderError> {
        let email = self
            .email
            .ok_or_else(|| IdentityProviderError::InvalidResponse("email missing".to_string()))?;
        let email = Email::new(email)
            .map_err(|e| IdentityProviderError::InvalidResponse(e.to_string()))?;

        Ok(TokenInfo {
            email,
            expires_at: expiry_from(now, self.expires_in.as_ref()),
        })
    }
}

#[derive(Debug, Deserialize)]
struct TokenGrantBody {
    access_token: String,
    expires_in:   Option<Seconds>,
}

impl TokenGrantBody {
    fn into_refreshed_token(self, now: DateTime<Utc>) -> RefreshedToken {
        RefreshedToken {
            expires_at:   expiry_from(now, self.expires_in.as_ref()),
            access_token: self.access_token,
        }
    }
}

#[cfg(test)]
mod tests {
    use chrono::TimeZone;
    use pretty_assertions::assert_eq;

    use super::*;

    fn now() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2026, 1, 1, 0, 0, 0).unwrap()
    }

    #[test]
    fn test_tokeninfoの文字列のexpires_inを解釈する() {
        let body: TokenInfoBody = serde_json::from_value(serde_json::json!({
            "azp": "client",
            "email": "owner@example.com",
            "email_verified": "true",
            "expires_in": "3599"
        }))
        .unwrap();

        let info = body.into_token_info(now()).unwrap();

        assert_eq!(info.email.as_str(), "owner@example.com");
        assert_eq!(
            info.expires_at,
            Some(now() + chrono::Duration::seconds(3599))
        );
    }

    #[test]
    fn test_tokeninfoにemailがなければinvalid_response() {
        let body: TokenInfoBody =
            serde_json::from_value(serde_json::json!({ "expires_in": 100 })).unwrap();

        let err = body.into_token_info(now()).unwrap_err();

        assert!(matches!(err, IdentityProviderError::InvalidResponse(_)));
    }

    #[test]
    fn test_通信失敗と拒否だけがトークン検証失敗に当たる() {
        assert!(IdentityProviderError::Rejected(401).is_unverifiable_token());
        assert!(
            !IdentityProviderError::InvalidResponse("email missing".to_string())
                .is_unverifiable_token()
        );
    }

    #[test]
    fn test_tokeninfoのexpires_inがなければ期限不明() {
        let body: TokenInfoBody =
            serde_json::from_value(serde_json::json!({ "email": "owner@example.com" })).unwrap();

        assert_eq!(body.into_token_info(now()).unwrap().expires_at, None);
    }

    #[test]
    fn test_token応答の数値のexpires_inを解釈する() {
        let body: TokenGrantBody = serde_json::from_value(serde_json::json!({
            "access_token": "ya29.new",
            "expires_in": 3600,
            "token_type": "Bearer"
        }))
        .unwrap();

        let token = body.into_refreshed_token(now());

        assert_eq!(token.access_token, "ya29.new");
        assert_eq!(
            token.expires_at,
            Some(now() + chrono::Duration::seconds(3600))
        );
    }

    #[test]
    fn test_refreshed_tokenのdebug出力にトークンが含まれない() {
        let token = RefreshedToken {
            access_token: "ya29.secret".to_string(),
            expires_at:   None,
        };

        assert!(!format!("{token:?}").contains("ya29.secret"));
    }
}
