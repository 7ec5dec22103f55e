//! # 認証情報の解決
//!
//! 送信に使うアカウントの認証情報を決める。
//!
//! | 方式 | 実装 | 送信元 |
//! |------|------|--------|
//! | 静的 | [`StaticCredentialResolver`] | 設定された共有アカウント |
//! | 委任 | [`DelegatedCredentialResolver`] | 呼び出し元本人の OAuth2 アカウント |

use std::sync::Arc;

use async_trait::async_trait;
use bulkmail_domain::credential::{
    CredentialError,
    DelegatedOAuth2Account,
    MailCredential,
    StaticAccount,
};
use bulkmail_infra::{IdentityProviderClient, RefreshTokenRepository};
use bulkmail_shared::{
    event_log::{
        error::{category, kind},
        event,
    },
    log_business_event,
};

use crate::{auth::AuthenticatedCaller, error::MailServiceError};

/// 認証情報リゾルバトレイト
#[async_trait]
pub trait CredentialResolver: Send + Sync {
    async fn resolve(&self, caller: &AuthenticatedCaller)
    -> Result<MailCredential, MailServiceError>;
}

/// 共有アカウントの認証情報を返すリゾルバ
///
/// 起動時に読み込んだアカウントを読み取り専用で共有する。
pub struct StaticCredentialResolver {
    account: Arc<StaticAccount>,
}

impl StaticCredentialResolver {
    pub fn new(account: StaticAccount) -> Self {
        Self {
            account: Arc::new(account),
        }
    }
}

#[async_trait]
impl CredentialResolver for StaticCredentialResolver {
    async fn resolve(
        &self,
        _caller: &AuthenticatedCaller,
    ) -> Result<MailCredential, MailServiceError> {
        Ok(MailCredential::StaticAccount(self.account.as_ref().clone()))
    }
}

/// 呼び出し元の OAuth2 アカウントで送信するリゾルバ
///
/// 1. 呼び出し元のアクセストークンがなければ [`CredentialError::AccessTokenMissing`]
/// 2. ID ストアに有効なリフレッシュトークンがなければ [`CredentialError::RefreshTokenUnavailable`]
/// 3. プロバイダがアクセストークンを検証できなければ [`CredentialError::InvalidAccessToken`]
///
/// プロバイダの応答形式が想定外の場合は [`MailServiceError::IdentityProvider`] を返す。
///
/// 送信元アドレスはトークンのクレームではなく、プロバイダが報告したアドレスを使う。
pub struct DelegatedCredentialResolver {
    refresh_tokens:    Arc<dyn RefreshTokenRepository>,
    identity_provider: Arc<dyn IdentityProviderClient>,
}

impl DelegatedCredentialResolver {
    pub fn new(
        refresh_tokens: Arc<dyn RefreshTokenRepository>,
        identity_provider: Arc<dyn IdentityProviderClient>,
    ) -> Self {
        Self {
            refresh_tokens,
            identity_provider,
        }
    }

    async fn try_resolve(
        &self,
        caller: &AuthenticatedCaller,
    ) -> Result<DelegatedOAuth2Account, MailServiceError> {
        let access_token = caller
            .oauth_access_token
            .as_deref()
            .ok_or(CredentialError::AccessTokenMissing)?;

        let refresh_token = self
            .refresh_tokens
            .find_refresh_token(&caller.identity.user_id)
            .await?
            .ok_or(CredentialError::RefreshTokenUnavailable)?;

        let info = self
            .identity_provider
            .verify_access_token(access_token)
            .await
            .map_err(|e| {
                if !e.is_unverifiable_token() {
                    return MailServiceError::IdentityProvider(e);
                }
                tracing::warn!(
                    error.category = category::EXTERNAL_SERVICE,
                    error.kind = kind::IDENTITY_PROVIDER,
                    "アクセストークンの検証に失敗: {e}"
                );
                CredentialError::InvalidAccessToken.into()
            })?;

        Ok(DelegatedOAuth2Account {
            address: info.email,
            access_token: access_token.to_string(),
            refresh_token,
            expires_at: info.expires_at,
        })
    }
}

#[async_trait]
impl CredentialResolver for DelegatedCredentialResolver {
    async fn resolve(
        &self,
        caller: &AuthenticatedCaller,
    ) -> Result<MailCredential, MailServiceError> {
        match self.try_resolve(caller).await {
            Ok(account) => {
                log_business_event!(
                    event.category = event::category::CREDENTIAL,
                    event.action = event::action::CREDENTIAL_RESOLVED,
                    event.result = event::result::SUCCESS,
                    event.actor_id = %caller.identity.user_id,
                    sender = %account.address,
                    "委任アカウントの認証情報を解決"
                );
                Ok(MailCredential::DelegatedOAuth2(account))
            }
            Err(e) => {
                if matches!(e, MailServiceError::Credential(_)) {
                    log_business_event!(
                        event.category = event::category::CREDENTIAL,
                        event.action = event::action::CREDENTIAL_REJECTED,
                        event.result = event::result::FAILURE,
                        event.actor_id = %caller.identity.user_id,
                        reason = %e,
                        "委任アカウントの認証情報を解決できません"
                    );
                }
                Err(e)
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use bulkmail_domain::user::{CallerIdentity, Email, UserId};
    use bulkmail_infra::{
        IdentityProviderError,
        mock::{MockIdentityProviderClient, MockRefreshTokenRepository},
    };
    use chrono::{TimeZone, Utc};
    use pretty_assertions::assert_eq;

    use super::*;

    fn caller(access_token: Option<&str>) -> AuthenticatedCaller {
        AuthenticatedCaller {
            identity:           CallerIdentity::new(
                UserId::new("user-1"),
                Some(Email::new("claimed@example.com").unwrap()),
                Some("Alice".to_string()),
            ),
            oauth_access_token: access_token.map(str::to_string),
        }
    }

    fn resolver(
        repo: &MockRefreshTokenRepository,
        provider: &MockIdentityProviderClient,
    ) -> DelegatedCredentialResolver {
        DelegatedCredentialResolver::new(Arc::new(repo.clone()), Arc::new(provider.clone()))
    }

    #[tokio::test]
    async fn test_静的リゾルバは共有アカウントを返す() {
        let account = StaticAccount {
            address:  Email::new("admin@example.com").unwrap(),
            password: "app-password".to_string(),
        };
        let sut = StaticCredentialResolver::new(account.clone());

        let credential = sut.resolve(&caller(None)).await.unwrap();

        assert_eq!(credential, MailCredential::StaticAccount(account));
    }

    #[tokio::test]
    async fn test_委任リゾルバはプロバイダのアドレスを送信元にする() {
        let expires_at = Utc.with_ymd_and_hms(2026, 1, 1, 1, 0, 0).unwrap();
        let repo = MockRefreshTokenRepository::new().with_token(&UserId::new("user-1"), "1//refresh");
        let provider = MockIdentityProviderClient::new().with_account(
            "ya29.caller",
            "owner@example.com",
            Some(expires_at),
        );

        let credential = resolver(&repo, &provider)
            .resolve(&caller(Some("ya29.caller")))
            .await
            .unwrap();

        let MailCredential::DelegatedOAuth2(account) = credential else {
            panic!("DelegatedOAuth2 を期待した");
        };
        assert_eq!(account.address.as_str(), "owner@example.com");
        assert_eq!(account.access_token, "ya29.caller");
        assert_eq!(account.refresh_token, "1//refresh");
        assert_eq!(account.expires_at, Some(expires_at));
    }

    #[tokio::test]
    async fn test_アクセストークンがなければaccess_token_missing() {
        let repo = MockRefreshTokenRepository::new().with_token(&UserId::new("user-1"), "1//refresh");
        let provider = MockIdentityProviderClient::new();

        let err = resolver(&repo, &provider)
            .resolve(&caller(None))
            .await
            .unwrap_err();

        assert!(matches!(
            err,
            MailServiceError::Credential(CredentialError::AccessTokenMissing)
        ));
        assert_eq!(repo.lookups(), 0);
        assert_eq!(provider.verify_calls(), 0);
    }

    #[tokio::test]
    async fn test_リフレッシュトークンがなければrefresh_token_unavailable() {
        let repo = MockRefreshTokenRepository::new();
        let provider =
            MockIdentityProviderClient::new().with_account("ya29.caller", "owner@example.com", None);

        let err = resolver(&repo, &provider)
            .resolve(&caller(Some("ya29.caller")))
            .await
            .unwrap_err();

        assert!(matches!(
            err,
            MailServiceError::Credential(CredentialError::RefreshTokenUnavailable)
        ));
        assert_eq!(provider.verify_calls(), 0);
    }

    #[tokio::test]
    async fn test_検証できないアクセストークンはinvalid_access_token() {
        let repo = MockRefreshTokenRepository::new().with_token(&UserId::new("user-1"), "1//refresh");
        let provider = MockIdentityProviderClient::new();

        let err = resolver(&repo, &provider)
            .resolve(&caller(Some("ya29.forged")))
            .await
            .unwrap_err();

        assert!(matches!(
            err,
            MailServiceError::Credential(CredentialError::InvalidAccessToken)
        ));
        assert_eq!(provider.verify_calls(), 1);
    }

    #[tokio::test]
    async fn test_プロバイダの想定外の応答はinvalid_access_tokenにしない() {
        let repo = MockRefreshTokenRepository::new().with_token(&UserId::new("user-1"), "1//refresh");
        let provider = MockIdentityProviderClient::new().with_malformed_response("email missing");

        let err = resolver(&repo, &provider)
            .resolve(&caller(Some("ya29.caller")))
            .await
            .unwrap_err();

        assert!(matches!(
            err,
            MailServiceError::IdentityProvider(IdentityProviderError::InvalidResponse(_))
        ));
        assert_eq!(
            err.to_string(),
            "unexpected identity provider response: email missing"
        );
        assert_eq!(err.status(), axum::http::StatusCode::INTERNAL_SERVER_ERROR);
    }

    #[tokio::test]
    async fn test_id_ストアの障害はidentity_storeエラー() {
        let repo = MockRefreshTokenRepository::failing();
        let provider = MockIdentityProviderClient::new();

        let err = resolver(&repo, &provider)
            .resolve(&caller(Some("ya29.caller")))
            .await
            .unwrap_err();

        assert!(matches!(err, MailServiceError::IdentityStore(_)));
    }
}
