//! # RefreshTokenRepository
//!
//! ユーザーごとに保存された OAuth2 リフレッシュトークンを参照する。
//!
//! トークンの保存・更新はログインフロー側の責務で、このリポジトリは読み取りのみ行う。

use async_trait::async_trait;
use bulkmail_domain::user::UserId;
use sqlx::PgPool;

use crate::error::InfraError;

/// リフレッシュトークンリポジトリトレイト
#[async_trait]
pub trait RefreshTokenRepository: Send + Sync {
    /// ユーザーのリフレッシュトークンを取得する
    ///
    /// - `Ok(Some(token))`: トークンが保存されている
    /// - `Ok(None)`: ユーザーが存在しない、またはトークンが未保存（空文字列を含む）
    /// - `Err(_)`: データベースエラー
    async fn find_refresh_token(&self, user_id: &UserId) -> Result<Option<String>, InfraError>;
}

/// PostgreSQL 実装の RefreshTokenRepository
#[derive(Debug, Clone)]
pub struct PostgresRefreshTokenRepository {
    pool: PgPool,
}

impl PostgresRefreshTokenRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl RefreshTokenRepository for PostgresRefreshTokenRepository {
    #[tracing::instrument(skip_all, level = "debug", fields(user_id = %user_id))]
    async fn find_refresh_token(&self, user_id: &UserId) -> Result<Option<String>, InfraError> {
        let row: Option<Option<String>> =
            sqlx::query_scalar("SELECT refresh_token FROM users WHERE id = $1")
                .bind(user_id.as_str())
                .fetch_optional(&self.pool)
                .await?;

        Ok(usable_token(row.flatten()))
    }
}

/// 空白のみのトークンは未保存として扱う
fn usable_token(token: Option<String>) -> Option<String> {
    token.filter(|token| !token.trim().is_empty())
}
