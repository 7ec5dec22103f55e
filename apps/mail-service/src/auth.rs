//! # Bearer 認証ミドルウェア
//!
//! `Authorization: Bearer <jwt>`（HS256）を検証し、呼び出し元の情報を
//! [`AuthenticatedCaller`] としてリクエストの Extension に格納する。
//!
//! 委任モードでは、呼び出し元の OAuth2 アクセストークンを
//! `X-OAuth-Access-Token` ヘッダーから併せて読み取る。
//!
//! ## 使い方
//!
//! ```rust,ignore
//! use axum::middleware::from_fn_with_state;
//!
//! Router::new()
//!     .route("/api/mail/send-bulk-email", post(send_bulk_email))
//!     .layer(from_fn_with_state(verifier, require_bearer))
//! ```

use std::sync::Arc;

use axum::{
    Json,
    body::Body,
    extract::State,
    http::{HeaderMap, Request, StatusCode, header::AUTHORIZATION},
    middleware::Next,
    response::{IntoResponse, Response},
};
use bulkmail_domain::user::{CallerIdentity, Email, UserId};
use bulkmail_shared::{
    ErrorResponse,
    event_log::error::{category, kind},
};
use jsonwebtoken::{Algorithm, DecodingKey, Validation};
use serde::Deserialize;

/// 呼び出し元の OAuth2 アクセストークンを運ぶヘッダー
pub const OAUTH_ACCESS_TOKEN_HEADER: &str = "x-oauth-access-token";

/// Bearer トークンのクレーム
///
/// ユーザー ID は `id` を優先し、なければ `sub` を使う。
#[derive(Debug, Clone, Deserialize)]
pub struct Claims {
    pub id:    Option<String>,
    pub sub:   Option<String>,
    pub email: Option<String>,
    pub name:  Option<String>,
    pub exp:   i64,
}

/// 認証済みの呼び出し元
#[derive(Debug, Clone)]
pub struct AuthenticatedCaller {
    pub identity:           CallerIdentity,
    /// 委任モードで使う OAuth2 アクセストークン（`X-OAuth-Access-Token`）
    pub oauth_access_token: Option<String>,
}

/// Bearer トークンの検証に失敗した理由
#[derive(Debug, thiserror::Error)]
pub enum AuthError {
    #[error("Authorization ヘッダーがありません")]
    MissingHeader,

    #[error("Bearer スキームではありません")]
    NotBearer,

    #[error("トークンが不正です: {0}")]
    InvalidToken(#[from] jsonwebtoken::errors::Error),

    #[error("ユーザー ID のクレームがありません")]
    MissingUserId,
}

/// HS256 の Bearer トークン検証器
pub struct JwtVerifier {
    key:        DecodingKey,
    validation: Validation,
}

impl JwtVerifier {
    pub fn new(secret: &str) -> Self {
        Self {
            key:        DecodingKey::from_secret(secret.as_bytes()),
            validation: Validation::new(Algorithm::HS256),
        }
    }

    /// トークンを検証し、呼び出し元の識別情報を返す
    pub fn verify(&self, token: &str) -> Result<CallerIdentity, AuthError> {
        let claims = jsonwebtoken::decode::<Claims>(token, &self.key, &self.validation)?.claims;

        let user_id = claims
            .id
            .or(claims.sub)
            .filter(|id| !id.trim().is_empty())
            .ok_or(AuthError::MissingUserId)?;

        // 不正なメールアドレスは返信先に使えないため、未指定として扱う
        let email = claims.email.and_then(|email| Email::new(email).ok());

        Ok(CallerIdentity::new(UserId::new(user_id), email, claims.name))
    }

    /// リクエストヘッダーから呼び出し元を認証する
    pub fn authenticate(&self, headers: &HeaderMap) -> Result<AuthenticatedCaller, AuthError> {
        let value = headers
            .get(AUTHORIZATION)
            .and_then(|v| v.to_str().ok())
            .ok_or(AuthError::MissingHeader)?;

        let token = value
            .strip_prefix("Bearer ")
            .map(str::trim)
            .filter(|t| !t.is_empty())
            .ok_or(AuthError::NotBearer)?;

        let identity = self.verify(token)?;

        let oauth_access_token = headers
            .get(OAUTH_ACCESS_TOKEN_HEADER)
            .and_then(|v| v.to_str().ok())
            .map(str::trim)
            .filter(|t| !t.is_empty())
            .map(str::to_string);

        Ok(AuthenticatedCaller {
            identity,
            oauth_access_token,
        })
    }
}

/// Bearer 認証ミドルウェア
///
/// 認証に失敗した場合は 401 Unauthorized（RFC 9457）を返す。
pub async fn require_bearer(
    State(verifier): State<Arc<JwtVerifier>>,
    mut request: Request<Body>,
    next: Next,
) -> Response {
    match verifier.authenticate(request.headers()) {
        Ok(caller) => {
            request.extensions_mut().insert(caller);
            next.run(request).await
        }
        Err(e) => {
            tracing::debug!(
                error.category = category::SECURITY,
                error.kind = kind::AUTHENTICATION,
                "Bearer 認証に失敗: {e}"
            );
            (
                StatusCode::UNAUTHORIZED,
                Json(ErrorResponse::unauthorized("Authentication invalid")),
            )
                .into_response()
        }
    }
}

#[cfg(test)]
mod tests {
    use axum::http::HeaderValue;
    use jsonwebtoken::{EncodingKey, Header};
    use pretty_assertions::assert_eq;
    use serde_json::json;

    use super::*;

    const SECRET: &str = "test-secret";

    fn token(claims: serde_json::Value) -> String {
        jsonwebtoken::encode(
            &Header::default(),
            &claims,
            &EncodingKey::from_secret(SECRET.as_bytes()),
        )
        .unwrap()
    }

    fn future_exp() -> i64 {
        chrono::Utc::now().timestamp() + 3600
    }

    fn headers(authorization: &str) -> HeaderMap {
        let mut headers = HeaderMap::new();
        headers.insert(AUTHORIZATION, HeaderValue::from_str(authorization).unwrap());
        headers
    }

    #[test]
    fn test_有効なトークンから呼び出し元を取り出す() {
        let verifier = JwtVerifier::new(SECRET);
        let jwt = token(json!({
            "id": "user-1",
            "email": "alice@example.com",
            "name": "Alice",
            "exp": future_exp()
        }));

        let identity = verifier.verify(&jwt).unwrap();

        assert_eq!(identity.user_id.as_str(), "user-1");
        assert_eq!(identity.email.unwrap().as_str(), "alice@example.com");
        assert_eq!(identity.name.as_deref(), Some("Alice"));
    }

    #[test]
    fn test_idがなければsubを使う() {
        let verifier = JwtVerifier::new(SECRET);
        let jwt = token(json!({ "sub": "user-2", "exp": future_exp() }));

        let identity = verifier.verify(&jwt).unwrap();

        assert_eq!(identity.user_id.as_str(), "user-2");
        assert_eq!(identity.email, None);
    }

    #[test]
    fn test_ユーザーidがなければ拒否する() {
        let verifier = JwtVerifier::new(SECRET);
        let jwt = token(json!({ "email": "alice@example.com", "exp": future_exp() }));

        assert!(matches!(
            verifier.verify(&jwt),
            Err(AuthError::MissingUserId)
        ));
    }

    #[test]
    fn test_不正なメールアドレスは未指定として扱う() {
        let verifier = JwtVerifier::new(SECRET);
        let jwt = token(json!({ "id": "user-1", "email": "nope", "exp": future_exp() }));

        assert_eq!(verifier.verify(&jwt).unwrap().email, None);
    }

    #[test]
    fn test_期限切れのトークンは拒否する() {
        let verifier = JwtVerifier::new(SECRET);
        let jwt = token(json!({
            "id": "user-1",
            "exp": chrono::Utc::now().timestamp() - 3600
        }));

        assert!(matches!(
            verifier.verify(&jwt),
            Err(AuthError::InvalidToken(_))
        ));
    }

    #[test]
    fn test_別のシークレットで署名されたトークンは拒否する() {
        let verifier = JwtVerifier::new("another-secret");
        let jwt = token(json!({ "id": "user-1", "exp": future_exp() }));

        assert!(matches!(
            verifier.verify(&jwt),
            Err(AuthError::InvalidToken(_))
        ));
    }

    #[test]
    fn test_ヘッダーがなければmissing_header() {
        let verifier = JwtVerifier::new(SECRET);

        assert!(matches!(
            verifier.authenticate(&HeaderMap::new()),
            Err(AuthError::MissingHeader)
        ));
    }

    #[test]
    fn test_bearer以外のスキームは拒否する() {
        let verifier = JwtVerifier::new(SECRET);

        assert!(matches!(
            verifier.authenticate(&headers("Basic dXNlcjpwYXNz")),
            Err(AuthError::NotBearer)
        ));
    }

    #[test]
    fn test_アクセストークンヘッダーを読み取る() {
        let verifier = JwtVerifier::new(SECRET);
        let jwt = token(json!({ "id": "user-1", "exp": future_exp() }));
        let mut headers = headers(&format!("Bearer {jwt}"));
        headers.insert(
            OAUTH_ACCESS_TOKEN_HEADER,
            HeaderValue::from_static("ya29.caller"),
        );

        let caller = verifier.authenticate(&headers).unwrap();

        assert_eq!(caller.oauth_access_token.as_deref(), Some("ya29.caller"));
    }
}
