//! # Mail Service 設定
//!
//! 環境変数から Mail Service サーバーの設定を読み込む。
//!
//! 読み込みは [`MailServiceConfig::from_lookup`] に集約しており、
//! テストでは環境変数の代わりに任意のルックアップ関数を渡せる。

use std::{env, str::FromStr, time::Duration};

use bulkmail_domain::{
    bulk_mail::{AttachmentPolicy, PacingPolicy},
    credential::StaticAccount,
    user::Email,
};
use bulkmail_infra::{
    GoogleOAuthConfig,
    SmtpTlsMode,
    SmtpTransportConfig,
    identity_provider::{GOOGLE_TOKEN_URL, GOOGLE_TOKENINFO_URL},
};
use thiserror::Error;

/// 既定のリクエストボディ上限（50 MiB）
pub const DEFAULT_BODY_LIMIT_BYTES: usize = 50 * 1024 * 1024;

/// 設定の読み込みエラー
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ConfigError {
    #[error("{0} が設定されていません")]
    Missing(&'static str),

    #[error("{name} の値が不正です: {reason}")]
    Invalid { name: &'static str, reason: String },
}

/// 認証情報の解決方式
#[derive(Debug, Clone, Copy, PartialEq, Eq, strum::EnumString, strum::Display)]
#[strum(serialize_all = "lowercase")]
pub enum CredentialMode {
    /// 固定の共有アカウントで送信する
    Static,
    /// 呼び出し元の OAuth2 アカウントで送信する
    Delegated,
}

/// 送信バックエンド
#[derive(Debug, Clone, Copy, PartialEq, Eq, strum::EnumString, strum::Display)]
#[strum(serialize_all = "lowercase")]
pub enum TransportBackend {
    Smtp,
    /// 送信せずログ出力のみ（ローカル開発用）
    Noop,
}

/// 認証情報の解決に必要な設定
#[derive(Clone)]
pub enum CredentialConfig {
    Static(StaticAccount),
    Delegated {
        database_url: String,
        google:       GoogleOAuthConfig,
    },
}

impl std::fmt::Debug for CredentialConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Static(account) => f.debug_tuple("Static").field(account).finish(),
            // 接続文字列にはパスワードが含まれうる
            Self::Delegated { google, .. } => f
                .debug_struct("Delegated")
                .field("database_url", &"[REDACTED]")
                .field("google", google)
                .finish(),
        }
    }
}

impl CredentialConfig {
    pub fn mode(&self) -> CredentialMode {
        match self {
            Self::Static(_) => CredentialMode::Static,
            Self::Delegated { .. } => CredentialMode::Delegated,
        }
    }
}

/// Mail Service サーバーの設定
#[derive(Clone)]
pub struct MailServiceConfig {
    /// バインドアドレス
    pub host: String,
    /// ポート番号
    pub port: u16,
    /// Bearer トークン検証用の HS256 シークレット
    pub jwt_secret: String,
    pub credential: CredentialConfig,
    pub transport: TransportBackend,
    pub smtp: SmtpTransportConfig,
    pub pacing: PacingPolicy,
    pub attachment_policy: AttachmentPolicy,
    /// 一斉送信エンドポイントのリクエストボディ上限
    pub body_limit_bytes: usize,
}

impl std::fmt::Debug for MailServiceConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MailServiceConfig")
            .field("host", &self.host)
            .field("port", &self.port)
            .field("jwt_secret", &"[REDACTED]")
            .field("credential", &self.credential)
            .field("transport", &self.transport)
            .field("smtp", &self.smtp)
            .field("pacing", &self.pacing)
            .field("attachment_policy", &self.attachment_policy)
            .field("body_limit_bytes", &self.body_limit_bytes)
            .finish()
    }
}

impl MailServiceConfig {
    /// 環境変数から設定を読み込む
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|name| env::var(name).ok())
    }

    /// 任意のルックアップ関数から設定を読み込む
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, ConfigError> {
        let vars = Vars(&lookup);

        let mode: CredentialMode = vars.parse_or("MAIL_CREDENTIAL_MODE", CredentialMode::Static)?;
        let credential = match mode {
            CredentialMode::Static => {
                let address = vars.required("ADMIN_EMAIL")?;
                let address = Email::new(address).map_err(|e| ConfigError::Invalid {
                    name:   "ADMIN_EMAIL",
                    reason: e.to_string(),
                })?;
                CredentialConfig::Static(StaticAccount {
                    address,
                    password: vars.required("ADMIN_EMAIL_PASSWORD")?,
                })
            }
            CredentialMode::Delegated => CredentialConfig::Delegated {
                database_url: vars.required("DATABASE_URL")?,
                google:       GoogleOAuthConfig {
                    client_id:     vars.required("GOOGLE_CLIENT_ID")?,
                    client_secret: vars.required("GOOGLE_CLIENT_SECRET")?,
                    tokeninfo_url: vars.or("OAUTH_TOKENINFO_URL", GOOGLE_TOKENINFO_URL),
                    token_url:     vars.or("OAUTH_TOKEN_URL", GOOGLE_TOKEN_URL),
                },
            },
        };

        let tls = vars.or("SMTP_TLS", "starttls");
        let tls = SmtpTlsMode::parse(&tls).ok_or_else(|| ConfigError::Invalid {
            name:   "SMTP_TLS",
            reason: format!("{tls} (tls / starttls / none のいずれか)"),
        })?;

        let pacing = PacingPolicy::new(
            vars.parse_or("MAIL_PACING_BATCH_SIZE", 10)?,
            Duration::from_millis(vars.parse_or("MAIL_PACING_INTERVAL_MS", 1000)?),
        );

        let defaults = AttachmentPolicy::default();
        let attachment_policy = AttachmentPolicy {
            max_file_bytes:        vars
                .parse_or("MAIL_ATTACHMENT_MAX_BYTES", defaults.max_file_bytes)?,
            max_files:             vars.parse_or("MAIL_ATTACHMENT_MAX_FILES", defaults.max_files)?,
            allowed_content_types: match lookup("MAIL_ATTACHMENT_ALLOWED_TYPES") {
                Some(list) => parse_content_types(&list)?,
                None => defaults.allowed_content_types,
            },
        };

        Ok(Self {
            host: vars.or("MAIL_SERVICE_HOST", "0.0.0.0"),
            port: vars.required_parse("MAIL_SERVICE_PORT")?,
            jwt_secret: vars.required("JWT_SECRET")?,
            credential,
            transport: vars.parse_or("MAIL_TRANSPORT", TransportBackend::Smtp)?,
            smtp: SmtpTransportConfig {
                host: vars.or("SMTP_HOST", "smtp.gmail.com"),
                port: vars.parse_or("SMTP_PORT", 587)?,
                tls,
            },
            pacing,
            attachment_policy,
            body_limit_bytes: vars
                .parse_or("MAIL_REQUEST_BODY_LIMIT_BYTES", DEFAULT_BODY_LIMIT_BYTES)?,
        })
    }
}

/// 空文字列を未設定として扱うルックアップのラッパー
struct Vars<'a, F: Fn(&str) -> Option<String>>(&'a F);

impl<F: Fn(&str) -> Option<String>> Vars<'_, F> {
    fn get(&self, name: &str) -> Option<String> {
        (self.0)(name).filter(|value| !value.trim().is_empty())
    }

    fn or(&self, name: &str, default: &str) -> String {
        self.get(name).unwrap_or_else(|| default.to_string())
    }

    fn required(&self, name: &'static str) -> Result<String, ConfigError> {
        self.get(name).ok_or(ConfigError::Missing(name))
    }

    fn required_parse<T>(&self, name: &'static str) -> Result<T, ConfigError>
    where
        T: FromStr,
        T::Err: std::fmt::Display,
    {
        parse_value(name, &self.required(name)?)
    }

    fn parse_or<T>(&self, name: &'static str, default: T) -> Result<T, ConfigError>
    where
        T: FromStr,
        T::Err: std::fmt::Display,
    {
        match self.get(name) {
            Some(value) => parse_value(name, &value),
            None => Ok(default),
        }
    }
}

fn parse_value<T>(name: &'static str, value: &str) -> Result<T, ConfigError>
where
    T: FromStr,
    T::Err: std::fmt::Display,
{
    value
        .trim()
        .parse()
        .map_err(|e: T::Err| ConfigError::Invalid {
            name,
            reason: format!("{value} ({e})"),
        })
}

/// カンマ区切りの許可タイプを MIME タイプの一覧にする
///
/// `image/png` のような MIME タイプと、`png` のような拡張子名の両方を受け付ける。
/// 空文字列はすべて許可（空の一覧）を意味する。
fn parse_content_types(list: &str) -> Result<Vec<String>, ConfigError> {
    list.split(',')
        .map(str::trim)
        .filter(|entry| !entry.is_empty())
        .map(|entry| {
            if entry.contains('/') {
                return Ok(entry.to_ascii_lowercase());
            }
            let mime = match entry.to_ascii_lowercase().as_str() {
                "jpg" | "jpeg" => "image/jpeg",
                "png" => "image/png",
                "gif" => "image/gif",
                "pdf" => "application/pdf",
                "doc" => "application/msword",
                "docx" => "application/vnd.openxmlformats-officedocument.wordprocessingml.document",
                _ => {
                    return Err(ConfigError::Invalid {
                        name:   "MAIL_ATTACHMENT_ALLOWED_TYPES",
                        reason: format!("未知の拡張子 {entry}"),
                    });
                }
            };
            Ok(mime.to_string())
        })
        .collect()
}
