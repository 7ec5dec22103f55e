//! SMTP 送信実装
//!
//! lettre の `AsyncSmtpTransport` を使用してメールを送信する。
//!
//! | 認証情報 | SMTP 認証 |
//! |---------|-----------|
//! | 固定アカウント | PLAIN / LOGIN（アプリパスワード） |
//! | OAuth2 委任アカウント | XOAUTH2（アクセストークン） |
//!
//! 委任アカウントのアクセストークンが期限切れ間近の場合、送信前に
//! リフレッシュしてトランスポートを組み直す。リフレッシュ後のトークンは
//! このトランスポート（= 1 リクエスト）の中だけで使われる。

use std::sync::Arc;

use async_trait::async_trait;
use bulkmail_domain::{
    bulk_mail::{Attachment, OutgoingMail},
    credential::MailCredential,
};
use bulkmail_shared::{event_log::event, log_business_event};
use chrono::Utc;
use lettre::{
    Address,
    AsyncSmtpTransport,
    AsyncTransport,
    Message,
    Tokio1Executor,
    message::{Mailbox, MultiPart, SinglePart, header::ContentType},
    transport::smtp::authentication::{Credentials, Mechanism},
};
use tokio::sync::Mutex;

use super::{MailTransport, MailTransportFactory, TransportError};
use crate::identity_provider::IdentityProviderClient;

/// SMTP 接続の TLS モード
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SmtpTlsMode {
    /// 接続開始時から TLS（通常 465 番）
    Tls,
    /// 平文で接続後に STARTTLS（通常 587 番）
    StartTls,
    /// TLS なし（Mailpit などのローカル SMTP 向け）
    Plaintext,
}

impl SmtpTlsMode {
    /// 設定値（`tls` / `starttls` / `none`）からパースする
    pub fn parse(value: &str) -> Option<Self> {
        match value.trim().to_ascii_lowercase().as_str() {
            "tls" => Some(Self::Tls),
            "starttls" => Some(Self::StartTls),
            "none" => Some(Self::Plaintext),
            _ => None,
        }
    }
}

/// SMTP 接続設定
///
/// 起動時に一度だけ作られ、以後変更されない。
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SmtpTransportConfig {
    pub host: String,
    pub port: u16,
    pub tls:  SmtpTlsMode,
}

/// SMTP トランスポートファクトリ
pub struct SmtpTransportFactory {
    config:            SmtpTransportConfig,
    identity_provider: Option<Arc<dyn IdentityProviderClient>>,
}

impl SmtpTransportFactory {
    pub fn new(config: SmtpTransportConfig) -> Self {
        Self {
            config,
            identity_provider: None,
        }
    }

    /// 委任アカウントのトークンリフレッシュに使うプロバイダを設定する
    pub fn with_identity_provider(mut self, provider: Arc<dyn IdentityProviderClient>) -> Self {
        self.identity_provider = Some(provider);
        self
    }
}

impl MailTransportFactory for SmtpTransportFactory {
    fn build(&self, credential: &MailCredential) -> Result<Arc<dyn MailTransport>, TransportError> {
        let transport = SmtpMailTransport::new(
            self.config.clone(),
            credential.clone(),
            self.identity_provider.clone(),
        )?;
        Ok(Arc::new(transport))
    }
}

/// 認証情報と、それに紐づく接続
struct SmtpSession {
    credential: MailCredential,
    transport:  AsyncSmtpTransport<Tokio1Executor>,
}

/// SMTP 送信
///
/// 1 リクエスト分の認証情報を保持する。送信は逐次的に行われるため、
/// セッションは `tokio::sync::Mutex` で保護するだけで十分。
pub struct SmtpMailTransport {
    config:            SmtpTransportConfig,
    sender:            Address,
    session:           Mutex<SmtpSession>,
    identity_provider: Option<Arc<dyn IdentityProviderClient>>,
}

impl SmtpMailTransport {
    pub fn new(
        config: SmtpTransportConfig,
        credential: MailCredential,
        identity_provider: Option<Arc<dyn IdentityProviderClient>>,
    ) -> Result<Self, TransportError> {
        let sender = parse_address(credential.sender_address().as_str())?;
        let transport = build_transport(&config, &credential)?;

        Ok(Self {
            config,
            sender,
            session: Mutex::new(SmtpSession {
                credential,
                transport,
            }),
            identity_provider,
        })
    }

    /// 委任アカウントのアクセストークンをリフレッシュし、接続を組み直す
    async fn refresh_session(&self, session: &mut SmtpSession) -> Result<(), TransportError> {
        let MailCredential::DelegatedOAuth2(account) = &mut session.credential else {
            return Ok(());
        };

        let provider = self.identity_provider.as_ref().ok_or_else(|| {
            TransportError::TokenRefresh("identity provider is not configured".to_string())
        })?;

        let refreshed = provider
            .refresh_access_token(&account.refresh_token)
            .await
            .map_err(|e| TransportError::TokenRefresh(e.to_string()))?;
        account.renew(refreshed.access_token, refreshed.expires_at);

        log_business_event!(
            event.category = event::category::CREDENTIAL,
            event.action = event::action::ACCESS_TOKEN_REFRESHED,
            event.result = event::result::SUCCESS,
            "アクセストークンをリフレッシュ"
        );

        session.transport = build_transport(&self.config, &session.credential)?;
        Ok(())
    }
}

#[async_trait]
impl MailTransport for SmtpMailTransport {
    async fn send(&self, mail: &OutgoingMail<'_>) -> Result<(), TransportError> {
        let message = build_message(mail, &self.sender)?;

        let mut guard = self.session.lock().await;
        let session = &mut *guard;

        let needs_refresh = matches!(
            &session.credential,
            MailCredential::DelegatedOAuth2(account) if account.needs_refresh(Utc::now())
        );
        if needs_refresh {
            self.refresh_session(session).await?;
        }

        let response = session
            .transport
            .send(message)
            .await
            .map_err(|e| TransportError::Send(e.to_string()))?;

        tracing::debug!(
            to = %mail.to,
            code = %response.code(),
            "SMTP 送信完了"
        );
        Ok(())
    }
}

/// 認証情報に応じた SMTP 接続を組み立てる（この時点ではまだ接続しない）
fn build_transport(
    config: &SmtpTransportConfig,
    credential: &MailCredential,
) -> Result<AsyncSmtpTransport<Tokio1Executor>, TransportError> {
    let builder = match config.tls {
        SmtpTlsMode::Tls => AsyncSmtpTransport::<Tokio1Executor>::relay(&config.host),
        SmtpTlsMode::StartTls => AsyncSmtpTransport::<Tokio1Executor>::starttls_relay(&config.host),
        SmtpTlsMode::Plaintext => Ok(AsyncSmtpTransport::<Tokio1Executor>::builder_dangerous(
            &config.host,
        )),
    }
    .map_err(|e| TransportError::Configuration(e.to_string()))?;

    let (credentials, mechanisms) = match credential {
        MailCredential::StaticAccount(account) => (
            Credentials::new(account.address.as_str().to_string(), account.password.clone()),
            vec![Mechanism::Plain, Mechanism::Login],
        ),
        MailCredential::DelegatedOAuth2(account) => (
            Credentials::new(
                account.address.as_str().to_string(),
                account.access_token.clone(),
            ),
            vec![Mechanism::Xoauth2],
        ),
    };

    Ok(builder
        .port(config.port)
        .credentials(credentials)
        .authentication(mechanisms)
        .build())
}

fn parse_address(address: &str) -> Result<Address, TransportError> {
    address
        .parse()
        .map_err(|e: lettre::address::AddressError| TransportError::InvalidAddress {
            address: address.to_string(),
            reason:  e.to_string(),
        })
}

fn parse_mailbox(address: &str) -> Result<Mailbox, TransportError> {
    address
        .parse()
        .map_err(|e: lettre::address::AddressError| TransportError::InvalidAddress {
            address: address.to_string(),
            reason:  e.to_string(),
        })
}

/// 宛先 1 件分のメッセージを組み立てる
///
/// 本文はテキストと HTML の multipart/alternative。
/// 添付ファイルがある場合は multipart/mixed で包む。
fn build_message(mail: &OutgoingMail<'_>, sender: &Address) -> Result<Message, TransportError> {
    let from = Mailbox::new(Some(mail.sender.display_name.clone()), sender.clone());

    let mut builder = Message::builder()
        .from(from)
        .to(parse_mailbox(mail.to)?)
        .subject(mail.subject);

    if let Some(reply_to) = &mail.sender.reply_to {
        builder = builder.reply_to(parse_mailbox(reply_to.as_str())?);
    }

    let body = MultiPart::alternative()
        .singlepart(
            SinglePart::builder()
                .header(ContentType::TEXT_PLAIN)
                .body(mail.text_body.to_string()),
        )
        .singlepart(
            SinglePart::builder()
                .header(ContentType::TEXT_HTML)
                .body(mail.html_body.to_string()),
        );

    let message = if mail.attachments.is_empty() {
        builder.multipart(body)
    } else {
        let mut mixed = MultiPart::mixed().multipart(body);
        for attachment in mail.attachments {
            mixed = mixed.singlepart(attachment_part(attachment)?);
        }
        builder.multipart(mixed)
    };

    message.map_err(|e| TransportError::MessageBuild(e.to_string()))
}

fn attachment_part(attachment: &Attachment) -> Result<SinglePart, TransportError> {
    let content_type = ContentType::parse(&attachment.mime_type()).map_err(|e| {
        TransportError::MessageBuild(format!("attachment {}: {e}", attachment.filename))
    })?;

    Ok(lettre::message::Attachment::new(attachment.filename.clone())
        .body(attachment.content.to_vec(), content_type))
}
