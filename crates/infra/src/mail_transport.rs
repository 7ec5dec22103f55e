//! # メール送信トランスポート
//!
//! 宛先 1 件分のメールを送信する [`MailTransport`] と、
//! 解決済みの認証情報からトランスポートを組み立てる [`MailTransportFactory`] を提供する。
//!
//! - **SMTP**: lettre の `AsyncSmtpTransport` で送信する（本番用）
//! - **Noop**: 送信せずログ出力のみ行う（ローカル開発用）
//!
//! 接続設定（[`SmtpTransportConfig`]）は起動時に一度だけ作られ、
//! ファクトリへ明示的に渡される。プロセス全体で共有する可変のトランスポートは持たない。

mod noop;
mod smtp;

use std::sync::Arc;

use async_trait::async_trait;
use bulkmail_domain::{bulk_mail::OutgoingMail, credential::MailCredential};
pub use noop::{NoopMailTransport, NoopTransportFactory};
pub use smtp::{SmtpMailTransport, SmtpTlsMode, SmtpTransportConfig, SmtpTransportFactory};
use thiserror::Error;

/// メール送信エラー
///
/// 宛先ごとの失敗理由としてそのままクライアントへ返るため、
/// 認証情報などの秘匿値を含めない。
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum TransportError {
    /// トランスポートの組み立てに失敗した（TLS 設定など）
    #[error("transport configuration error: {0}")]
    Configuration(String),

    /// 宛先または送信元アドレスが不正
    #[error("invalid address {address}: {reason}")]
    InvalidAddress { address: String, reason: String },

    /// メッセージの組み立てに失敗した
    #[error("failed to build message: {0}")]
    MessageBuild(String),

    /// アクセストークンのリフレッシュに失敗した
    #[error("access token refresh failed: {0}")]
    TokenRefresh(String),

    /// SMTP サーバーとの通信に失敗した、または拒否された
    #[error("{0}")]
    Send(String),
}

/// メール送信トレイト
///
/// 1 回の呼び出しで 1 宛先に 1 通送る。リトライはしない。
#[async_trait]
pub trait MailTransport: Send + Sync {
    async fn send(&self, mail: &OutgoingMail<'_>) -> Result<(), TransportError>;
}

/// トランスポートファクトリトレイト
///
/// リクエストごとに、解決済みの認証情報に紐づくトランスポートを組み立てる。
pub trait MailTransportFactory: Send + Sync {
    fn build(&self, credential: &MailCredential) -> Result<Arc<dyn MailTransport>, TransportError>;
}
