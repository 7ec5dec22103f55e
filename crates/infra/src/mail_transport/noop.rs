//! Noop 送信実装
//!
//! メールを実際に送信せず、ログ出力のみ行う。
//! `MAIL_TRANSPORT=noop` でローカル開発時に使用する。

use std::sync::Arc;

use async_trait::async_trait;
use bulkmail_domain::{bulk_mail::OutgoingMail, credential::MailCredential};

use super::{MailTransport, MailTransportFactory, TransportError};

/// Noop 送信（ログ出力のみ）
#[derive(Debug, Clone)]
pub struct NoopMailTransport {
    from: String,
}

#[async_trait]
impl MailTransport for NoopMailTransport {
    async fn send(&self, mail: &OutgoingMail<'_>) -> Result<(), TransportError> {
        tracing::info!(
            from = %self.from,
            to = %mail.to,
            subject = %mail.subject,
            attachments = mail.attachments.len(),
            "Noop: メール送信をスキップ"
        );
        Ok(())
    }
}

/// Noop トランスポートファクトリ
#[derive(Debug, Clone, Default)]
pub struct NoopTransportFactory;

impl MailTransportFactory for NoopTransportFactory {
    fn build(&self, credential: &MailCredential) -> Result<Arc<dyn MailTransport>, TransportError> {
        Ok(Arc::new(NoopMailTransport {
            from: credential.sender_address().to_string(),
        }))
    }
}

#[cfg(test)]
mod tests {
    use bulkmail_domain::{
        bulk_mail::SenderIdentity,
        credential::StaticAccount,
        user::Email,
    };

    use super::*;

    #[tokio::test]
    async fn test_sendがエラーを返さない() {
        let credential = MailCredential::StaticAccount(StaticAccount {
            address:  Email::new("admin@example.com").unwrap(),
            password: "secret".to_string(),
        });
        let transport = NoopTransportFactory.build(&credential).unwrap();
        let sender = SenderIdentity {
            display_name: "System User".to_string(),
            reply_to:     None,
        };

        let result = transport
            .send(&OutgoingMail {
                to:          "bob@example.com",
                subject:     "テスト件名",
                text_body:   "テスト",
                html_body:   "<p>テスト</p>",
                attachments: &[],
                sender:      &sender,
            })
            .await;

        assert!(result.is_ok());
    }
}
