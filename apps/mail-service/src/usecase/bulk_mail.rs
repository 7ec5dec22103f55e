//! # 一斉送信ユースケース
//!
//! 1 リクエスト分の一斉送信を次の順で実行する。
//!
//! 1. 入力の検証（[`SendRequest::validate`]）
//! 2. 認証情報の解決（[`CredentialResolver`]）
//! 3. 認証情報に紐づくトランスポートの組み立て（`MailTransportFactory`）
//! 4. ペーシング付きの逐次送信（[`Dispatcher`]）
//!
//! 1〜3 の失敗は致命的で、送信は一件も試行されない。
//! 4 に入った後は宛先ごとの失敗として集計され、リクエストは失敗しない。

mod credential_resolver;
mod dispatcher;

use std::sync::Arc;

use bulkmail_domain::bulk_mail::{
    AttachmentPolicy,
    BatchClassification,
    DispatchResult,
    RawSendRequest,
    SendRequest,
};
use bulkmail_infra::MailTransportFactory;
use bulkmail_shared::{event_log::event, log_business_event};
pub use credential_resolver::{
    CredentialResolver,
    DelegatedCredentialResolver,
    StaticCredentialResolver,
};
pub use dispatcher::Dispatcher;

use crate::{auth::AuthenticatedCaller, error::MailServiceError};

/// 一斉送信ユースケース実装
pub struct BulkMailUseCaseImpl {
    credentials:       Arc<dyn CredentialResolver>,
    transports:        Arc<dyn MailTransportFactory>,
    dispatcher:        Dispatcher,
    attachment_policy: AttachmentPolicy,
}

impl BulkMailUseCaseImpl {
    pub fn new(
        credentials: Arc<dyn CredentialResolver>,
        transports: Arc<dyn MailTransportFactory>,
        dispatcher: Dispatcher,
        attachment_policy: AttachmentPolicy,
    ) -> Self {
        Self {
            credentials,
            transports,
            dispatcher,
            attachment_policy,
        }
    }

    /// 一斉送信を実行する
    pub async fn send_bulk_mail(
        &self,
        raw: RawSendRequest,
        caller: &AuthenticatedCaller,
    ) -> Result<DispatchResult, MailServiceError> {
        let request = SendRequest::validate(raw, &caller.identity, &self.attachment_policy)?;

        let credential = self.credentials.resolve(caller).await?;
        let transport = self.transports.build(&credential)?;

        tracing::info!(
            recipients = request.recipients().len(),
            attachments = request.attachments().len(),
            sender = %credential.sender_address(),
            "一斉送信を開始"
        );

        let result = self.dispatcher.dispatch(&request, transport.as_ref()).await;

        let classification = result.classification();
        log_business_event!(
            event.category = event::category::MAIL,
            event.action = event::action::BATCH_COMPLETED,
            event.result = batch_result(classification),
            event.actor_id = %caller.identity.user_id,
            classification = %classification,
            total = result.total,
            sent = result.sent,
            failed = result.failed,
            "一斉送信が完了"
        );

        Ok(result)
    }
}

fn batch_result(classification: BatchClassification) -> &'static str {
    match classification {
        BatchClassification::AllSucceeded => event::result::SUCCESS,
        BatchClassification::PartialFailure => event::result::PARTIAL,
        BatchClassification::AllFailed => event::result::FAILURE,
    }
}

#[cfg(test)]
mod tests {
    use bulkmail_domain::{
        bulk_mail::{Attachment, PacingPolicy},
        credential::{CredentialError, MailCredential, StaticAccount},
        user::{CallerIdentity, Email, UserId},
    };
    use bulkmail_infra::{
        TransportError,
        mock::{
            MockIdentityProviderClient,
            MockMailTransport,
            MockRefreshTokenRepository,
            MockTransportFactory,
            RecordingPacer,
        },
    };
    use pretty_assertions::assert_eq;

    use super::*;

    fn caller() -> AuthenticatedCaller {
        AuthenticatedCaller {
            identity:           CallerIdentity::new(
                UserId::new("user-1"),
                Some(Email::new("alice@example.com").unwrap()),
                Some("Alice".to_string()),
            ),
            oauth_access_token: None,
        }
    }

    fn admin() -> StaticAccount {
        StaticAccount {
            address:  Email::new("admin@example.com").unwrap(),
            password: "app-password".to_string(),
        }
    }

    fn raw(recipients: &str) -> RawSendRequest {
        RawSendRequest {
            recipients: Some(recipients.to_string()),
            subject: Some("お知らせ".to_string()),
            body: Some("本文".to_string()),
            ..RawSendRequest::default()
        }
    }

    fn sut(
        credentials: Arc<dyn CredentialResolver>,
        factory: &MockTransportFactory,
    ) -> BulkMailUseCaseImpl {
        BulkMailUseCaseImpl::new(
            credentials,
            Arc::new(factory.clone()),
            Dispatcher::new(PacingPolicy::default(), Arc::new(RecordingPacer::new())),
            AttachmentPolicy::default(),
        )
    }

    fn static_sut(factory: &MockTransportFactory) -> BulkMailUseCaseImpl {
        sut(Arc::new(StaticCredentialResolver::new(admin())), factory)
    }

    #[tokio::test]
    async fn test_静的アカウントで全宛先に送信する() {
        let transport = MockMailTransport::new();
        let factory = MockTransportFactory::new(transport.clone());

        let result = static_sut(&factory)
            .send_bulk_mail(raw(r#"["a@example.com","b@example.com"]"#), &caller())
            .await
            .unwrap();

        assert_eq!(result.sent, 2);
        assert_eq!(
            factory.built_with(),
            vec![MailCredential::StaticAccount(admin())]
        );
        let attempts = transport.attempts();
        assert_eq!(attempts[0].sender_name, "Alice");
        assert_eq!(attempts[0].reply_to.as_deref(), Some("alice@example.com"));
    }

    #[tokio::test]
    async fn test_検証エラーでは認証情報を解決しない() {
        let transport = MockMailTransport::new();
        let factory = MockTransportFactory::new(transport.clone());

        let err = static_sut(&factory)
            .send_bulk_mail(raw("not-json"), &caller())
            .await
            .unwrap_err();

        assert_eq!(err.to_string(), "invalid recipients format");
        assert!(factory.built_with().is_empty());
        assert!(transport.attempts().is_empty());
    }

    #[tokio::test]
    async fn test_許可されない添付ファイルは送信前に拒否する() {
        let transport = MockMailTransport::new();
        let factory = MockTransportFactory::new(transport.clone());
        let mut input = raw(r#"["a@example.com"]"#);
        input.attachments.push(Attachment::new(
            "payload.exe",
            Some("application/x-msdownload".to_string()),
            b"MZ".to_vec(),
        ));

        let err = static_sut(&factory)
            .send_bulk_mail(input, &caller())
            .await
            .unwrap_err();

        assert!(matches!(err, MailServiceError::Validation(_)));
        assert!(transport.attempts().is_empty());
    }

    #[tokio::test]
    async fn test_リフレッシュトークンのない委任呼び出しは送信しない() {
        let transport = MockMailTransport::new();
        let factory = MockTransportFactory::new(transport.clone());
        let provider = MockIdentityProviderClient::new().with_account(
            "ya29.caller",
            "alice@example.com",
            None,
        );
        let resolver = DelegatedCredentialResolver::new(
            Arc::new(MockRefreshTokenRepository::new()),
            Arc::new(provider),
        );
        let mut delegated = caller();
        delegated.oauth_access_token = Some("ya29.caller".to_string());

        let err = sut(Arc::new(resolver), &factory)
            .send_bulk_mail(raw(r#"["a@example.com"]"#), &delegated)
            .await
            .unwrap_err();

        assert!(matches!(
            err,
            MailServiceError::Credential(CredentialError::RefreshTokenUnavailable)
        ));
        assert!(factory.built_with().is_empty());
        assert!(transport.attempts().is_empty());
    }

    #[tokio::test]
    async fn test_トランスポートを組み立てられなければ送信しない() {
        let transport = MockMailTransport::new();
        let factory = MockTransportFactory::new(transport.clone())
            .with_build_error(TransportError::Configuration("tls unavailable".to_string()));

        let err = static_sut(&factory)
            .send_bulk_mail(raw(r#"["a@example.com"]"#), &caller())
            .await
            .unwrap_err();

        assert!(matches!(err, MailServiceError::Transport(_)));
        assert!(transport.attempts().is_empty());
    }

    #[tokio::test]
    async fn test_全件失敗でもエラーにはせず集計結果を返す() {
        let transport = MockMailTransport::new();
        transport.fail_all("connection refused");
        let factory = MockTransportFactory::new(transport.clone());

        let result = static_sut(&factory)
            .send_bulk_mail(raw(r#"["a@example.com","b@example.com"]"#), &caller())
            .await
            .unwrap();

        assert_eq!(result.classification(), BatchClassification::AllFailed);
        assert_eq!(result.failed, 2);
    }
}
