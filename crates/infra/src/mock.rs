//! # テスト用モック
//!
//! ユースケーステストやルーターテストで使用するインメモリ実装。
//! `test-utils` feature を有効にすることで、他クレートからも利用可能。
//!
//! ```toml
//! [dev-dependencies]
//! bulkmail-infra = { workspace = true, features = ["test-utils"] }
//! ```
//!
//! 送信とペーシングの順序を検証したい場合は、[`MockMailTransport`] と
//! [`RecordingPacer`] に同じ [`Timeline`] を渡す。

use std::{
    collections::HashMap,
    sync::{
        Arc,
        Mutex,
        atomic::{AtomicUsize, Ordering},
    },
    time::Duration,
};

use async_trait::async_trait;
use bulkmail_domain::{
    bulk_mail::OutgoingMail,
    credential::MailCredential,
    user::{Email, UserId},
};
use chrono::{DateTime, Utc};

use crate::{
    error::InfraError,
    identity_provider::{IdentityProviderClient, IdentityProviderError, RefreshedToken, TokenInfo},
    mail_transport::{MailTransport, MailTransportFactory, TransportError},
    pacer::Pacer,
    repository::RefreshTokenRepository,
};

// ===== Timeline =====

/// 送信と待機の発生順
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TimelineEvent {
    Sent(String),
    Failed(String),
    Paused(Duration),
}

/// 送信と待機を発生順に記録する共有ログ
#[derive(Debug, Clone, Default)]
pub struct Timeline {
    events: Arc<Mutex<Vec<TimelineEvent>>>,
}

impl Timeline {
    pub fn new() -> Self {
        Self::default()
    }

    fn push(&self, event: TimelineEvent) {
        self.events.lock().unwrap().push(event);
    }

    pub fn events(&self) -> Vec<TimelineEvent> {
        self.events.lock().unwrap().clone()
    }

    /// 各待機の直前までに試行された送信数（成功・失敗を問わない）
    pub fn attempts_before_each_pause(&self) -> Vec<usize> {
        let mut attempts = 0;
        let mut result = Vec::new();
        for event in self.events() {
            match event {
                TimelineEvent::Sent(_) | TimelineEvent::Failed(_) => attempts += 1,
                TimelineEvent::Paused(_) => result.push(attempts),
            }
        }
        result
    }
}

// ===== MockMailTransport =====

/// 送信されたメールの記録
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SentMail {
    pub to:               String,
    pub subject:          String,
    pub text_body:        String,
    pub html_body:        String,
    pub sender_name:      String,
    pub reply_to:         Option<String>,
    pub attachment_names: Vec<String>,
}

impl SentMail {
    fn capture(mail: &OutgoingMail<'_>) -> Self {
        Self {
            to:               mail.to.to_string(),
            subject:          mail.subject.to_string(),
            text_body:        mail.text_body.to_string(),
            html_body:        mail.html_body.to_string(),
            sender_name:      mail.sender.display_name.clone(),
            reply_to:         mail.sender.reply_to.as_ref().map(|e| e.as_str().to_string()),
            attachment_names: mail
                .attachments
                .iter()
                .map(|a| a.filename.clone())
                .collect(),
        }
    }
}

/// 指定した宛先だけ失敗させるモックトランスポート
///
/// `Clone` は内部状態を共有する。
#[derive(Debug, Clone, Default)]
pub struct MockMailTransport {
    attempts: Arc<Mutex<Vec<SentMail>>>,
    failures: Arc<Mutex<HashMap<String, String>>>,
    fail_all: Arc<Mutex<Option<String>>>,
    timeline: Timeline,
}

impl MockMailTransport {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_timeline(timeline: Timeline) -> Self {
        Self {
            timeline,
            ..Self::default()
        }
    }

    /// 指定した宛先への送信を `reason` で失敗させる
    pub fn fail_for(&self, recipient: impl Into<String>, reason: impl Into<String>) {
        self.failures
            .lock()
            .unwrap()
            .insert(recipient.into(), reason.into());
    }

    /// すべての送信を `reason` で失敗させる
    pub fn fail_all(&self, reason: impl Into<String>) {
        *self.fail_all.lock().unwrap() = Some(reason.into());
    }

    /// 試行されたすべての送信（失敗を含む、試行順）
    pub fn attempts(&self) -> Vec<SentMail> {
        self.attempts.lock().unwrap().clone()
    }

    /// 試行された宛先（試行順）
    pub fn attempted_recipients(&self) -> Vec<String> {
        self.attempts().into_iter().map(|m| m.to).collect()
    }
}

#[async_trait]
impl MailTransport for MockMailTransport {
    async fn send(&self, mail: &OutgoingMail<'_>) -> Result<(), TransportError> {
        self.attempts.lock().unwrap().push(SentMail::capture(mail));

        let failure = self
            .fail_all
            .lock()
            .unwrap()
            .clone()
            .or_else(|| self.failures.lock().unwrap().get(mail.to).cloned());

        match failure {
            Some(reason) => {
                self.timeline.push(TimelineEvent::Failed(mail.to.to_string()));
                Err(TransportError::Send(reason))
            }
            None => {
                self.timeline.push(TimelineEvent::Sent(mail.to.to_string()));
                Ok(())
            }
        }
    }
}

// ===== MockTransportFactory =====

/// 常に同じ [`MockMailTransport`] を返すファクトリ
#[derive(Debug, Clone, Default)]
pub struct MockTransportFactory {
    transport:   MockMailTransport,
    credentials: Arc<Mutex<Vec<MailCredential>>>,
    build_error: Option<TransportError>,
}

impl MockTransportFactory {
    pub fn new(transport: MockMailTransport) -> Self {
        Self {
            transport,
            ..Self::default()
        }
    }

    /// `build` を常に失敗させる
    pub fn with_build_error(mut self, error: TransportError) -> Self {
        self.build_error = Some(error);
        self
    }

    /// `build` に渡された認証情報（呼び出し順）
    pub fn built_with(&self) -> Vec<MailCredential> {
        self.credentials.lock().unwrap().clone()
    }
}

impl MailTransportFactory for MockTransportFactory {
    fn build(&self, credential: &MailCredential) -> Result<Arc<dyn MailTransport>, TransportError> {
        self.credentials.lock().unwrap().push(credential.clone());
        match &self.build_error {
            Some(error) => Err(error.clone()),
            None => Ok(Arc::new(self.transport.clone())),
        }
    }
}

// ===== RecordingPacer =====

/// 待機せずに記録だけ行うペーサー
#[derive(Debug, Clone, Default)]
pub struct RecordingPacer {
    pauses:   Arc<Mutex<Vec<Duration>>>,
    timeline: Timeline,
}

impl RecordingPacer {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_timeline(timeline: Timeline) -> Self {
        Self {
            timeline,
            ..Self::default()
        }
    }

    pub fn pauses(&self) -> Vec<Duration> {
        self.pauses.lock().unwrap().clone()
    }
}

#[async_trait]
impl Pacer for RecordingPacer {
    async fn pause(&self, interval: Duration) {
        self.pauses.lock().unwrap().push(interval);
        self.timeline.push(TimelineEvent::Paused(interval));
    }
}

// ===== MockRefreshTokenRepository =====

#[derive(Debug, Clone, Default)]
pub struct MockRefreshTokenRepository {
    tokens:  Arc<Mutex<HashMap<String, String>>>,
    fail:    bool,
    lookups: Arc<AtomicUsize>,
}

impl MockRefreshTokenRepository {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_token(self, user_id: &UserId, token: impl Into<String>) -> Self {
        self.tokens
            .lock()
            .unwrap()
            .insert(user_id.as_str().to_string(), token.into());
        self
    }

    /// すべての検索をデータベースエラーにする
    pub fn failing() -> Self {
        Self {
            fail: true,
            ..Self::default()
        }
    }

    pub fn lookups(&self) -> usize {
        self.lookups.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl RefreshTokenRepository for MockRefreshTokenRepository {
    async fn find_refresh_token(&self, user_id: &UserId) -> Result<Option<String>, InfraError> {
        self.lookups.fetch_add(1, Ordering::SeqCst);
        if self.fail {
            return Err(InfraError::unexpected("connection refused"));
        }
        Ok(self.tokens.lock().unwrap().get(user_id.as_str()).cloned())
    }
}

// ===== MockIdentityProviderClient =====

/// アクセストークンごとに検証結果を登録できるモックプロバイダ
#[derive(Debug, Clone, Default)]
pub struct MockIdentityProviderClient {
    accounts:        Arc<Mutex<HashMap<String, TokenInfo>>>,
    refresh_calls:   Arc<Mutex<Vec<String>>>,
    verify_calls:    Arc<AtomicUsize>,
    refresh_failure: bool,
    malformed:       Option<String>,
}

impl MockIdentityProviderClient {
    pub fn new() -> Self {
        Self::default()
    }

    /// `access_token` を `email` のアカウントとして有効にする
    pub fn with_account(
        self,
        access_token: impl Into<String>,
        email: &str,
        expires_at: Option<DateTime<Utc>>,
    ) -> Self {
        self.accounts.lock().unwrap().insert(
            access_token.into(),
            TokenInfo {
                email: Email::new(email).unwrap(),
                expires_at,
            },
        );
        self
    }

    /// 検証応答を常に想定外の形式にする
    pub fn with_malformed_response(mut self, reason: impl Into<String>) -> Self {
        self.malformed = Some(reason.into());
        self
    }

    /// リフレッシュを常に失敗させる
    pub fn with_refresh_failure(mut self) -> Self {
        self.refresh_failure = true;
        self
    }

    pub fn verify_calls(&self) -> usize {
        self.verify_calls.load(Ordering::SeqCst)
    }

    /// リフレッシュに使われたリフレッシュトークン（呼び出し順）
    pub fn refresh_calls(&self) -> Vec<String> {
        self.refresh_calls.lock().unwrap().clone()
    }
}

#[async_trait]
impl IdentityProviderClient for MockIdentityProviderClient {
    async fn verify_access_token(
        &self,
        access_token: &str,
    ) -> Result<TokenInfo, IdentityProviderError> {
        self.verify_calls.fetch_add(1, Ordering::SeqCst);
        if let Some(reason) = &self.malformed {
            return Err(IdentityProviderError::InvalidResponse(reason.clone()));
        }
        self.accounts
            .lock()
            .unwrap()
            .get(access_token)
            .cloned()
            .ok_or(IdentityProviderError::Rejected(400))
    }

    async fn refresh_access_token(
        &self,
        refresh_token: &str,
    ) -> Result<RefreshedToken, IdentityProviderError> {
        self.refresh_calls
            .lock()
            .unwrap()
            .push(refresh_token.to_string());
        if self.refresh_failure {
            return Err(IdentityProviderError::Rejected(400));
        }
        Ok(RefreshedToken {
            access_token: "ya29.refreshed".to_string(),
            expires_at:   Some(Utc::now() + chrono::Duration::seconds(3600)),
        })
    }
}
