//! # Bulkmail インフラ層
//!
//! 外部システムとの接続・通信を担当するインフラストラクチャ層。
//!
//! ## 責務
//!
//! - **メール送信**: SMTP サーバーへの送信（[`mail_transport`]）
//! - **OAuth2 プロバイダ**: アクセストークンの検証とリフレッシュ（[`identity_provider`]）
//! - **ID ストア**: リフレッシュトークンの参照（[`repository`]）
//! - **送信ペーシング**: 実時間での待機（[`pacer`]）
//!
//! ## 依存関係
//!
//! ```text
//! mail-service → infra → domain
//! ```
//!
//! ドメイン層はインフラ層に依存しない。
//!
//! ## テスト用モック
//!
//! `test-utils` feature を有効にすると [`mock`] モジュールが公開される。

pub mod db;
pub mod error;
pub mod identity_provider;
pub mod mail_transport;
#[cfg(any(test, feature = "test-utils"))]
pub mod mock;
pub mod pacer;
pub mod repository;

pub use error::{InfraError, InfraErrorKind};
pub use identity_provider::{
    GoogleIdentityProviderClient,
    GoogleOAuthConfig,
    IdentityProviderClient,
    IdentityProviderError,
    RefreshedToken,
    TokenInfo,
};
pub use mail_transport::{
    MailTransport,
    MailTransportFactory,
    NoopMailTransport,
    NoopTransportFactory,
    SmtpMailTransport,
    SmtpTlsMode,
    SmtpTransportConfig,
    SmtpTransportFactory,
    TransportError,
};
pub use pacer::{Pacer, TokioPacer};
pub use repository::{PostgresRefreshTokenRepository, RefreshTokenRepository};
