//! # Mail Service サーバー
//!
//! 認証済みの呼び出し元からの依頼を受け、宛先ごとに 1 通ずつメールを送信する。
//!
//! ## 認証情報の解決方式
//!
//! | `MAIL_CREDENTIAL_MODE` | 送信元 | 必要な設定 |
//! |------------------------|--------|-----------|
//! | `static` | 共有アカウント | `ADMIN_EMAIL`, `ADMIN_EMAIL_PASSWORD` |
//! | `delegated` | 呼び出し元本人の OAuth2 アカウント | `DATABASE_URL`, `GOOGLE_CLIENT_ID`, `GOOGLE_CLIENT_SECRET` |
//!
//! ## 環境変数
//!
//! | 変数名 | 必須 | 説明 |
//! |--------|------|------|
//! | `MAIL_SERVICE_HOST` | No | バインドアドレス（デフォルト: `0.0.0.0`） |
//! | `MAIL_SERVICE_PORT` | **Yes** | ポート番号 |
//! | `JWT_SECRET` | **Yes** | Bearer トークン検証用の HS256 シークレット |
//! | `MAIL_TRANSPORT` | No | `smtp`（デフォルト）または `noop` |
//! | `SMTP_HOST` / `SMTP_PORT` / `SMTP_TLS` | No | SMTP 接続先（デフォルト: `smtp.gmail.com:587`, `starttls`） |
//!
//! その他の変数は [`bulkmail_mail_service::config`] を参照。
//!
//! ## 起動方法
//!
//! ```bash
//! MAIL_SERVICE_PORT=3002 JWT_SECRET=... ADMIN_EMAIL=... ADMIN_EMAIL_PASSWORD=... \
//!   cargo run -p bulkmail-mail-service
//! ```

use std::{net::SocketAddr, sync::Arc};

use bulkmail_infra::{
    GoogleIdentityProviderClient,
    IdentityProviderClient,
    MailTransportFactory,
    NoopTransportFactory,
    PostgresRefreshTokenRepository,
    SmtpTransportFactory,
    TokioPacer,
    db,
};
use bulkmail_mail_service::{
    app_builder::build_app,
    auth::JwtVerifier,
    config::{CredentialConfig, MailServiceConfig, TransportBackend},
    handler::BulkMailState,
    usecase::{
        BulkMailUseCaseImpl,
        CredentialResolver,
        DelegatedCredentialResolver,
        Dispatcher,
        StaticCredentialResolver,
    },
};
use bulkmail_shared::observability::{TracingConfig, init_tracing};
use tokio::net::TcpListener;

/// Mail Service サーバーのエントリーポイント
#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // .env ファイルを読み込む（存在する場合）
    dotenvy::dotenv().ok();

    let tracing_config = TracingConfig::from_env("mail-service");
    init_tracing(&tracing_config);
    let _app_span = tracing_config.app_span().entered();

    let config = MailServiceConfig::from_env()?;

    // 認証情報リゾルバ（委任モードではトランスポートもプロバイダを使う）
    let (credentials, identity_provider): (
        Arc<dyn CredentialResolver>,
        Option<Arc<dyn IdentityProviderClient>>,
    ) = match &config.credential {
        CredentialConfig::Static(account) => {
            let resolver: Arc<dyn CredentialResolver> =
                Arc::new(StaticCredentialResolver::new(account.clone()));
            (resolver, None)
        }
        CredentialConfig::Delegated {
            database_url,
            google,
        } => {
            let pool = db::create_pool(database_url)?;
            let provider: Arc<dyn IdentityProviderClient> =
                Arc::new(GoogleIdentityProviderClient::new(google.clone())?);
            let resolver: Arc<dyn CredentialResolver> = Arc::new(DelegatedCredentialResolver::new(
                Arc::new(PostgresRefreshTokenRepository::new(pool)),
                provider.clone(),
            ));
            (resolver, Some(provider))
        }
    };

    let transports: Arc<dyn MailTransportFactory> = match config.transport {
        TransportBackend::Smtp => {
            let factory = SmtpTransportFactory::new(config.smtp.clone());
            Arc::new(match identity_provider {
                Some(provider) => factory.with_identity_provider(provider),
                None => factory,
            })
        }
        TransportBackend::Noop => Arc::new(NoopTransportFactory),
    };

    let usecase = BulkMailUseCaseImpl::new(
        credentials,
        transports,
        Dispatcher::new(config.pacing, Arc::new(TokioPacer)),
        config.attachment_policy.clone(),
    );

    let app = build_app(
        Arc::new(JwtVerifier::new(&config.jwt_secret)),
        Arc::new(BulkMailState { usecase }),
        config.body_limit_bytes,
    );

    let addr: SocketAddr = format!("{}:{}", config.host, config.port).parse()?;
    tracing::info!(
        credential_mode = %config.credential.mode(),
        transport = %config.transport,
        "Mail Service サーバーを起動します: {}",
        addr
    );

    let listener = TcpListener::bind(addr).await?;
    axum::serve(listener, app).await?;

    Ok(())
}
