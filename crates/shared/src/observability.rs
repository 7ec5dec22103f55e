//! # ログ出力の初期化
//!
//! `tracing` の subscriber 登録と、HTTP リクエスト単位のスパン生成をまとめる。
//! 出力形式は `LOG_FORMAT`（`json` / `pretty`）で選ぶ。

/// ログ出力形式
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum LogFormat {
    /// 1 行 1 イベントの JSON（ログ収集基盤向け）
    Json,
    #[default]
    Pretty,
}

impl LogFormat {
    /// `LOG_FORMAT` の値を解釈する
    ///
    /// 未知の値は `Pretty` として扱う。subscriber 登録前に呼ばれるため警告は stderr に出す。
    pub fn parse(s: &str) -> Self {
        match s {
            "json" => Self::Json,
            "pretty" => Self::Pretty,
            other => {
                eprintln!("LOG_FORMAT={other:?} is not json or pretty; using pretty");
                Self::Pretty
            }
        }
    }

    pub fn from_env() -> Self {
        std::env::var("LOG_FORMAT")
            .map(|value| Self::parse(&value))
            .unwrap_or_default()
    }
}

/// トレーシング初期化設定
#[derive(Debug, Clone)]
pub struct TracingConfig {
    /// [`app_span`](Self::app_span) の `service` フィールドに使う名前
    pub service_name: String,
    pub log_format:   LogFormat,
}

impl TracingConfig {
    pub fn new(service_name: impl Into<String>, log_format: LogFormat) -> Self {
        Self {
            service_name: service_name.into(),
            log_format,
        }
    }

    /// `LOG_FORMAT` 環境変数で出力形式を決定する
    pub fn from_env(service_name: impl Into<String>) -> Self {
        Self::new(service_name, LogFormat::from_env())
    }

    /// プロセス全体を包む `app` スパン
    ///
    /// `main` で `entered()` しておくと、以降のログに `service` が付く。
    #[cfg(feature = "observability")]
    pub fn app_span(&self) -> tracing::Span {
        tracing::info_span!("app", service = %self.service_name)
    }
}

/// グローバル subscriber を登録する
///
/// レベルは `RUST_LOG` に従い、未設定なら `info,bulkmail=debug`。
/// `ErrorLayer` は `InfraError` の SpanTrace 取得に必要。
#[cfg(feature = "observability")]
pub fn init_tracing(config: &TracingConfig) {
    use tracing_subscriber::{Layer as _, layer::SubscriberExt, util::SubscriberInitExt};

    let env_filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| "info,bulkmail=debug".into());

    let fmt_layer = match config.log_format {
        LogFormat::Json => tracing_subscriber::fmt::layer()
            .json()
            .flatten_event(true)
            .with_target(true)
            .with_current_span(true)
            .with_span_list(false)
            .boxed(),
        LogFormat::Pretty => tracing_subscriber::fmt::layer().boxed(),
    };

    tracing_subscriber::registry()
        .with(env_filter)
        .with(fmt_layer)
        .with(tracing_error::ErrorLayer::default())
        .init();
}

/// `TraceLayer::make_span_with` 用のリクエストスパン（`method`, `path`）
#[cfg(feature = "observability")]
pub fn make_request_span<B>(request: &http::Request<B>) -> tracing::Span {
    tracing::info_span!(
        "request",
        method = %request.method(),
        path = %request.uri().path(),
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_jsonでjsonを返す() {
        assert_eq!(LogFormat::parse("json"), LogFormat::Json);
    }

    #[test]
    fn test_parse_prettyでprettyを返す() {
        assert_eq!(LogFormat::parse("pretty"), LogFormat::Pretty);
    }

    #[test]
    fn test_parse_不正な値でprettyにフォールバックする() {
        assert_eq!(LogFormat::parse("unknown"), LogFormat::Pretty);
        assert_eq!(LogFormat::parse(""), LogFormat::Pretty);
        assert_eq!(LogFormat::parse("JSON"), LogFormat::Pretty);
    }

    #[test]
    fn test_newでフィールドが設定される() {
        let config = TracingConfig::new("mail-service", LogFormat::Json);

        assert_eq!(config.service_name, "mail-service");
        assert_eq!(config.log_format, LogFormat::Json);
    }

    #[cfg(feature = "observability")]
    #[test]
    fn test_app_spanはサービス名を持つappスパンを作る() {
        let config = TracingConfig::new("mail-service", LogFormat::Pretty);

        tracing::subscriber::with_default(tracing_subscriber::registry(), || {
            let span = config.app_span();
            let metadata = span.metadata().unwrap();

            assert_eq!(metadata.name(), "app");
            assert!(metadata.fields().field("service").is_some());
        });
    }

    #[cfg(feature = "observability")]
    #[test]
    fn test_make_request_spanがパニックしない() {
        let request = http::Request::builder()
            .method("POST")
            .uri("/api/mail/send-bulk-email?x=1")
            .body(())
            .unwrap();

        let _span = make_request_span(&request);
    }
}
