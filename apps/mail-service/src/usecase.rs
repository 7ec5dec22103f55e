//! # ユースケース層
//!
//! Mail Service のビジネスロジックを実装する。
//!
//! ## 設計方針
//!
//! - **依存性注入**: リポジトリ・トランスポート・ペーサーを `Arc<dyn Trait>` で外部から注入
//! - **薄いハンドラ**: ハンドラは multipart の読み取りとレスポンス変換だけを行う
//!
//! ## モジュール構成
//!
//! - `bulk_mail`: 一斉送信（検証 → 認証情報の解決 → ペーシング付き送信）

pub mod bulk_mail;

pub use bulk_mail::{
    BulkMailUseCaseImpl,
    CredentialResolver,
    DelegatedCredentialResolver,
    Dispatcher,
    StaticCredentialResolver,
};
