//! # Bulkmail ドメイン層
//!
//! 一斉送信（バッチ送信）の中核となるドメインモデルを定義する。
//!
//! ## 設計方針
//!
//! - **純粋性**: I/O を一切行わない。送信・トークン検証・DB 参照はインフラ層の責務
//! - **不変条件を型で守る**: `DispatchResult` は宛先ごとの結果の畳み込みでしか生成できず、
//!   `sent + failed == total` が常に成り立つ
//! - **エラーの分類**: 入力エラー（[`bulk_mail::ValidationError`]）と
//!   認証情報エラー（[`credential::CredentialError`]）を別の型で表現する
//!
//! ## 依存関係の方向
//!
//! ```text
//! mail-service → infra → domain
//!        ↘         ↓
//!          shared
//! ```
//!
//! ## モジュール構成
//!
//! - [`bulk_mail`] - 送信リクエストの検証、宛先ごとの結果、集計、ペーシング
//! - [`credential`] - メール送信用の認証情報
//! - [`user`] - 呼び出し元の識別情報とメールアドレス
//! - [`error`] - 汎用のドメインエラー
//!
//! ## 使用例
//!
//! ```rust
//! use bulkmail_domain::bulk_mail::{DispatchResult, RecipientOutcome};
//!
//! let result = DispatchResult::from_outcomes(&[
//!     RecipientOutcome::sent("a@example.com"),
//!     RecipientOutcome::failed("b@example.com", "mailbox unavailable"),
//! ]);
//! assert_eq!(result.total, result.sent + result.failed);
//! ```

pub mod bulk_mail;
pub mod credential;
pub mod error;
pub mod user;

pub use error::DomainError;
