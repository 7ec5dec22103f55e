//! # 一斉送信
//!
//! 1 通のメッセージを複数の宛先へ送るバッチ送信のドメインモデル。
//!
//! ## 処理の流れ
//!
//! ```text
//! RawSendRequest ──validate──▶ SendRequest ──(宛先ごとに送信)──▶ [RecipientOutcome]
//!                                                                   │ fold
//!                                                                   ▼
//!                                          BatchClassification ◀── DispatchResult
//! ```
//!
//! ## モジュール構成
//!
//! - [`request`] - 送信リクエストの検証と送信メールのビュー
//! - [`outcome`] - 宛先ごとの結果、集計結果、分類
//! - [`pacing`] - 送信間隔のポリシー

pub mod outcome;
pub mod pacing;
pub mod request;

pub use outcome::{BatchClassification, DeliveryStatus, DispatchResult, RecipientError, RecipientOutcome};
pub use pacing::PacingPolicy;
pub use request::{
    Attachment,
    AttachmentPolicy,
    OutgoingMail,
    RawSendRequest,
    SendRequest,
    SenderIdentity,
    ValidationError,
};
