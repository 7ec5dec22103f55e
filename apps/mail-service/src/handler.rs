//! # HTTP リクエストハンドラ
//!
//! axum のルートに対応するハンドラ関数を定義する。
//!
//! - 各ハンドラはサブモジュールに配置し、ここで re-export する
//! - ハンドラは薄く保ち、ビジネスロジックはユースケース層に委譲する

pub mod bulk_mail;
pub mod health;

pub use bulk_mail::{BulkMailState, send_bulk_email};
pub use health::health_check;
