//! # リポジトリ実装
//!
//! ID ストアへのアクセスをトレイトで抽象化し、PostgreSQL 実装を提供する。

pub mod refresh_token_repository;

pub use refresh_token_repository::{PostgresRefreshTokenRepository, RefreshTokenRepository};
