//! # Mail Service ライブラリ
//!
//! 一斉送信 API のハンドラ・ユースケース・ルーター構築を公開する。
//! `main.rs` は設定の読み込みと依存の組み立て、サーバー起動に集中する。

pub mod app_builder;
pub mod auth;
pub mod config;
pub mod error;
pub mod handler;
pub mod usecase;
