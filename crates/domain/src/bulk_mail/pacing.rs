//! # 送信ペーシング
//!
//! プロバイダのスループット上限を超えないよう、一定件数ごとに送信を一時停止する。
//! 固定ウィンドウ方式で、トークンバケットではない。
//!
//! ポリシー（いつ止まるか）と実際の待機（どう止まるか）は分離している。
//! 待機はインフラ層の `Pacer` が担い、このモジュールは判定だけを行う。

use std::time::Duration;

/// 既定の連続送信件数
pub const DEFAULT_PACING_BATCH_SIZE: usize = 10;

/// 既定の一時停止時間
pub const DEFAULT_PACING_INTERVAL: Duration = Duration::from_secs(1);

/// 送信ペーシングのポリシー
///
/// `batch_size` 件を連続送信するごとに `interval` だけ待機する。
/// 先頭（インデックス 0）の前では待機しない。
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PacingPolicy {
    batch_size: usize,
    interval:   Duration,
}

impl Default for PacingPolicy {
    fn default() -> Self {
        Self::new(DEFAULT_PACING_BATCH_SIZE, DEFAULT_PACING_INTERVAL)
    }
}

impl PacingPolicy {
    /// `batch_size` が 0 の場合はペーシングを無効化する
    pub fn new(batch_size: usize, interval: Duration) -> Self {
        Self {
            batch_size,
            interval,
        }
    }

    /// ペーシングを行わないポリシー
    pub fn disabled() -> Self {
        Self::new(0, Duration::ZERO)
    }

    pub fn batch_size(&self) -> usize {
        self.batch_size
    }

    pub fn interval(&self) -> Duration {
        self.interval
    }

    /// `index` 番目（0 始まり）の宛先を送信する前に待機すべきか
    pub fn pause_before(&self, index: usize) -> bool {
        self.batch_size > 0 && !self.interval.is_zero() && index > 0 && index % self.batch_size == 0
    }

    /// `total` 件の宛先を送信する間に待機するインデックスの一覧
    pub fn pause_points(&self, total: usize) -> Vec<usize> {
        (0..total).filter(|&i| self.pause_before(i)).collect()
    }
}
