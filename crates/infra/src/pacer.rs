//! # 送信ペーシングの待機
//!
//! ドメイン層の `PacingPolicy` が「いつ待つか」を決め、
//! [`Pacer`] が「どう待つか」を担う。テストでは待機を記録するだけのモックに差し替える。

use std::time::Duration;

use async_trait::async_trait;

/// 送信間の待機トレイト
#[async_trait]
pub trait Pacer: Send + Sync {
    async fn pause(&self, interval: Duration);
}

/// tokio のタイマーで実際に待機する
#[derive(Debug, Clone, Copy, Default)]
pub struct TokioPacer;

#[async_trait]
impl Pacer for TokioPacer {
    async fn pause(&self, interval: Duration) {
        tracing::debug!(interval_ms = interval.as_millis() as u64, "送信ペーシングで待機");
        tokio::time::sleep(interval).await;
    }
}

#[cfg(test)]
mod tests {
    use std::time::Instant;

    use super::*;

    #[tokio::test]
    async fn test_指定した時間だけ待機する() {
        let start = Instant::now();

        TokioPacer.pause(Duration::from_millis(20)).await;

        assert!(start.elapsed() >= Duration::from_millis(20));
    }
}
