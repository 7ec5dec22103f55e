//! # 送信結果の集計
//!
//! 宛先ごとの送信結果（[`RecipientOutcome`]）を畳み込んで [`DispatchResult`] を作り、
//! そこからバッチ全体の分類（[`BatchClassification`]）を導出する。
//!
//! `DispatchResult` は [`DispatchResult::from_outcomes`] でしか生成できないため、
//! `sent + failed == total` と `errors.len() == failed` が常に成り立つ。

use serde::Serialize;
use strum::IntoStaticStr;

/// 宛先 1 件分の送信状態
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DeliveryStatus {
    Sent,
    Failed(String),
}

/// 宛先 1 件分の送信結果
///
/// 送信試行ごとに 1 つ生成され、生成後は変更されない。
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RecipientOutcome {
    email:  String,
    status: DeliveryStatus,
}

impl RecipientOutcome {
    pub fn sent(email: impl Into<String>) -> Self {
        Self {
            email:  email.into(),
            status: DeliveryStatus::Sent,
        }
    }

    pub fn failed(email: impl Into<String>, reason: impl Into<String>) -> Self {
        Self {
            email:  email.into(),
            status: DeliveryStatus::Failed(reason.into()),
        }
    }

    pub fn email(&self) -> &str {
        &self.email
    }

    pub fn status(&self) -> &DeliveryStatus {
        &self.status
    }

    pub fn is_sent(&self) -> bool {
        matches!(self.status, DeliveryStatus::Sent)
    }
}

/// 送信に失敗した宛先とその理由
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct RecipientError {
    pub email: String,
    pub error: String,
}

/// バッチ送信の集計結果
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct DispatchResult {
    pub total:  usize,
    pub sent:   usize,
    pub failed: usize,
    /// 失敗した宛先（送信順）
    pub errors: Vec<RecipientError>,
}

impl DispatchResult {
    /// 宛先ごとの結果を送信順に畳み込む
    pub fn from_outcomes(outcomes: &[RecipientOutcome]) -> Self {
        outcomes.iter().fold(
            Self {
                total:  0,
                sent:   0,
                failed: 0,
                errors: Vec::new(),
            },
            |mut acc, outcome| {
                acc.total += 1;
                match &outcome.status {
                    DeliveryStatus::Sent => acc.sent += 1,
                    DeliveryStatus::Failed(reason) => {
                        acc.failed += 1;
                        acc.errors.push(RecipientError {
                            email: outcome.email.clone(),
                            error: reason.clone(),
                        });
                    }
                }
                acc
            },
        )
    }

    /// バッチ全体の分類を返す
    pub fn classification(&self) -> BatchClassification {
        if self.total > 0 && self.sent == 0 {
            BatchClassification::AllFailed
        } else if self.failed > 0 {
            BatchClassification::PartialFailure
        } else {
            BatchClassification::AllSucceeded
        }
    }
}

/// バッチ全体の分類
///
/// 保存はせず、[`DispatchResult`] から都度計算する。
#[derive(Debug, Clone, Copy, PartialEq, Eq, IntoStaticStr, strum::Display)]
#[strum(serialize_all = "snake_case")]
pub enum BatchClassification {
    /// 全宛先に送信成功
    AllSucceeded,
    /// 一部の宛先のみ送信成功
    PartialFailure,
    /// 全宛先で送信失敗
    AllFailed,
}

#[cfg(test)]
mod tests {
    use pretty_assertions::assert_eq;
    use rstest::rstest;

    use super::*;

    fn assert_invariants(result: &DispatchResult) {
        assert_eq!(result.sent + result.failed, result.total);
        assert_eq!(result.errors.len(), result.failed);
    }

    #[test]
    fn test_全件成功を集計する() {
        let result = DispatchResult::from_outcomes(&[
            RecipientOutcome::sent("a@example.com"),
            RecipientOutcome::sent("b@example.com"),
            RecipientOutcome::sent("c@example.com"),
        ]);

        assert_eq!(
            result,
            DispatchResult {
                total:  3,
                sent:   3,
                failed: 0,
                errors: Vec::new(),
            }
        );
        assert_eq!(result.classification(), BatchClassification::AllSucceeded);
    }

    #[test]
    fn test_一部失敗を送信順に集計する() {
        let result = DispatchResult::from_outcomes(&[
            RecipientOutcome::sent("a@example.com"),
            RecipientOutcome::failed("b@example.com", "550 mailbox unavailable"),
            RecipientOutcome::sent("c@example.com"),
            RecipientOutcome::failed("d@example.com", "timeout"),
        ]);

        assert_invariants(&result);
        assert_eq!(result.sent, 2);
        assert_eq!(
            result.errors,
            vec![
                RecipientError {
                    email: "b@example.com".to_string(),
                    error: "550 mailbox unavailable".to_string(),
                },
                RecipientError {
                    email: "d@example.com".to_string(),
                    error: "timeout".to_string(),
                },
            ]
        );
        assert_eq!(
            result.classification(),
            BatchClassification::PartialFailure
        );
    }

    #[test]
    fn test_全件失敗はpartialではなくall_failed() {
        let result = DispatchResult::from_outcomes(&[
            RecipientOutcome::failed("a@example.com", "x"),
            RecipientOutcome::failed("b@example.com", "y"),
        ]);

        assert_invariants(&result);
        assert_eq!(result.sent, 0);
        assert_eq!(result.classification(), BatchClassification::AllFailed);
    }

    #[test]
    fn test_空の結果は失敗扱いにしない() {
        let result = DispatchResult::from_outcomes(&[]);

        assert_invariants(&result);
        assert_eq!(result.classification(), BatchClassification::AllSucceeded);
    }

    #[rstest]
    #[case(0, 5)]
    #[case(5, 0)]
    #[case(3, 7)]
    #[case(1, 1)]
    fn test_任意の組み合わせで不変条件が成り立つ(#[case] sent: usize, #[case] failed: usize) {
        let outcomes: Vec<_> = (0..sent)
            .map(|i| RecipientOutcome::sent(format!("ok{i}@example.com")))
            .chain((0..failed).map(|i| RecipientOutcome::failed(format!("ng{i}@example.com"), "err")))
            .collect();

        let result = DispatchResult::from_outcomes(&outcomes);

        assert_invariants(&result);
        assert_eq!(result.total, sent + failed);
    }

    #[test]
    fn test_serializeで結果のjson形状にする() {
        let result = DispatchResult::from_outcomes(&[
            RecipientOutcome::sent("a@example.com"),
            RecipientOutcome::failed("b@example.com", "rejected"),
        ]);

        assert_eq!(
            serde_json::to_value(&result).unwrap(),
            serde_json::json!({
                "total": 2,
                "sent": 1,
                "failed": 1,
                "errors": [{ "email": "b@example.com", "error": "rejected" }]
            })
        );
    }

    #[test]
    fn test_classificationのログ表現() {
        let label: &str = BatchClassification::PartialFailure.into();
        assert_eq!(label, "partial_failure");
    }
}
