//! # ペーシング付き逐次送信
//!
//! 検証済みのリクエストを宛先の順に 1 通ずつ送信する。
//! 宛先ごとの失敗はその場で記録し、残りの宛先への送信を続ける。

use std::sync::Arc;

use bulkmail_domain::bulk_mail::{DispatchResult, PacingPolicy, RecipientOutcome, SendRequest};
use bulkmail_infra::{MailTransport, Pacer};
use bulkmail_shared::{
    event_log::{
        error::{category, kind},
        event,
    },
    log_business_event,
};

/// 逐次送信器
pub struct Dispatcher {
    pacing: PacingPolicy,
    pacer:  Arc<dyn Pacer>,
}

impl Dispatcher {
    pub fn new(pacing: PacingPolicy, pacer: Arc<dyn Pacer>) -> Self {
        Self { pacing, pacer }
    }

    /// すべての宛先に送信し、結果を集計する
    ///
    /// 送信開始後は失敗しない。各宛先の結果は `RecipientOutcome` として記録され、
    /// 入力順のまま [`DispatchResult`] に畳み込まれる。
    pub async fn dispatch(
        &self,
        request: &SendRequest,
        transport: &dyn MailTransport,
    ) -> DispatchResult {
        let mut outcomes = Vec::with_capacity(request.recipients().len());

        for (index, recipient) in request.recipients().iter().enumerate() {
            if self.pacing.pause_before(index) {
                tracing::debug!(
                    index,
                    interval_ms = self.pacing.interval().as_millis() as u64,
                    "送信ペーシングのため待機"
                );
                self.pacer.pause(self.pacing.interval()).await;
            }

            let outcome = match transport.send(&request.mail_for(recipient)).await {
                Ok(()) => {
                    log_business_event!(
                        event.category = event::category::MAIL,
                        event.action = event::action::RECIPIENT_SENT,
                        event.result = event::result::SUCCESS,
                        recipient = %recipient,
                        "メールを送信"
                    );
                    RecipientOutcome::sent(recipient.as_str())
                }
                Err(e) => {
                    tracing::warn!(
                        error.category = category::EXTERNAL_SERVICE,
                        error.kind = kind::SMTP,
                        recipient = %recipient,
                        "メール送信に失敗: {e}"
                    );
                    log_business_event!(
                        event.category = event::category::MAIL,
                        event.action = event::action::RECIPIENT_FAILED,
                        event.result = event::result::FAILURE,
                        recipient = %recipient,
                        "メールを送信できません"
                    );
                    RecipientOutcome::failed(recipient.as_str(), e.to_string())
                }
            };
            outcomes.push(outcome);
        }

        DispatchResult::from_outcomes(&outcomes)
    }
}
