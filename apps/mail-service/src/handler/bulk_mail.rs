//! # 一斉送信ハンドラ
//!
//! ```text
//! POST /api/mail/send-bulk-email   (multipart/form-data)
//! ```
//!
//! | フィールド | 内容 |
//! |-----------|------|
//! | `recipients` | 宛先アドレスの JSON 配列（文字列） |
//! | `subject` | 件名 |
//! | `body` | テキスト本文 |
//! | `htmlBody` | HTML 本文（省略可） |
//! | `attachments` | 添付ファイル（0 個以上のファイルパート） |

use std::sync::Arc;

use axum::{
    Extension,
    extract::{Multipart, State, multipart::MultipartRejection},
    response::{IntoResponse, Response},
};
use bulkmail_domain::bulk_mail::{Attachment, RawSendRequest};

use crate::{
    auth::AuthenticatedCaller,
    error::{BulkMailResponse, MailServiceError},
    usecase::BulkMailUseCaseImpl,
};

/// 添付ファイル名が送られなかった場合の名前
const FALLBACK_ATTACHMENT_NAME: &str = "attachment";

/// 一斉送信ハンドラーの State
pub struct BulkMailState {
    pub usecase: BulkMailUseCaseImpl,
}

/// 一斉送信エンドポイント
pub async fn send_bulk_email(
    State(state): State<Arc<BulkMailState>>,
    Extension(caller): Extension<AuthenticatedCaller>,
    multipart: Result<Multipart, MultipartRejection>,
) -> Result<Response, MailServiceError> {
    let raw = read_form(multipart?).await?;

    let result = state.usecase.send_bulk_mail(raw, &caller).await?;

    let (status, body) = BulkMailResponse::from_result(result);
    Ok((status, body).into_response())
}

/// multipart ボディを未検証の送信リクエストに読み込む
///
/// 未知のフィールドは読み飛ばす。同名のテキストフィールドが複数ある場合は最後の値を使う。
async fn read_form(mut multipart: Multipart) -> Result<RawSendRequest, MailServiceError> {
    let mut raw = RawSendRequest::default();

    while let Some(field) = multipart.next_field().await? {
        let Some(name) = field.name().map(str::to_string) else {
            continue;
        };

        match name.as_str() {
            "recipients" => raw.recipients = Some(field.text().await?),
            "subject" => raw.subject = Some(field.text().await?),
            "body" => raw.body = Some(field.text().await?),
            "htmlBody" => raw.html_body = Some(field.text().await?),
            "attachments" => {
                let filename = field
                    .file_name()
                    .filter(|name| !name.is_empty())
                    .unwrap_or(FALLBACK_ATTACHMENT_NAME)
                    .to_string();
                let content_type = field.content_type().map(str::to_string);
                let content = field.bytes().await?;
                raw.attachments
                    .push(Attachment::new(filename, content_type, content));
            }
            _ => tracing::debug!(field = %name, "未知のフォームフィールドを無視"),
        }
    }

    Ok(raw)
}
