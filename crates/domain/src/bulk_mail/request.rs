//! # 送信リクエストの検証
//!
//! フォームから受け取った生の値を検証し、送信可能な [`SendRequest`] を組み立てる。
//! 検証は純粋関数で、I/O も送信も行わない。
//!
//! ## 検証順序
//!
//! 1. `recipients` が JSON の文字列配列であること（空配列・未指定は不可）
//! 2. `body` が空白除去後に空でないこと
//! 3. `subject` が空白除去後に空でないこと
//! 4. 添付ファイルが [`AttachmentPolicy`] を満たすこと
//!
//! 宛先の重複排除は行わない。同じアドレスが 2 回含まれていれば 2 回送信する。

use bytes::Bytes;
use serde_json::Value;
use thiserror::Error;

use crate::user::{CallerIdentity, Email};

/// 添付ファイル 1 件あたりの既定の上限（10 MiB）
pub const DEFAULT_MAX_ATTACHMENT_BYTES: usize = 10 * 1024 * 1024;

/// 1 リクエストあたりの既定の添付ファイル数上限
pub const DEFAULT_MAX_ATTACHMENTS: usize = 10;

/// 既定で許可する添付ファイルの Content-Type
pub const DEFAULT_ALLOWED_CONTENT_TYPES: &[&str] = &[
    "image/jpeg",
    "image/png",
    "image/gif",
    "application/pdf",
    "application/msword",
    "application/vnd.openxmlformats-officedocument.wordprocessingml.document",
];

/// 送信リクエストの入力エラー
///
/// Display の文言はそのままクライアントへのメッセージになる。
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ValidationError {
    #[error("invalid recipients format")]
    InvalidRecipientsFormat,

    #[error("recipients required")]
    RecipientsRequired,

    #[error("body cannot be empty")]
    EmptyBody,

    #[error("subject cannot be empty")]
    EmptySubject,

    #[error("too many attachments (max {max})")]
    TooManyAttachments { max: usize },

    #[error("attachment {filename} exceeds {max_bytes} bytes")]
    AttachmentTooLarge { filename: String, max_bytes: usize },

    #[error("attachment {filename} has unsupported type {content_type}")]
    UnsupportedAttachmentType {
        filename:     String,
        content_type: String,
    },
}

/// 添付ファイル
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Attachment {
    pub filename:     String,
    /// クライアントが申告した Content-Type（未申告なら `None`）
    pub content_type: Option<String>,
    pub content:      Bytes,
}

impl Attachment {
    pub fn new(
        filename: impl Into<String>,
        content_type: Option<String>,
        content: impl Into<Bytes>,
    ) -> Self {
        Self {
            filename: filename.into(),
            content_type,
            content: content.into(),
        }
    }

    /// パラメータを除いた小文字の MIME タイプ
    ///
    /// 未申告の場合は `application/octet-stream` とみなす。
    pub fn mime_type(&self) -> String {
        self.content_type
            .as_deref()
            .and_then(|ct| ct.split(';').next())
            .map(|ct| ct.trim().to_ascii_lowercase())
            .filter(|ct| !ct.is_empty())
            .unwrap_or_else(|| "application/octet-stream".to_string())
    }
}

/// 添付ファイルのサーバー側検証ポリシー
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AttachmentPolicy {
    pub max_file_bytes:        usize,
    pub max_files:             usize,
    /// 許可する MIME タイプ。空の場合はすべて許可する
    pub allowed_content_types: Vec<String>,
}

impl Default for AttachmentPolicy {
    fn default() -> Self {
        Self {
            max_file_bytes:        DEFAULT_MAX_ATTACHMENT_BYTES,
            max_files:             DEFAULT_MAX_ATTACHMENTS,
            allowed_content_types: DEFAULT_ALLOWED_CONTENT_TYPES
                .iter()
                .map(|ct| (*ct).to_string())
                .collect(),
        }
    }
}

impl AttachmentPolicy {
    /// 添付ファイル一覧がポリシーを満たすか検証する
    pub fn check(&self, attachments: &[Attachment]) -> Result<(), ValidationError> {
        if attachments.len() > self.max_files {
            return Err(ValidationError::TooManyAttachments {
                max: self.max_files,
            });
        }

        for attachment in attachments {
            if attachment.content.len() > self.max_file_bytes {
                return Err(ValidationError::AttachmentTooLarge {
                    filename:  attachment.filename.clone(),
                    max_bytes: self.max_file_bytes,
                });
            }

            let mime_type = attachment.mime_type();
            if !self.allowed_content_types.is_empty()
                && !self
                    .allowed_content_types
                    .iter()
                    .any(|allowed| allowed.eq_ignore_ascii_case(&mime_type))
            {
                return Err(ValidationError::UnsupportedAttachmentType {
                    filename:     attachment.filename.clone(),
                    content_type: mime_type,
                });
            }
        }

        Ok(())
    }
}

/// フォームから受け取った未検証の値
#[derive(Debug, Clone, Default)]
pub struct RawSendRequest {
    /// JSON エンコードされた宛先配列
    pub recipients:  Option<String>,
    pub subject:     Option<String>,
    pub body:        Option<String>,
    pub html_body:   Option<String>,
    pub attachments: Vec<Attachment>,
}

/// 送信者の表示情報
///
/// 呼び出し元の識別情報から導出する。リクエスト入力からは設定できない。
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SenderIdentity {
    pub display_name: String,
    pub reply_to:     Option<Email>,
}

impl From<&CallerIdentity> for SenderIdentity {
    fn from(caller: &CallerIdentity) -> Self {
        Self {
            display_name: caller.display_name().to_string(),
            reply_to:     caller.email.clone(),
        }
    }
}

/// 検証済みの送信リクエスト
///
/// 添付ファイルのバッファはこのリクエストが所有し、レスポンス生成後に解放される。
#[derive(Debug, Clone)]
pub struct SendRequest {
    recipients:  Vec<String>,
    subject:     String,
    body:        String,
    html_body:   String,
    attachments: Vec<Attachment>,
    sender:      SenderIdentity,
}

impl SendRequest {
    /// 生の入力を検証して送信リクエストを組み立てる
    pub fn validate(
        raw: RawSendRequest,
        caller: &CallerIdentity,
        policy: &AttachmentPolicy,
    ) -> Result<Self, ValidationError> {
        let recipients = parse_recipients(raw.recipients.as_deref())?;

        let body = raw
            .body
            .filter(|body| !body.trim().is_empty())
            .ok_or(ValidationError::EmptyBody)?;

        let subject = raw
            .subject
            .filter(|subject| !subject.trim().is_empty())
            .ok_or(ValidationError::EmptySubject)?;

        policy.check(&raw.attachments)?;

        let html_body = raw
            .html_body
            .filter(|html| !html.is_empty())
            .unwrap_or_else(|| default_html_body(&body));

        Ok(Self {
            recipients,
            subject,
            body,
            html_body,
            attachments: raw.attachments,
            sender: SenderIdentity::from(caller),
        })
    }

    pub fn recipients(&self) -> &[String] {
        &self.recipients
    }

    pub fn subject(&self) -> &str {
        &self.subject
    }

    pub fn body(&self) -> &str {
        &self.body
    }

    pub fn html_body(&self) -> &str {
        &self.html_body
    }

    pub fn attachments(&self) -> &[Attachment] {
        &self.attachments
    }

    pub fn sender(&self) -> &SenderIdentity {
        &self.sender
    }

    /// 指定した宛先向けの送信メールを組み立てる
    pub fn mail_for<'a>(&'a self, recipient: &'a str) -> OutgoingMail<'a> {
        OutgoingMail {
            to:          recipient,
            subject:     &self.subject,
            text_body:   &self.body,
            html_body:   &self.html_body,
            attachments: &self.attachments,
            sender:      &self.sender,
        }
    }
}

/// 宛先 1 件分の送信メール
///
/// 本文と添付ファイルは [`SendRequest`] から借用し、宛先ごとに複製しない。
#[derive(Debug, Clone, Copy)]
pub struct OutgoingMail<'a> {
    pub to:          &'a str,
    pub subject:     &'a str,
    pub text_body:   &'a str,
    pub html_body:   &'a str,
    pub attachments: &'a [Attachment],
    pub sender:      &'a SenderIdentity,
}

/// 宛先フィールドを JSON の文字列配列としてパースする
fn parse_recipients(raw: Option<&str>) -> Result<Vec<String>, ValidationError> {
    let raw = raw
        .map(str::trim)
        .filter(|raw| !raw.is_empty())
        .ok_or(ValidationError::RecipientsRequired)?;

    let value: Value =
        serde_json::from_str(raw).map_err(|_| ValidationError::InvalidRecipientsFormat)?;

    let Value::Array(items) = value else {
        return Err(ValidationError::RecipientsRequired);
    };

    if items.is_empty() {
        return Err(ValidationError::RecipientsRequired);
    }

    items
        .into_iter()
        .map(|item| match item {
            Value::String(address) => Ok(address),
            _ => Err(ValidationError::InvalidRecipientsFormat),
        })
        .collect()
}

/// HTML 本文が未指定の場合の既定値（改行を `<br>` に変換）
fn default_html_body(body: &str) -> String {
    body.replace('\n', "<br>")
}
