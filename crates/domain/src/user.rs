//! # 呼び出し元の識別情報
//!
//! 認証レイヤーが検証済みのトークンから取り出した呼び出し元の情報を表現する。
//! このクレートはトークンの検証を行わず、渡された識別情報を信頼する。

use derive_more::Display;

use crate::DomainError;

/// 送信者名が不明な場合の表示名
pub const DEFAULT_SENDER_NAME: &str = "System User";

/// ユーザー ID
///
/// 外部の ID ストアが採番する不透明な文字列。形式は解釈しない。
#[derive(Debug, Clone, PartialEq, Eq, Hash, Display)]
#[display("{_0}")]
pub struct UserId(String);

impl UserId {
    pub fn new(value: impl Into<String>) -> Self {
        Self(value.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

/// メールアドレス（値オブジェクト）
///
/// 呼び出し元やプロバイダが返したアカウントのアドレスに使用する。
/// 送信先（宛先）は個別の送信失敗として扱うため、この型では検証しない。
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Email(String);

impl Email {
    /// メールアドレスを作成する
    ///
    /// # バリデーション
    ///
    /// - 前後の空白を除いて空文字列ではない
    /// - `local@domain` の形式である
    /// - 最大 255 文字
    pub fn new(value: impl Into<String>) -> Result<Self, DomainError> {
        let value = value.into().trim().to_string();

        if value.is_empty() {
            return Err(DomainError::Validation(
                "メールアドレスは必須です".to_string(),
            ));
        }

        let Some((local, domain)) = value.split_once('@') else {
            return Err(DomainError::Validation(
                "メールアドレスの形式が不正です".to_string(),
            ));
        };

        if local.is_empty() || domain.is_empty() {
            return Err(DomainError::Validation(
                "メールアドレスの形式が不正です".to_string(),
            ));
        }

        if value.len() > 255 {
            return Err(DomainError::Validation(
                "メールアドレスは255文字以内である必要があります".to_string(),
            ));
        }

        Ok(Self(value))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Display for Email {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// 検証済みの呼び出し元
///
/// 送信者の表示名と返信先（Reply-To）はリクエスト入力ではなく、
/// この識別情報から導出する。
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CallerIdentity {
    pub user_id: UserId,
    pub email:   Option<Email>,
    pub name:    Option<String>,
}

impl CallerIdentity {
    pub fn new(user_id: UserId, email: Option<Email>, name: Option<String>) -> Self {
        Self {
            user_id,
            email,
            name,
        }
    }

    /// 送信者の表示名
    ///
    /// 名前が未設定または空白のみの場合は [`DEFAULT_SENDER_NAME`] を返す。
    pub fn display_name(&self) -> &str {
        self.name
            .as_deref()
            .map(str::trim)
            .filter(|name| !name.is_empty())
            .unwrap_or(DEFAULT_SENDER_NAME)
    }
}
