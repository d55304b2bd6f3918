use async_trait::async_trait;

use crate::domain::EmailAddress;

pub type Result<T> = std::result::Result<T, Box<dyn std::error::Error + Send + Sync>>;

/// 特権操作の種別
///
/// 書籍登録と貸出作成だけが権限確認の対象。
/// 返却と削除は対象外（意図的な非対称、DESIGN.md参照）。
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum PrivilegedAction {
    CreateBook,
    CreateLoan,
}

/// 権限確認の判定
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Decision {
    Allow,
    Deny,
}

/// リクエスト文脈
///
/// 特権操作を要求している職員の身元。認証そのものは外部の責務で、
/// ここでは検証済みの身元を運ぶだけ。
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RequestContext {
    pub staff_email: Option<EmailAddress>,
}

impl RequestContext {
    /// 身元不明の呼び出し元
    pub fn anonymous() -> Self {
        Self { staff_email: None }
    }

    /// 職員としての呼び出し元
    pub fn staff(email: EmailAddress) -> Self {
        Self {
            staff_email: Some(email),
        }
    }
}

/// 権限ゲートポート
///
/// 特権操作の前段で必ず呼ばれる。ストアへのアクセスより先に判定され、
/// Denyの場合は状態に一切触れない。
#[async_trait]
pub trait AuthGate: Send + Sync {
    /// 操作の実行可否を判定する
    async fn check_capability(
        &self,
        ctx: &RequestContext,
        action: PrivilegedAction,
    ) -> Result<Decision>;
}
