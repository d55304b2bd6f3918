use serde::{Deserialize, Serialize};

use super::{EmailAddress, UserId};

/// User集約 - 貸出の借り手
///
/// 利用者の登録・管理は別コンテキストの責務。
/// 貸出管理からは読み取り専用で、メールアドレスで解決される。
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct User {
    pub user_id: UserId,
    pub email: EmailAddress,
}
