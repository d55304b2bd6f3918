use std::collections::HashSet;
use std::sync::Mutex;

use async_trait::async_trait;

use crate::domain::EmailAddress;
use crate::ports::auth_gate::{
    AuthGate as AuthGateTrait, Decision, PrivilegedAction, RequestContext, Result,
};

/// AuthGateの許可リスト実装
///
/// 司書として登録されたメールアドレスだけに特権操作を許可する。
/// 操作の種別は区別しない（司書は登録も貸出もできる）。
pub struct AuthGate {
    managers: Mutex<HashSet<EmailAddress>>,
}

impl AuthGate {
    pub fn new() -> Self {
        Self {
            managers: Mutex::new(HashSet::new()),
        }
    }

    /// 許可リストを与えて生成する
    pub fn with_managers(managers: impl IntoIterator<Item = EmailAddress>) -> Self {
        Self {
            managers: Mutex::new(managers.into_iter().collect()),
        }
    }

    /// 司書を追加する
    pub fn allow_manager(&self, email: EmailAddress) {
        self.managers.lock().unwrap().insert(email);
    }
}

impl Default for AuthGate {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl AuthGateTrait for AuthGate {
    /// 呼び出し元が許可リストに載っているかだけを確認する
    async fn check_capability(
        &self,
        ctx: &RequestContext,
        _action: PrivilegedAction,
    ) -> Result<Decision> {
        let allowed = ctx
            .staff_email
            .as_ref()
            .is_some_and(|email| self.managers.lock().unwrap().contains(email));

        Ok(if allowed {
            Decision::Allow
        } else {
            Decision::Deny
        })
    }
}
