/// 返却のエラー
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CloseLoanError {
    /// 既に返却済み
    AlreadyReturned,
}
