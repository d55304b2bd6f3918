use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// 書籍ID - 蔵書カタログの集約ID
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct BookId(Uuid);

impl BookId {
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }

    pub fn from_uuid(uuid: Uuid) -> Self {
        Self(uuid)
    }

    pub fn value(&self) -> Uuid {
        self.0
    }
}

impl Default for BookId {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Display for BookId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        self.0.fmt(f)
    }
}

/// 利用者ID - 利用者管理コンテキストへの参照
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct UserId(Uuid);

impl UserId {
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }

    pub fn from_uuid(uuid: Uuid) -> Self {
        Self(uuid)
    }

    pub fn value(&self) -> Uuid {
        self.0
    }
}

impl Default for UserId {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Display for UserId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        self.0.fmt(f)
    }
}

/// 貸出ID - 貸出記録の集約ID
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct LoanId(Uuid);

impl LoanId {
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }

    pub fn from_uuid(uuid: Uuid) -> Self {
        Self(uuid)
    }

    pub fn value(&self) -> Uuid {
        self.0
    }
}

impl Default for LoanId {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Display for LoanId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        self.0.fmt(f)
    }
}

/// メールアドレスのエラー
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum EmailAddressError {
    /// 空文字列
    Blank,
    /// `@` を含まない
    MissingAtSign,
}

/// 利用者のメールアドレス
///
/// 貸出・返却リクエストで利用者を特定するキー。
/// 厳密なRFC検証はしない（利用者登録は外部コンテキストの責務）。
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct EmailAddress(String);

impl EmailAddress {
    /// 入力文字列からメールアドレスを生成する
    ///
    /// 前後の空白は取り除く。空文字列と `@` を含まない値は拒否する。
    pub fn parse(raw: &str) -> Result<Self, EmailAddressError> {
        let trimmed = raw.trim();
        if trimmed.is_empty() {
            return Err(EmailAddressError::Blank);
        }
        if !trimmed.contains('@') {
            return Err(EmailAddressError::MissingAtSign);
        }
        Ok(Self(trimmed.to_string()))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Display for EmailAddress {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

/// ISBNのエラー
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum IsbnError {
    /// 空文字列
    Blank,
}

/// ISBN - 書籍の一意キー
///
/// get-or-createの突き合わせに使うだけなので、
/// チェックディジットまでは検証しない。
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Isbn(String);

impl Isbn {
    pub fn parse(raw: &str) -> Result<Self, IsbnError> {
        let trimmed = raw.trim();
        if trimmed.is_empty() {
            return Err(IsbnError::Blank);
        }
        Ok(Self(trimmed.to_string()))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Display for Isbn {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

/// 冊数のエラー
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CopyCountError {
    /// 貸出可能な冊数が残っていない
    Depleted,
    /// 貸出可能数が所蔵数を超える
    ExceedsTotal,
}

/// 蔵書の冊数 - 所蔵数と貸出可能数の組
///
/// 不変条件: 0 <= available <= total
/// フィールドを非公開にし、この制約を破る値を作成できないようにする。
/// 貸出・返却による増減はこの型の遷移メソッドだけが行う。
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct CopyCounts {
    total: u32,
    available: u32,
}

impl CopyCounts {
    /// 新規受け入れ時の冊数（全冊貸出可能）
    pub fn new(total: u32) -> Self {
        Self {
            total,
            available: total,
        }
    }

    /// 永続化済みの値から復元する
    ///
    /// # エラー
    /// available > total の場合は`CopyCountError::ExceedsTotal`を返す
    pub fn from_parts(total: u32, available: u32) -> Result<Self, CopyCountError> {
        if available > total {
            return Err(CopyCountError::ExceedsTotal);
        }
        Ok(Self { total, available })
    }

    /// 1冊を貸出に引き当てる
    ///
    /// # エラー
    /// 貸出可能数が0の場合は`CopyCountError::Depleted`を返す
    pub fn reserve(self) -> Result<Self, CopyCountError> {
        if self.available == 0 {
            return Err(CopyCountError::Depleted);
        }
        Ok(Self {
            total: self.total,
            available: self.available - 1,
        })
    }

    /// 返却された1冊を棚に戻す
    ///
    /// # エラー
    /// 既に全冊が棚にある場合は`CopyCountError::ExceedsTotal`を返す。
    /// 引き当ての記録なしに返却された、つまり冊数と貸出記録が
    /// 食い違っていることを意味するため、黙って切り詰めない。
    pub fn release(self) -> Result<Self, CopyCountError> {
        if self.available >= self.total {
            return Err(CopyCountError::ExceedsTotal);
        }
        Ok(Self {
            total: self.total,
            available: self.available + 1,
        })
    }

    /// 所蔵数
    pub fn total(&self) -> u32 {
        self.total
    }

    /// 貸出可能数
    pub fn available(&self) -> u32 {
        self.available
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    // TDD: CopyCounts のテスト
    #[test]
    fn test_copy_counts_new_starts_fully_available() {
        let counts = CopyCounts::new(3);
        assert_eq!(counts.total(), 3);
        assert_eq!(counts.available(), 3);
    }

    #[test]
    fn test_copy_counts_reserve_decrements_available() {
        let counts = CopyCounts::new(2).reserve().unwrap();
        assert_eq!(counts.total(), 2);
        assert_eq!(counts.available(), 1);
    }

    #[test]
    fn test_copy_counts_reserve_fails_when_depleted() {
        let counts = CopyCounts::new(1).reserve().unwrap();
        assert_eq!(counts.available(), 0);

        let result = counts.reserve();
        assert_eq!(result.unwrap_err(), CopyCountError::Depleted);
    }

    #[test]
    fn test_copy_counts_zero_total_is_immediately_depleted() {
        let counts = CopyCounts::new(0);
        assert_eq!(counts.reserve().unwrap_err(), CopyCountError::Depleted);
    }

    #[test]
    fn test_copy_counts_release_restores_available() {
        let counts = CopyCounts::new(2).reserve().unwrap().release().unwrap();
        assert_eq!(counts.available(), 2);
    }

    #[test]
    fn test_copy_counts_release_fails_at_full_stock() {
        let counts = CopyCounts::new(2);
        assert_eq!(counts.release().unwrap_err(), CopyCountError::ExceedsTotal);
    }

    #[test]
    fn test_copy_counts_from_parts_accepts_valid_pair() {
        let counts = CopyCounts::from_parts(5, 2).unwrap();
        assert_eq!(counts.total(), 5);
        assert_eq!(counts.available(), 2);
    }

    #[test]
    fn test_copy_counts_from_parts_rejects_available_over_total() {
        let result = CopyCounts::from_parts(2, 3);
        assert_eq!(result.unwrap_err(), CopyCountError::ExceedsTotal);
    }

    // TDD: EmailAddress のテスト
    #[test]
    fn test_email_address_parse_trims_whitespace() {
        let email = EmailAddress::parse("  reader@example.com ").unwrap();
        assert_eq!(email.as_str(), "reader@example.com");
    }

    #[test]
    fn test_email_address_parse_rejects_blank() {
        assert_eq!(
            EmailAddress::parse("   ").unwrap_err(),
            EmailAddressError::Blank
        );
    }

    #[test]
    fn test_email_address_parse_rejects_missing_at_sign() {
        assert_eq!(
            EmailAddress::parse("reader.example.com").unwrap_err(),
            EmailAddressError::MissingAtSign
        );
    }

    // TDD: Isbn のテスト
    #[test]
    fn test_isbn_parse_accepts_non_blank() {
        let isbn = Isbn::parse("978-4-00-310101-8").unwrap();
        assert_eq!(isbn.as_str(), "978-4-00-310101-8");
    }

    #[test]
    fn test_isbn_parse_rejects_blank() {
        assert_eq!(Isbn::parse("").unwrap_err(), IsbnError::Blank);
    }

    // ID value objects のテスト
    #[test]
    fn test_ids_are_unique() {
        assert_ne!(BookId::new(), BookId::new());
        assert_ne!(UserId::new(), UserId::new());
        assert_ne!(LoanId::new(), LoanId::new());
    }

    #[test]
    fn test_ids_round_trip_through_uuid() {
        let uuid = Uuid::new_v4();
        assert_eq!(BookId::from_uuid(uuid).value(), uuid);
        assert_eq!(UserId::from_uuid(uuid).value(), uuid);
        assert_eq!(LoanId::from_uuid(uuid).value(), uuid);
    }
}
