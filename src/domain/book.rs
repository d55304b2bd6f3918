use serde::{Deserialize, Serialize};

use super::{BookId, CopyCounts, Isbn};

/// Book集約 - 蔵書1タイトル分の書誌情報と冊数
///
/// ISBNで一意に識別され、get-or-createで登録される。
/// 冊数（counts）は在庫台帳だけが増減させる。
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Book {
    pub book_id: BookId,
    pub isbn: Isbn,
    pub name: String,
    pub author: String,
    pub genre: String,
    pub cover: String,
    #[serde(flatten)]
    pub counts: CopyCounts,
}

/// 新規登録する書籍の内容
///
/// IDと貸出可能数はまだ持たない。登録時に全冊が棚にある状態で始まる。
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewBook {
    pub isbn: Isbn,
    pub name: String,
    pub author: String,
    pub genre: String,
    pub cover: String,
    pub total: u32,
}

/// 純粋関数：新規書籍を受け入れる
///
/// 全冊が貸出可能な状態のBookを生成する。副作用なし。
pub fn accept_book(new_book: NewBook) -> Book {
    Book {
        book_id: BookId::new(),
        isbn: new_book.isbn,
        name: new_book.name,
        author: new_book.author,
        genre: new_book.genre,
        cover: new_book.cover,
        counts: CopyCounts::new(new_book.total),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample_new_book() -> NewBook {
        NewBook {
            isbn: Isbn::parse("978-0-14-044926-6").unwrap(),
            name: "Crime and Punishment".to_string(),
            author: "Fyodor Dostoevsky".to_string(),
            genre: "Novel".to_string(),
            cover: "https://covers.example.com/cp.jpg".to_string(),
            total: 4,
        }
    }

    #[test]
    fn test_accept_book_starts_fully_available() {
        let book = accept_book(sample_new_book());

        assert_eq!(book.counts.total(), 4);
        assert_eq!(book.counts.available(), 4);
        assert_eq!(book.isbn.as_str(), "978-0-14-044926-6");
    }

    #[test]
    fn test_accept_book_assigns_fresh_ids() {
        let first = accept_book(sample_new_book());
        let second = accept_book(sample_new_book());

        assert_ne!(first.book_id, second.book_id);
    }
}
