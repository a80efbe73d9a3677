use serde::{Deserialize, Serialize};

use crate::error::{Result, ShelfmarkError};
use crate::isbn::Isbn;

/// A genre as returned by the reference-list endpoint and nested in books.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Genre {
    #[serde(rename = "genreId", alias = "id")]
    pub id: String,
    pub name: String,
}

/// An author as returned by the reference-list endpoint and nested in books.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Author {
    #[serde(rename = "authorId", alias = "id")]
    pub id: String,
    pub name: String,
}

/// A catalog record. Identity is `id`; everything else is payload.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Book {
    #[serde(rename = "bookId", alias = "id")]
    pub id: String,
    pub title: String,
    #[serde(default)]
    pub summary: String,
    #[serde(default)]
    pub isbn: String,
    #[serde(default)]
    pub published_on: String,
    #[serde(default)]
    pub total_copies: u32,
    #[serde(default)]
    pub availability: String,
    pub genre: Genre,
    pub author: Author,
}

impl Book {
    /// Year component of `published_on`, if it contains one.
    pub fn published_year(&self) -> Option<i32> {
        parse_year(&self.published_on)
    }

    pub fn is_available(&self) -> bool {
        self.availability.eq_ignore_ascii_case("available")
    }
}

/// Payload for `POST /books`.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BookDraft {
    pub title: String,
    pub summary: String,
    pub isbn: String,
    pub published_on: String,
    pub total_copies: u32,
    pub genre_id: String,
    pub author_id: String,
}

impl BookDraft {
    /// Check required fields and normalise the ISBN to its 13-digit form.
    pub fn validate(&mut self) -> Result<()> {
        if self.title.trim().is_empty() {
            return Err(ShelfmarkError::Validation("Title cannot be empty".to_string()));
        }
        if self.genre_id.trim().is_empty() {
            return Err(ShelfmarkError::Validation("Please select a genre".to_string()));
        }
        if self.author_id.trim().is_empty() {
            return Err(ShelfmarkError::Validation("Please select an author".to_string()));
        }
        if !self.isbn.trim().is_empty() {
            self.isbn = Isbn::parse(&self.isbn)?.isbn13;
        }
        if !self.published_on.trim().is_empty() && parse_year(&self.published_on).is_none() {
            return Err(ShelfmarkError::Validation(format!(
                "Invalid publication date: {}",
                self.published_on
            )));
        }
        self.title = self.title.trim().to_string();
        Ok(())
    }
}

/// Payload for `PUT /books`: the id plus the same scalar fields as a draft.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BookUpdate {
    pub book_id: String,
    pub title: String,
    pub summary: String,
    pub isbn: String,
    pub published_on: String,
    pub total_copies: u32,
    pub genre_id: String,
    pub author_id: String,
}

impl From<&Book> for BookUpdate {
    fn from(book: &Book) -> Self {
        Self {
            book_id: book.id.clone(),
            title: book.title.clone(),
            summary: book.summary.clone(),
            isbn: book.isbn.clone(),
            published_on: book.published_on.clone(),
            total_copies: book.total_copies,
            genre_id: book.genre.id.clone(),
            author_id: book.author.id.clone(),
        }
    }
}

/// First run of four ASCII digits in a date-like string.
fn parse_year(input: &str) -> Option<i32> {
    input.as_bytes().windows(4).find_map(|w| {
        if w.iter().all(u8::is_ascii_digit) {
            std::str::from_utf8(w).ok()?.parse::<i32>().ok()
        } else {
            None
        }
    })
}
