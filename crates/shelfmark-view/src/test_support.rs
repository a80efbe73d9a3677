//! In-memory catalog backend for controller tests.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use shelfmark_client::{CatalogService, ClientError, Result};
use shelfmark_core::{
    Author, Book, BookDraft, BookPage, BookQuery, BookUpdate, Genre, LoginResponse, Role, Session,
    SessionStore, User,
};

pub fn user(role: Role) -> User {
    User {
        user_id: "u-1".to_string(),
        user_name: "ada".to_string(),
        email: "ada@example.org".to_string(),
        first_name: "Ada".to_string(),
        last_name: "Lovelace".to_string(),
        gender: "F".to_string(),
        role,
    }
}

/// An in-memory session already signed in as `role`.
pub fn signed_in(role: Role) -> Arc<SessionStore> {
    let store = SessionStore::in_memory();
    store
        .save(Session::from(LoginResponse {
            user: user(role),
            access_token: "token-123".to_string(),
            refresh_token: String::new(),
        }))
        .unwrap();
    Arc::new(store)
}

/// A book whose nested genre and author carry only their ids as names, the
/// way list responses abbreviate them.
pub fn book(id: &str, genre_id: &str, author_id: &str) -> Book {
    Book {
        id: id.to_string(),
        title: format!("Book {id}"),
        summary: String::new(),
        isbn: String::new(),
        published_on: "2001-01-01".to_string(),
        total_copies: 1,
        availability: "Available".to_string(),
        genre: Genre {
            id: genre_id.to_string(),
            name: genre_id.to_string(),
        },
        author: Author {
            id: author_id.to_string(),
            name: author_id.to_string(),
        },
    }
}

#[derive(Default)]
struct State {
    books: Vec<Book>,
    last_query: Option<BookQuery>,
    last_update: Option<BookUpdate>,
    fail_next: Option<ClientError>,
    fetch_delay: Option<Duration>,
    next_id: usize,
}

pub struct FakeCatalog {
    state: Mutex<State>,
    genres: Vec<Genre>,
    authors: Vec<Author>,
    fetches: AtomicUsize,
    mutations: AtomicUsize,
}

impl FakeCatalog {
    pub fn with_books(count: usize) -> Self {
        let books = (1..=count)
            .map(|i| book(&format!("b-{i}"), "g-1", "a-1"))
            .collect();
        Self {
            state: Mutex::new(State {
                books,
                next_id: count + 1,
                ..Default::default()
            }),
            genres: vec![
                Genre {
                    id: "g-1".to_string(),
                    name: "Fantasy".to_string(),
                },
                Genre {
                    id: "g-2".to_string(),
                    name: "Romance".to_string(),
                },
            ],
            authors: vec![
                Author {
                    id: "a-1".to_string(),
                    name: "Jane Austen".to_string(),
                },
                Author {
                    id: "a-2".to_string(),
                    name: "Ursula K. Le Guin".to_string(),
                },
            ],
            fetches: AtomicUsize::new(0),
            mutations: AtomicUsize::new(0),
        }
    }

    /// Make the next call of any kind fail with `err`.
    pub fn fail_next(&self, err: ClientError) {
        self.state.lock().unwrap().fail_next = Some(err);
    }

    /// Hold every page fetch for `delay` before answering.
    pub fn delay_fetches(&self, delay: Duration) {
        self.state.lock().unwrap().fetch_delay = Some(delay);
    }

    pub fn fetch_count(&self) -> usize {
        self.fetches.load(Ordering::SeqCst)
    }

    pub fn mutation_count(&self) -> usize {
        self.mutations.load(Ordering::SeqCst)
    }

    pub fn last_query(&self) -> Option<BookQuery> {
        self.state.lock().unwrap().last_query.clone()
    }

    pub fn last_update(&self) -> Option<BookUpdate> {
        self.state.lock().unwrap().last_update.clone()
    }

    fn check_failure(&self) -> Result<()> {
        match self.state.lock().unwrap().fail_next.take() {
            Some(err) => Err(err),
            None => Ok(()),
        }
    }

    fn resolve(&self, genre_id: &str, author_id: &str) -> Result<(Genre, Author)> {
        let genre = self
            .genres
            .iter()
            .find(|g| g.id == genre_id)
            .cloned()
            .ok_or_else(|| ClientError::Validation(format!("unknown genre {genre_id}")))?;
        let author = self
            .authors
            .iter()
            .find(|a| a.id == author_id)
            .cloned()
            .ok_or_else(|| ClientError::Validation(format!("unknown author {author_id}")))?;
        Ok((genre, author))
    }
}

#[async_trait]
impl CatalogService for FakeCatalog {
    async fn fetch_page(&self, query: &BookQuery) -> Result<BookPage> {
        self.fetches.fetch_add(1, Ordering::SeqCst);
        let delay = self.state.lock().unwrap().fetch_delay;
        if let Some(delay) = delay {
            tokio::time::sleep(delay).await;
        }
        self.check_failure()?;
        let mut state = self.state.lock().unwrap();
        state.last_query = Some(query.clone());

        let size = query.page_size.max(1) as usize;
        let start = (query.page.max(1) as usize - 1) * size;
        Ok(BookPage {
            page: query.page,
            page_size: query.page_size,
            total: state.books.len() as u64,
            items: state.books.iter().skip(start).take(size).cloned().collect(),
        })
    }

    async fn get_book(&self, id: &str) -> Result<Book> {
        self.check_failure()?;
        let state = self.state.lock().unwrap();
        state
            .books
            .iter()
            .find(|b| b.id == id)
            .cloned()
            .ok_or_else(|| ClientError::NotFound(String::new()))
    }

    async fn create_book(&self, draft: &BookDraft) -> Result<Book> {
        self.mutations.fetch_add(1, Ordering::SeqCst);
        self.check_failure()?;
        let (genre, author) = self.resolve(&draft.genre_id, &draft.author_id)?;
        let mut state = self.state.lock().unwrap();
        let id = format!("b-{}", state.next_id);
        state.next_id += 1;
        let created = Book {
            id,
            title: draft.title.clone(),
            summary: draft.summary.clone(),
            isbn: draft.isbn.clone(),
            published_on: draft.published_on.clone(),
            total_copies: draft.total_copies,
            availability: "Available".to_string(),
            genre,
            author,
        };
        state.books.push(created.clone());
        Ok(created)
    }

    async fn update_book(&self, update: &BookUpdate) -> Result<Book> {
        self.mutations.fetch_add(1, Ordering::SeqCst);
        self.check_failure()?;
        let (genre, author) = self.resolve(&update.genre_id, &update.author_id)?;
        let mut state = self.state.lock().unwrap();
        state.last_update = Some(update.clone());
        let slot = state
            .books
            .iter_mut()
            .find(|b| b.id == update.book_id)
            .ok_or_else(|| ClientError::NotFound(String::new()))?;
        slot.title = update.title.clone();
        slot.summary = update.summary.clone();
        slot.isbn = update.isbn.clone();
        slot.published_on = update.published_on.clone();
        slot.total_copies = update.total_copies;
        slot.genre = genre;
        slot.author = author;
        Ok(slot.clone())
    }

    async fn delete_book(&self, id: &str) -> Result<()> {
        self.mutations.fetch_add(1, Ordering::SeqCst);
        self.check_failure()?;
        let mut state = self.state.lock().unwrap();
        let before = state.books.len();
        state.books.retain(|b| b.id != id);
        if state.books.len() == before {
            return Err(ClientError::NotFound(String::new()));
        }
        Ok(())
    }

    async fn list_genres(&self) -> Result<Vec<Genre>> {
        self.check_failure()?;
        Ok(self.genres.clone())
    }

    async fn list_authors(&self) -> Result<Vec<Author>> {
        self.check_failure()?;
        Ok(self.authors.clone())
    }
}
