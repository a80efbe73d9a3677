//! Catalog list state: filters, sorting, paging and debounced search over the
//! remote book collection, with optimistic reconciliation of local edits.

use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

use shelfmark_client::{CatalogService, ClientError, Result};
use shelfmark_core::{
    AppConfig, Author, Availability, Book, BookDraft, BookPage, BookQuery, BookUpdate, FilterSet,
    Genre, PageWindow, ResultPage, Role, ShelfmarkError, SortColumn, SortSpec, VISIBLE_PAGES,
    page_numbers,
};
use tracing::{debug, warn};

use crate::debounce::Debouncer;

/// Tunables for a [`CollectionController`].
#[derive(Debug, Clone, Copy)]
pub struct CollectionOptions {
    pub page_size: u32,
    pub visible_pages: u32,
    pub search_debounce: Duration,
}

impl Default for CollectionOptions {
    fn default() -> Self {
        Self {
            page_size: 10,
            visible_pages: VISIBLE_PAGES,
            search_debounce: Duration::from_millis(300),
        }
    }
}

impl From<&AppConfig> for CollectionOptions {
    fn from(config: &AppConfig) -> Self {
        Self {
            page_size: config.catalog.page_size,
            visible_pages: config.catalog.visible_pages,
            search_debounce: config.search_debounce(),
        }
    }
}

/// A fetch that has been issued but not yet settled. Counts towards
/// [`CollectionController::is_loading`] until settled or dropped.
#[derive(Debug)]
pub struct FetchTicket {
    pub seq: u64,
    pub query: BookQuery,
    _pending: Pending,
}

#[derive(Debug)]
struct Pending(Arc<AtomicUsize>);

impl Pending {
    fn new(counter: &Arc<AtomicUsize>) -> Self {
        counter.fetch_add(1, Ordering::SeqCst);
        Self(Arc::clone(counter))
    }
}

impl Drop for Pending {
    fn drop(&mut self) {
        self.0.fetch_sub(1, Ordering::SeqCst);
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FetchOutcome {
    /// The response became the current result page.
    Applied,
    /// A newer fetch had already settled; the response was dropped.
    Stale,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SelectionMode {
    View,
    Edit,
    Delete,
}

/// The single item currently open for viewing, editing or deletion.
#[derive(Debug, Clone, PartialEq)]
pub struct Selection {
    pub mode: SelectionMode,
    pub book: Book,
}

pub struct CollectionController {
    catalog: Arc<dyn CatalogService>,
    role: Role,
    visible_pages: u32,

    filters: FilterSet,
    sort: SortSpec,
    window: PageWindow,
    result: Option<BookPage>,

    selection: Option<Selection>,
    draft: Option<BookDraft>,
    genres: Vec<Genre>,
    authors: Vec<Author>,

    search: Debouncer<String>,

    next_seq: u64,
    settled_seq: u64,
    in_flight: Arc<AtomicUsize>,
    error: Option<String>,
}

impl std::fmt::Debug for CollectionController {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CollectionController")
            .field("role", &self.role)
            .field("filters", &self.filters)
            .field("sort", &self.sort)
            .field("window", &self.window)
            .field("settled_seq", &self.settled_seq)
            .field("in_flight", &self.in_flight.load(Ordering::SeqCst))
            .finish_non_exhaustive()
    }
}

impl CollectionController {
    /// Must be called inside a tokio runtime (the search debouncer spawns a task).
    pub fn new(catalog: Arc<dyn CatalogService>, role: Role, options: CollectionOptions) -> Self {
        Self {
            catalog,
            role,
            visible_pages: options.visible_pages,
            filters: FilterSet::default(),
            sort: SortSpec::default(),
            window: PageWindow::new(options.page_size),
            result: None,
            selection: None,
            draft: None,
            genres: Vec::new(),
            authors: Vec::new(),
            search: Debouncer::new(options.search_debounce),
            next_seq: 0,
            settled_seq: 0,
            in_flight: Arc::new(AtomicUsize::new(0)),
            error: None,
        }
    }

    // ─── Read access ───────────────────────────────────────

    pub fn catalog(&self) -> Arc<dyn CatalogService> {
        Arc::clone(&self.catalog)
    }

    pub fn role(&self) -> Role {
        self.role
    }

    pub fn can_manage(&self) -> bool {
        self.role.can_manage_catalog()
    }

    pub fn filters(&self) -> &FilterSet {
        &self.filters
    }

    pub fn sort_spec(&self) -> &SortSpec {
        &self.sort
    }

    pub fn window(&self) -> &PageWindow {
        &self.window
    }

    pub fn result(&self) -> Option<&BookPage> {
        self.result.as_ref()
    }

    pub fn items(&self) -> &[Book] {
        self.result.as_ref().map_or(&[], |p| p.items.as_slice())
    }

    pub fn total_pages(&self) -> u32 {
        self.window.total_pages()
    }

    /// Page links to offer around the current page.
    pub fn page_numbers(&self) -> Vec<u32> {
        page_numbers(self.window.page, self.window.total_pages(), self.visible_pages)
    }

    pub fn selection(&self) -> Option<&Selection> {
        self.selection.as_ref()
    }

    pub fn genres(&self) -> &[Genre] {
        &self.genres
    }

    pub fn authors(&self) -> &[Author] {
        &self.authors
    }

    pub fn draft(&self) -> Option<&BookDraft> {
        self.draft.as_ref()
    }

    pub fn draft_mut(&mut self) -> Option<&mut BookDraft> {
        self.draft.as_mut()
    }

    /// Last user-facing error, cleared by the next successful operation.
    pub fn error(&self) -> Option<&str> {
        self.error.as_deref()
    }

    pub fn is_loading(&self) -> bool {
        self.in_flight.load(Ordering::SeqCst) > 0
    }

    fn report(&mut self, err: ClientError) -> ClientError {
        warn!(error = %err, "catalog operation failed");
        self.error = Some(err.user_message());
        err
    }

    // ─── Fetching ──────────────────────────────────────────

    /// Snapshot the current parameters under a fresh sequence number.
    pub fn begin_fetch(&mut self) -> FetchTicket {
        let query = BookQuery::new(&self.filters, &self.sort, &self.window);
        self.issue(query)
    }

    fn issue(&mut self, query: BookQuery) -> FetchTicket {
        self.next_seq += 1;
        FetchTicket {
            seq: self.next_seq,
            query,
            _pending: Pending::new(&self.in_flight),
        }
    }

    /// Settle a fetch. Responses older than the last settled fetch are
    /// dropped, whether they succeeded or failed. A failure keeps the
    /// previous result page.
    pub fn complete_fetch(
        &mut self,
        ticket: FetchTicket,
        result: Result<BookPage>,
    ) -> Result<FetchOutcome> {
        let seq = ticket.seq;
        drop(ticket);
        if seq <= self.settled_seq {
            debug!(
                seq,
                settled = self.settled_seq,
                "discarding stale catalog response"
            );
            return Ok(FetchOutcome::Stale);
        }
        self.settled_seq = seq;

        match result {
            Ok(page) => {
                self.window.total = page.total;
                self.window.page = page.page.max(1);
                if page.page_size > 0 {
                    self.window.page_size = page.page_size;
                }
                self.result = Some(page);
                self.error = None;
                Ok(FetchOutcome::Applied)
            }
            Err(e) => Err(self.report(e)),
        }
    }

    /// Fetch the page described by the current filters, sort and window.
    pub async fn apply_filters(&mut self) -> Result<FetchOutcome> {
        self.fetch_with(self.filters.clone(), self.sort, self.window.page)
            .await
    }

    /// Fetch with the given parameters and adopt them once the response is
    /// in. Dropping the future before then leaves the controller untouched.
    async fn fetch_with(
        &mut self,
        filters: FilterSet,
        sort: SortSpec,
        page: u32,
    ) -> Result<FetchOutcome> {
        let window = PageWindow { page, ..self.window };
        let ticket = self.issue(BookQuery::new(&filters, &sort, &window));
        let result = self.catalog.fetch_page(&ticket.query).await;

        self.filters = filters;
        self.sort = sort;
        self.window.page = page;
        self.complete_fetch(ticket, result)
    }

    /// Replace filters, sort and page without fetching.
    pub fn set_query(&mut self, filters: FilterSet, sort: SortSpec, page: u32) {
        self.filters = filters;
        self.sort = sort;
        self.window.page = page.max(1);
    }

    pub async fn set_filters(&mut self, filters: FilterSet) -> Result<FetchOutcome> {
        self.fetch_with(filters, self.sort, 1).await
    }

    pub async fn set_author_filter(&mut self, author: Option<String>) -> Result<FetchOutcome> {
        let filters = FilterSet {
            author,
            ..self.filters.clone()
        };
        self.set_filters(filters).await
    }

    pub async fn set_year_filter(&mut self, year: Option<i32>) -> Result<FetchOutcome> {
        let filters = FilterSet {
            published_year: year,
            ..self.filters.clone()
        };
        self.set_filters(filters).await
    }

    pub async fn set_availability_filter(
        &mut self,
        availability: Option<Availability>,
    ) -> Result<FetchOutcome> {
        let filters = FilterSet {
            availability,
            ..self.filters.clone()
        };
        self.set_filters(filters).await
    }

    /// Reset every predicate, including a search still being typed.
    pub async fn clear_filters(&mut self) -> Result<FetchOutcome> {
        self.search.cancel();
        self.set_filters(FilterSet::default()).await
    }

    // ─── Search ────────────────────────────────────────────

    /// Feed a raw keystroke-level search value into the debouncer.
    pub fn on_search_input(&self, term: impl Into<String>) {
        self.search.push(term.into());
    }

    /// Wait for typing to settle. Cancel-safe, so it can sit in a
    /// `tokio::select!` loop; pass the term to [`Self::commit_search`].
    pub async fn next_search_term(&mut self) -> Option<String> {
        self.search.next().await
    }

    /// Wait for typing to settle, then commit the term and fetch once.
    ///
    /// Dropped mid-fetch, the settled term is lost but the filters, page and
    /// loading state are left as they were. Select loops should use
    /// [`Self::next_search_term`] instead.
    pub async fn next_search_commit(&mut self) -> Option<Result<FetchOutcome>> {
        let term = self.next_search_term().await?;
        Some(self.commit_search(term).await)
    }

    /// Commit a search term immediately, bypassing the debouncer.
    pub async fn commit_search(&mut self, term: String) -> Result<FetchOutcome> {
        debug!(term = %term, "committing search");
        let filters = FilterSet {
            search: Some(term).filter(|t| !t.trim().is_empty()),
            ..self.filters.clone()
        };
        self.set_filters(filters).await
    }

    // ─── Sorting & paging ──────────────────────────────────

    pub async fn sort(&mut self, column: SortColumn) -> Result<FetchOutcome> {
        let mut sort = self.sort;
        sort.toggle(column);
        self.fetch_with(self.filters.clone(), sort, 1).await
    }

    /// Navigate to `page`. Callers offer only pages from [`Self::page_numbers`].
    pub async fn on_page_change(&mut self, page: u32) -> Result<FetchOutcome> {
        self.fetch_with(self.filters.clone(), self.sort, page).await
    }

    // ─── Reference lists ───────────────────────────────────

    pub async fn load_references(&mut self) -> Result<()> {
        let loaded = tokio::try_join!(self.catalog.list_genres(), self.catalog.list_authors());
        match loaded {
            Ok((genres, authors)) => {
                self.genres = genres;
                self.authors = authors;
                Ok(())
            }
            Err(e) => Err(self.report(e)),
        }
    }

    /// Point the book's genre and author at the canonical entries of the
    /// loaded reference lists, matched by id.
    pub fn reconcile_references(&self, book: &mut Book) {
        match self.genres.iter().find(|g| g.id == book.genre.id) {
            Some(genre) => book.genre = genre.clone(),
            None if !self.genres.is_empty() => {
                debug!(genre = %book.genre.id, "genre not in reference list")
            }
            None => {}
        }
        match self.authors.iter().find(|a| a.id == book.author.id) {
            Some(author) => book.author = author.clone(),
            None if !self.authors.is_empty() => {
                debug!(author = %book.author.id, "author not in reference list")
            }
            None => {}
        }
    }

    // ─── Mutations ─────────────────────────────────────────

    fn ensure_can_manage(&mut self) -> Result<()> {
        if self.can_manage() {
            return Ok(());
        }
        Err(self.report(ClientError::Forbidden(
            "Only librarians and administrators can change the catalog.".to_string(),
        )))
    }

    fn sync_total(&mut self) {
        if let Some(page) = &self.result {
            self.window.total = page.total;
        }
    }

    /// Create on the server, then append the returned book locally without a re-fetch.
    pub async fn create_item(&mut self, draft: BookDraft) -> Result<Book> {
        self.ensure_can_manage()?;
        let book = match self.catalog.create_book(&draft).await {
            Ok(book) => book,
            Err(e) => return Err(self.report(e)),
        };

        match &mut self.result {
            Some(page) => {
                if !page.insert_created(book.clone()) {
                    warn!(id = %book.id, "created book was already on the page");
                }
            }
            None => self.result = Some(ResultPage::single(book.clone())),
        }
        self.sync_total();
        self.error = None;
        Ok(book)
    }

    /// Update on the server, then replace the matching book in place.
    pub async fn update_item(&mut self, book: &Book) -> Result<Book> {
        self.ensure_can_manage()?;
        let updated = match self.catalog.update_book(&BookUpdate::from(book)).await {
            Ok(updated) => updated,
            Err(e) => return Err(self.report(e)),
        };

        if let Some(page) = &mut self.result {
            if !page.replace(updated.clone()) {
                debug!(id = %updated.id, "updated book is not on the current page");
            }
        }
        self.error = None;
        Ok(updated)
    }

    /// Delete on the server, then drop the book locally and shrink the total.
    pub async fn delete_item(&mut self, id: &str) -> Result<()> {
        self.ensure_can_manage()?;
        if let Err(e) = self.catalog.delete_book(id).await {
            return Err(self.report(e));
        }

        if let Some(page) = &mut self.result {
            page.remove(id);
        }
        self.sync_total();
        self.window.clamp();
        if self.selection.as_ref().is_some_and(|s| s.book.id == id) {
            self.selection = None;
        }
        self.error = None;
        Ok(())
    }

    // ─── Selection ─────────────────────────────────────────

    fn open(&mut self, id: &str, mode: SelectionMode) -> Option<&Selection> {
        let mut book = self.result.as_ref()?.get(id)?.clone();
        if mode == SelectionMode::Edit {
            self.reconcile_references(&mut book);
        }
        self.selection = Some(Selection { mode, book });
        self.selection.as_ref()
    }

    pub fn view_item(&mut self, id: &str) -> Option<&Selection> {
        self.open(id, SelectionMode::View)
    }

    /// Open a working copy for editing with references re-pointed to the
    /// loaded lists.
    pub fn edit_item(&mut self, id: &str) -> Option<&Selection> {
        self.open(id, SelectionMode::Edit)
    }

    pub fn request_delete(&mut self, id: &str) -> Option<&Selection> {
        self.open(id, SelectionMode::Delete)
    }

    /// The working copy, while a book is open for editing.
    pub fn editing_mut(&mut self) -> Option<&mut Book> {
        self.selection
            .as_mut()
            .filter(|s| s.mode == SelectionMode::Edit)
            .map(|s| &mut s.book)
    }

    pub fn close_selection(&mut self) {
        self.selection = None;
    }

    fn take_selection(&mut self, mode: SelectionMode) -> Result<Selection> {
        match self.selection.take() {
            Some(sel) if sel.mode == mode => Ok(sel),
            other => {
                self.selection = other;
                Err(ClientError::Core(ShelfmarkError::Validation(
                    "No book is open for this action".to_string(),
                )))
            }
        }
    }

    /// Submit the working copy. On failure the editor stays open.
    pub async fn save_edit(&mut self) -> Result<Book> {
        let mut selection = self.take_selection(SelectionMode::Edit)?;
        self.reconcile_references(&mut selection.book);
        match self.update_item(&selection.book).await {
            Ok(updated) => Ok(updated),
            Err(e) => {
                self.selection = Some(selection);
                Err(e)
            }
        }
    }

    /// Delete the book awaiting confirmation. On failure the prompt stays open.
    pub async fn confirm_delete(&mut self) -> Result<()> {
        let selection = self.take_selection(SelectionMode::Delete)?;
        match self.delete_item(&selection.book.id).await {
            Ok(()) => Ok(()),
            Err(e) => {
                self.selection = Some(selection);
                Err(e)
            }
        }
    }

    // ─── Create draft ──────────────────────────────────────

    pub fn start_create(&mut self) -> &mut BookDraft {
        self.draft.insert(BookDraft::default())
    }

    pub fn cancel_create(&mut self) {
        self.draft = None;
    }

    /// Submit the pending draft. On failure the draft is kept for correction.
    pub async fn submit_create(&mut self) -> Result<Book> {
        let Some(draft) = self.draft.take() else {
            return Err(ClientError::Core(ShelfmarkError::Validation(
                "No book is being created".to_string(),
            )));
        };
        match self.create_item(draft.clone()).await {
            Ok(book) => Ok(book),
            Err(e) => {
                self.draft = Some(draft);
                Err(e)
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_support::{FakeCatalog, book};
    use tokio::time::{sleep, timeout};

    fn controller(catalog: &Arc<FakeCatalog>, role: Role) -> CollectionController {
        CollectionController::new(
            Arc::clone(catalog) as Arc<dyn CatalogService>,
            role,
            CollectionOptions::default(),
        )
    }

    fn page_of(ids: &[&str], total: u64) -> BookPage {
        BookPage {
            page: 1,
            page_size: 10,
            total,
            items: ids.iter().map(|id| book(id, "g-1", "a-1")).collect(),
        }
    }

    #[tokio::test]
    async fn first_page_of_twenty_three() {
        let catalog = Arc::new(FakeCatalog::with_books(23));
        let mut ctrl = controller(&catalog, Role::Member);

        let outcome = ctrl
            .set_filters(FilterSet {
                author: Some(String::new()),
                published_year: Some(0),
                availability: Some(Availability::Available),
                search: Some(String::new()),
            })
            .await
            .unwrap();

        assert_eq!(outcome, FetchOutcome::Applied);
        assert_eq!(ctrl.items().len(), 10);
        assert_eq!(ctrl.window().total, 23);
        assert_eq!(ctrl.total_pages(), 3);
        assert_eq!(ctrl.page_numbers(), vec![1, 2, 3]);

        let query = catalog.last_query().unwrap();
        assert_eq!(query.availability, Some(Availability::Available));
        assert_eq!(query.author, None);
        assert_eq!(query.published_year, None);
        assert_eq!(query.search_term, None);
        assert_eq!(query.page_size, 10);
    }

    #[tokio::test]
    async fn stale_response_is_discarded() {
        let catalog = Arc::new(FakeCatalog::with_books(0));
        let mut ctrl = controller(&catalog, Role::Member);

        ctrl.filters.author = Some("Slow".to_string());
        let a = ctrl.begin_fetch();
        ctrl.filters.author = Some("Fast".to_string());
        let b = ctrl.begin_fetch();
        assert!(b.seq > a.seq);
        assert!(ctrl.is_loading());

        let b_page = page_of(&["fast-1"], 1);
        assert_eq!(
            ctrl.complete_fetch(b, Ok(b_page.clone())).unwrap(),
            FetchOutcome::Applied
        );
        assert_eq!(
            ctrl.complete_fetch(a, Ok(page_of(&["slow-1", "slow-2"], 2))).unwrap(),
            FetchOutcome::Stale
        );

        assert_eq!(ctrl.result(), Some(&b_page));
        assert_eq!(ctrl.window().total, 1);
        assert!(!ctrl.is_loading());
    }

    #[tokio::test]
    async fn stale_failure_is_discarded_too() {
        let catalog = Arc::new(FakeCatalog::with_books(0));
        let mut ctrl = controller(&catalog, Role::Member);

        let a = ctrl.begin_fetch();
        let b = ctrl.begin_fetch();
        ctrl.complete_fetch(b, Ok(page_of(&["1"], 1))).unwrap();
        let outcome = ctrl
            .complete_fetch(a, Err(ClientError::Server { status: 503, message: String::new() }))
            .unwrap();

        assert_eq!(outcome, FetchOutcome::Stale);
        assert!(ctrl.error().is_none());
    }

    #[tokio::test]
    async fn failed_fetch_keeps_previous_page() {
        let catalog = Arc::new(FakeCatalog::with_books(12));
        let mut ctrl = controller(&catalog, Role::Member);
        ctrl.apply_filters().await.unwrap();
        let before = ctrl.result().cloned();

        catalog.fail_next(ClientError::Server { status: 500, message: String::new() });
        let err = ctrl.on_page_change(2).await.unwrap_err();

        assert!(matches!(err, ClientError::Server { .. }));
        assert_eq!(ctrl.result().cloned(), before);
        assert_eq!(ctrl.error(), Some("Server error. Please try again later."));

        ctrl.on_page_change(2).await.unwrap();
        assert!(ctrl.error().is_none());
        assert_eq!(ctrl.items().len(), 2);
    }

    #[tokio::test]
    async fn sort_toggles_and_resets_page() {
        let catalog = Arc::new(FakeCatalog::with_books(30));
        let mut ctrl = controller(&catalog, Role::Member);
        ctrl.on_page_change(3).await.unwrap();
        assert_eq!(ctrl.window().page, 3);

        ctrl.sort(SortColumn::Title).await.unwrap();
        assert_eq!(ctrl.window().page, 1);
        let query = catalog.last_query().unwrap();
        assert_eq!(query.sort_by, Some(SortColumn::Title));
        assert_eq!(query.sort_direction, Some(shelfmark_core::SortDirection::Ascending));

        ctrl.sort(SortColumn::Title).await.unwrap();
        let query = catalog.last_query().unwrap();
        assert_eq!(query.sort_direction, Some(shelfmark_core::SortDirection::Descending));

        ctrl.sort(SortColumn::PublishedOn).await.unwrap();
        let query = catalog.last_query().unwrap();
        assert_eq!(query.sort_by, Some(SortColumn::PublishedOn));
        assert_eq!(query.sort_direction, Some(shelfmark_core::SortDirection::Ascending));
    }

    #[tokio::test]
    async fn page_change_preserves_filters_and_sort() {
        let catalog = Arc::new(FakeCatalog::with_books(30));
        let mut ctrl = controller(&catalog, Role::Member);
        ctrl.set_year_filter(Some(2001)).await.unwrap();
        ctrl.sort(SortColumn::Author).await.unwrap();

        ctrl.on_page_change(2).await.unwrap();
        let query = catalog.last_query().unwrap();
        assert_eq!(query.page, 2);
        assert_eq!(query.published_year, Some(2001));
        assert_eq!(query.sort_by, Some(SortColumn::Author));
    }

    #[tokio::test(start_paused = true)]
    async fn rapid_keystrokes_commit_once() {
        let catalog = Arc::new(FakeCatalog::with_books(30));
        let mut ctrl = controller(&catalog, Role::Member);
        ctrl.on_page_change(2).await.unwrap();
        let fetches_before = catalog.fetch_count();

        for term in ["b", "bo", "boo", "book 1"] {
            ctrl.on_search_input(term);
            sleep(Duration::from_millis(120)).await;
        }

        let outcome = ctrl.next_search_commit().await.unwrap().unwrap();
        assert_eq!(outcome, FetchOutcome::Applied);
        assert_eq!(catalog.fetch_count(), fetches_before + 1);
        assert_eq!(ctrl.filters().search.as_deref(), Some("book 1"));
        assert_eq!(ctrl.window().page, 1);
        assert_eq!(
            catalog.last_query().unwrap().search_term.as_deref(),
            Some("book 1")
        );

        assert!(
            timeout(Duration::from_secs(5), ctrl.next_search_commit())
                .await
                .is_err()
        );
        assert_eq!(catalog.fetch_count(), fetches_before + 1);
    }

    #[tokio::test(start_paused = true)]
    async fn clearing_filters_drops_pending_search() {
        let catalog = Arc::new(FakeCatalog::with_books(5));
        let mut ctrl = controller(&catalog, Role::Member);
        ctrl.set_author_filter(Some("Author a-1".to_string())).await.unwrap();

        ctrl.on_search_input("half-typ");
        sleep(Duration::from_millis(50)).await;
        ctrl.clear_filters().await.unwrap();

        assert!(ctrl.filters().is_empty());
        assert!(
            timeout(Duration::from_secs(5), ctrl.next_search_commit())
                .await
                .is_err()
        );
        let query = catalog.last_query().unwrap();
        assert_eq!(query.author, None);
        assert_eq!(query.search_term, None);
    }

    #[tokio::test(start_paused = true)]
    async fn abandoned_search_commit_leaves_state_untouched() {
        let catalog = Arc::new(FakeCatalog::with_books(5));
        let mut ctrl = controller(&catalog, Role::Member);
        catalog.delay_fetches(Duration::from_millis(500));

        ctrl.on_search_input("dune");
        assert!(
            timeout(Duration::from_millis(400), ctrl.next_search_commit())
                .await
                .is_err()
        );

        assert!(!ctrl.is_loading());
        assert_eq!(ctrl.filters().search, None);
        assert!(ctrl.result().is_none());
        assert_eq!(catalog.fetch_count(), 1);

        ctrl.on_search_input("dune");
        let term = ctrl.next_search_term().await.unwrap();
        assert_eq!(term, "dune");
        assert_eq!(catalog.fetch_count(), 1);

        let outcome = ctrl.commit_search(term).await.unwrap();
        assert_eq!(outcome, FetchOutcome::Applied);
        assert_eq!(ctrl.filters().search.as_deref(), Some("dune"));
        assert!(!ctrl.is_loading());
    }

    #[tokio::test]
    async fn dropped_ticket_stops_loading() {
        let catalog = Arc::new(FakeCatalog::with_books(0));
        let mut ctrl = controller(&catalog, Role::Member);

        let ticket = ctrl.begin_fetch();
        assert!(ctrl.is_loading());
        drop(ticket);
        assert!(!ctrl.is_loading());
    }

    #[tokio::test]
    async fn page_size_follows_the_response() {
        let catalog = Arc::new(FakeCatalog::with_books(0));
        let mut ctrl = controller(&catalog, Role::Member);

        let ticket = ctrl.begin_fetch();
        let page = BookPage {
            page: 1,
            page_size: 4,
            total: 10,
            items: ["1", "2", "3", "4"].iter().map(|id| book(id, "g-1", "a-1")).collect(),
        };
        ctrl.complete_fetch(ticket, Ok(page)).unwrap();

        assert_eq!(ctrl.window().page_size, 4);
        assert_eq!(ctrl.total_pages(), 3);
        assert_eq!(ctrl.window().visible_range(), Some((1, 4)));
        assert_eq!(ctrl.begin_fetch().query.page_size, 4);
    }

    #[tokio::test]
    async fn create_appends_without_refetch() {
        let catalog = Arc::new(FakeCatalog::with_books(3));
        let mut ctrl = controller(&catalog, Role::Librarian);
        ctrl.apply_filters().await.unwrap();
        let fetches = catalog.fetch_count();

        let draft = BookDraft {
            title: "New".to_string(),
            genre_id: "g-2".to_string(),
            author_id: "a-1".to_string(),
            total_copies: 1,
            ..Default::default()
        };
        let created = ctrl.create_item(draft).await.unwrap();

        assert_eq!(ctrl.window().total, 4);
        assert_eq!(ctrl.items().iter().filter(|b| b.id == created.id).count(), 1);
        assert_eq!(created.genre.name, "Romance");
        assert_eq!(catalog.fetch_count(), fetches);
    }

    #[tokio::test]
    async fn create_with_nothing_loaded_starts_a_page() {
        let catalog = Arc::new(FakeCatalog::with_books(0));
        let mut ctrl = controller(&catalog, Role::Admin);

        let draft = ctrl.start_create();
        draft.title = "Solo".to_string();
        draft.genre_id = "g-1".to_string();
        draft.author_id = "a-1".to_string();
        let created = ctrl.submit_create().await.unwrap();

        let page = ctrl.result().unwrap();
        assert_eq!(page.total, 1);
        assert_eq!(page.items, vec![created]);
        assert!(ctrl.draft().is_none());
    }

    #[tokio::test]
    async fn failed_create_keeps_state_and_draft() {
        let catalog = Arc::new(FakeCatalog::with_books(3));
        let mut ctrl = controller(&catalog, Role::Librarian);
        ctrl.apply_filters().await.unwrap();
        let before = ctrl.result().cloned();

        ctrl.start_create().title = "Dup".to_string();
        catalog.fail_next(ClientError::Conflict("ISBN already exists".to_string()));
        let err = ctrl.submit_create().await.unwrap_err();

        assert!(matches!(err, ClientError::Conflict(_)));
        assert_eq!(ctrl.result().cloned(), before);
        assert_eq!(ctrl.error(), Some("ISBN already exists"));
        assert_eq!(ctrl.draft().map(|d| d.title.as_str()), Some("Dup"));
    }

    #[tokio::test]
    async fn delete_removes_and_clamps_page() {
        let catalog = Arc::new(FakeCatalog::with_books(11));
        let mut ctrl = controller(&catalog, Role::Librarian);
        ctrl.on_page_change(2).await.unwrap();
        assert_eq!(ctrl.items().len(), 1);
        let id = ctrl.items()[0].id.clone();

        ctrl.request_delete(&id).unwrap();
        ctrl.confirm_delete().await.unwrap();

        assert!(ctrl.items().iter().all(|b| b.id != id));
        assert_eq!(ctrl.window().total, 10);
        assert_eq!(ctrl.window().page, 1);
        assert!(ctrl.selection().is_none());
    }

    #[tokio::test]
    async fn update_replaces_in_place() {
        let catalog = Arc::new(FakeCatalog::with_books(3));
        let mut ctrl = controller(&catalog, Role::Admin);
        ctrl.apply_filters().await.unwrap();

        let mut changed = ctrl.items()[1].clone();
        changed.title = "Retitled".to_string();
        ctrl.update_item(&changed).await.unwrap();

        assert_eq!(ctrl.items()[1].title, "Retitled");
        assert_eq!(ctrl.items().len(), 3);
        assert_eq!(ctrl.window().total, 3);
    }

    #[tokio::test]
    async fn members_cannot_mutate() {
        let catalog = Arc::new(FakeCatalog::with_books(3));
        let mut ctrl = controller(&catalog, Role::Member);
        ctrl.apply_filters().await.unwrap();
        let id = ctrl.items()[0].id.clone();

        let err = ctrl.delete_item(&id).await.unwrap_err();
        assert!(matches!(err, ClientError::Forbidden(_)));
        assert_eq!(catalog.mutation_count(), 0);
        assert_eq!(ctrl.window().total, 3);
    }

    #[tokio::test]
    async fn edit_repoints_references_to_loaded_lists() {
        let catalog = Arc::new(FakeCatalog::with_books(2));
        let mut ctrl = controller(&catalog, Role::Librarian);
        ctrl.apply_filters().await.unwrap();
        ctrl.load_references().await.unwrap();
        assert_eq!(ctrl.genres().len(), 2);

        // Books on the page carry abbreviated nested references.
        let id = ctrl.items()[0].id.clone();
        assert_eq!(ctrl.items()[0].genre.name, "g-1");

        let selection = ctrl.edit_item(&id).unwrap();
        assert_eq!(selection.mode, SelectionMode::Edit);
        assert_eq!(selection.book.genre.name, "Fantasy");
        assert_eq!(selection.book.author.name, "Jane Austen");

        let editing = ctrl.editing_mut().unwrap();
        editing.genre.id = "g-2".to_string();
        let saved = ctrl.save_edit().await.unwrap();

        assert_eq!(saved.genre.name, "Romance");
        assert_eq!(catalog.last_update().unwrap().genre_id, "g-2");
        assert_eq!(ctrl.items()[0].genre.name, "Romance");
        assert!(ctrl.selection().is_none());
    }

    #[tokio::test]
    async fn view_selection_is_not_editable() {
        let catalog = Arc::new(FakeCatalog::with_books(1));
        let mut ctrl = controller(&catalog, Role::Admin);
        ctrl.apply_filters().await.unwrap();
        let id = ctrl.items()[0].id.clone();

        ctrl.view_item(&id).unwrap();
        assert!(ctrl.editing_mut().is_none());
        assert!(ctrl.save_edit().await.is_err());
        assert!(ctrl.selection().is_some());

        ctrl.close_selection();
        assert!(ctrl.selection().is_none());
        assert!(ctrl.view_item("missing").is_none());
    }
}
