//! Catalog management service: books, authors, categories

use crate::{
    error::{AppError, AppResult},
    models::{
        author::{Author, CreateAuthor, UpdateAuthor},
        book::{Book, BookAvailability, BookQuery, CreateBook, UpdateBook},
        category::{Category, CreateCategory, UpdateCategory},
    },
    repository::Repository,
};

#[derive(Clone)]
pub struct CatalogService {
    repository: Repository,
}

impl CatalogService {
    pub fn new(repository: Repository) -> Self {
        Self { repository }
    }

    // =========================================================================
    // BOOKS
    // =========================================================================

    /// Search books with filters
    pub async fn search_books(&self, query: &BookQuery) -> AppResult<(Vec<Book>, i64)> {
        self.repository.books.search(query).await
    }

    /// Get book by ID with relations loaded
    pub async fn get_book(&self, id: i32) -> AppResult<Book> {
        self.repository.books.get_by_id(id).await
    }

    /// Create a new book with its author/category sets
    pub async fn create_book(&self, book: CreateBook) -> AppResult<Book> {
        if self.repository.books.isbn_exists(&book.isbn, None).await? {
            return Err(AppError::Conflict(format!(
                "Book with ISBN {} already exists",
                book.isbn
            )));
        }

        self.repository.books.create_with_relations(&book).await
    }

    /// Update an existing book
    pub async fn update_book(&self, id: i32, book: UpdateBook) -> AppResult<Book> {
        let existing = self.repository.books.get_by_id(id).await?;

        if let Some(ref isbn) = book.isbn {
            if *isbn != existing.isbn
                && self.repository.books.isbn_exists(isbn, Some(id)).await?
            {
                return Err(AppError::Conflict(format!(
                    "Book with ISBN {} already exists",
                    isbn
                )));
            }
        }

        self.repository.books.update_with_relations(id, &book).await
    }

    /// Delete a book
    pub async fn delete_book(&self, id: i32) -> AppResult<()> {
        self.repository.books.delete(id).await
    }

    /// Report how many copies of a book exist and how many can be borrowed.
    /// The stored quantity is the shelf count, so the total is rebuilt from
    /// it plus the unreturned borrows.
    pub async fn book_availability(&self, id: i32) -> AppResult<BookAvailability> {
        let book = self.repository.books.get_by_id(id).await?;
        let open_borrows = self.repository.borrows.count_open_for_book(id).await?;

        let available = i64::from(book.quantity).max(0);
        Ok(BookAvailability {
            book_id: id,
            total_copies: available + open_borrows,
            available_copies: available,
            is_available: available > 0,
        })
    }

    // =========================================================================
    // AUTHORS
    // =========================================================================

    pub async fn list_authors(&self, page: i64, per_page: i64) -> AppResult<(Vec<Author>, i64)> {
        self.repository.authors.list(page, per_page).await
    }

    pub async fn get_author(&self, id: i32) -> AppResult<Author> {
        self.repository.authors.get_by_id(id).await
    }

    pub async fn create_author(&self, author: CreateAuthor) -> AppResult<Author> {
        self.repository.authors.create(&author).await
    }

    pub async fn update_author(&self, id: i32, author: UpdateAuthor) -> AppResult<Author> {
        self.repository.authors.update(id, &author).await
    }

    pub async fn delete_author(&self, id: i32) -> AppResult<()> {
        self.repository.authors.delete(id).await
    }

    // =========================================================================
    // CATEGORIES
    // =========================================================================

    pub async fn list_categories(
        &self,
        page: i64,
        per_page: i64,
    ) -> AppResult<(Vec<Category>, i64)> {
        self.repository.categories.list(page, per_page).await
    }

    pub async fn get_category(&self, id: i32) -> AppResult<Category> {
        self.repository.categories.get_by_id(id).await
    }

    pub async fn create_category(&self, category: CreateCategory) -> AppResult<Category> {
        self.repository.categories.create(&category).await
    }

    pub async fn update_category(&self, id: i32, category: UpdateCategory) -> AppResult<Category> {
        self.repository.categories.update(id, &category).await
    }

    pub async fn delete_category(&self, id: i32) -> AppResult<()> {
        self.repository.categories.delete(id).await
    }
}
