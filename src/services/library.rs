//! Library service: typed catalog, lending and admin calls
//!
//! Lending rules (availability, due dates, fines) belong to the server. This
//! service only shapes requests and decodes answers.

use rust_decimal::Decimal;

use super::api::ApiClient;
use crate::{
    error::ClientResult,
    models::{
        Book, BookQuery, BookUpdate, BooksByCategory, Count, IssueRequest, LibrarianAdded,
        PayFineRequest, Payment, RegisterRequest, ReturnRequest, Transaction,
    },
};

#[derive(Clone)]
pub struct LibraryService {
    api: ApiClient,
}

impl LibraryService {
    pub fn new(api: ApiClient) -> Self {
        Self { api }
    }

    // Catalog

    pub async fn list_books(&self, query: &BookQuery) -> ClientResult<Vec<Book>> {
        self.api.get_json_with_query("books/", query.to_query()).await
    }

    pub async fn get_book(&self, id: i64) -> ClientResult<Book> {
        self.api.get_json(&format!("books/{}/", id)).await
    }

    /// Public listing grouped by category, server order preserved
    pub async fn books_by_category(&self) -> ClientResult<BooksByCategory> {
        self.api.get_json("books/by-category/").await
    }

    pub async fn book_count(&self) -> ClientResult<u64> {
        let count: Count = self.api.get_json("books/count/").await?;
        Ok(count.count)
    }

    pub async fn update_book(&self, id: i64, update: &BookUpdate) -> ClientResult<Book> {
        tracing::info!("Updating book {}", id);
        self.api.put_json(&format!("books/{}/", id), update).await
    }

    pub async fn delete_book(&self, id: i64) -> ClientResult<()> {
        tracing::info!("Deleting book {}", id);
        self.api.delete(&format!("books/{}/", id)).await
    }

    // Lending

    pub async fn issue_book(&self, book_id: i64) -> ClientResult<Transaction> {
        tracing::info!("Issuing book {}", book_id);
        self.api
            .post_json("transactions/issue/", &IssueRequest { book_id })
            .await
    }

    pub async fn return_book(&self, transaction_id: i64) -> ClientResult<Transaction> {
        tracing::info!("Returning transaction {}", transaction_id);
        self.api
            .post_json("transactions/return/", &ReturnRequest { transaction_id })
            .await
    }

    pub async fn pay_fine(&self, transaction_id: i64, amount: Decimal) -> ClientResult<Payment> {
        tracing::info!("Paying {} on transaction {}", amount, transaction_id);
        self.api
            .post_json(
                "transactions/pay-fine/",
                &PayFineRequest {
                    transaction_id,
                    amount,
                },
            )
            .await
    }

    pub async fn my_history(&self) -> ClientResult<Vec<Transaction>> {
        self.api.get_json("transactions/my-history/").await
    }

    /// Every member's transactions (admin only)
    pub async fn all_transactions(&self) -> ClientResult<Vec<Transaction>> {
        self.api.get_json("transactions/all/").await
    }

    // Administration

    /// Create an admin account (admin only)
    pub async fn add_librarian(&self, request: &RegisterRequest) -> ClientResult<LibrarianAdded> {
        tracing::info!("Adding librarian {}", request.email);
        self.api.post_json("auth/add-librarian/", request).await
    }

    pub async fn user_count(&self) -> ClientResult<u64> {
        let count: Count = self.api.get_json("auth/count/").await?;
        Ok(count.count)
    }
}
