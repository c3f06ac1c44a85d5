//! Data models exchanged with the BookHub API

pub mod book;
pub mod token;
pub mod transaction;
pub mod user;

// Re-export commonly used types
pub use book::{Book, BookQuery, BookShort, BookUpdate, BooksByCategory, Count};
pub use token::{CredentialPair, TokenClaims};
pub use transaction::{IssueRequest, PayFineRequest, Payment, ReturnRequest, Transaction, TransactionStatus};
pub use user::{LibrarianAdded, LoginRequest, RegisterRequest, RegisteredUser, Role, UserProfile};
