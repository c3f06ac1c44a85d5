//! BookHub client
//!
//! Session and authorization layer for the BookHub library API: credential
//! persistence, single-flight token refresh, an authenticated request
//! pipeline that recovers from expired tokens, and role-based route gating.

pub mod config;
pub mod error;
pub mod guard;
pub mod models;
pub mod services;
pub mod storage;

pub use config::AppConfig;
pub use error::{ClientError, ClientResult};
pub use guard::{decide, evaluate_path, Decision};
pub use services::{
    session::{Session, SessionPhase, SessionSnapshot},
    Services,
};
