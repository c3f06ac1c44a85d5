//! BookHub command line client
//!
//! ```bash
//! bookhub login -e a@b.com -p pw123456
//! bookhub books --search dune
//! bookhub issue 3
//! bookhub can-visit /admin/books
//! ```

use chrono::{DateTime, Utc};
use clap::{Parser, Subcommand};
use rust_decimal::Decimal;
use serde::Serialize;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use bookhub_client::{
    config::AppConfig,
    evaluate_path,
    models::{BookQuery, BookUpdate, RegisterRequest, TokenClaims, Transaction, UserProfile},
    services::Services,
    ClientError,
};

#[derive(Parser, Debug)]
#[command(name = "bookhub")]
#[command(about = "BookHub library client", long_about = None)]
#[command(version)]
struct Cli {
    /// API base URL, overrides configuration
    #[arg(long, env = "API_BASE_URL")]
    api: Option<String>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Log in and store the session
    Login {
        #[arg(short, long)]
        email: String,

        #[arg(short, long, env = "BOOKHUB_PASSWORD", hide_env_values = true)]
        password: String,
    },

    /// Forget the stored session
    Logout,

    /// Show the current user
    Whoami,

    /// Create a member account
    Register {
        #[arg(short, long)]
        email: String,

        #[arg(short, long)]
        username: String,

        #[arg(short, long)]
        password: String,

        /// Password confirmation
        #[arg(short, long)]
        confirm: String,
    },

    /// Exchange the refresh token for a new pair
    Refresh,

    /// Show the stored access token's claims
    Status,

    /// List books
    Books {
        #[arg(short, long)]
        search: Option<String>,
    },

    /// Show one book
    Book { id: i64 },

    /// Books grouped by category
    Categories,

    /// Number of books in the catalog
    BookCount,

    /// Edit a book's metadata (admin)
    UpdateBook {
        id: i64,

        #[arg(long)]
        title: String,

        #[arg(long)]
        author: String,

        #[arg(long)]
        category: String,
    },

    /// Remove a book (admin)
    DeleteBook { id: i64 },

    /// Borrow a book
    Issue { book_id: i64 },

    /// Return a borrowed book
    Return { transaction_id: i64 },

    /// Pay a fine
    PayFine { transaction_id: i64, amount: Decimal },

    /// Own lending history
    History,

    /// Every transaction (admin)
    Transactions,

    /// Number of accounts (admin)
    UsersCount,

    /// Create an admin account (admin)
    AddLibrarian {
        #[arg(short, long)]
        email: String,

        #[arg(short, long)]
        username: String,

        #[arg(short, long)]
        password: String,
    },

    /// Check whether the current session may open an application path
    CanVisit { path: String },
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Load environment variables from .env file
    dotenvy::dotenv().ok();

    let cli = Cli::parse();

    let mut config = AppConfig::load()?;
    if let Some(api) = cli.api.clone() {
        config.api.base_url = api;
    }

    init_tracing(&config);
    tracing::debug!("BookHub client v{} against {}", env!("CARGO_PKG_VERSION"), config.api.base_url);

    let services = Services::from_config(&config).await?;
    if let Err(e) = run(cli.command, &services).await {
        if e.downcast_ref::<ClientError>().is_some_and(|e| e.is_terminal()) {
            eprintln!("Your session has ended, run `bookhub login` again");
        }
        return Err(e);
    }
    Ok(())
}

fn init_tracing(config: &AppConfig) {
    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| format!("bookhub_client={},bookhub={}", config.logging.level, config.logging.level).into());

    let registry = tracing_subscriber::registry().with(filter);
    if config.logging.format == "json" {
        registry
            .with(tracing_subscriber::fmt::layer().json().with_writer(std::io::stderr))
            .init();
    } else {
        registry
            .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
            .init();
    }
}

async fn run(command: Commands, services: &Services) -> anyhow::Result<()> {
    let session = &services.session;
    let library = &services.library;

    let snapshot = session.init().await;

    match command {
        Commands::Login { email, password } => {
            let user = session.login(&email, &password).await?;
            print_json(&user)?;
        }
        Commands::Logout => {
            session.logout().await;
            println!("Logged out");
        }
        Commands::Whoami => match &snapshot.user {
            Some(user) => println!("{}", describe_user(user)),
            None => println!("Not logged in"),
        },
        Commands::Register {
            email,
            username,
            password,
            confirm,
        } => {
            let request = RegisterRequest::from_form(&email, &username, &password, &confirm)?;
            print_json(&session.register(&request).await?)?;
        }
        Commands::Refresh => {
            session.refresh_token().await?;
            println!("Token refreshed");
        }
        Commands::Status => match session.credentials().access_token().await? {
            Some(token) => {
                let claims = TokenClaims::peek(&token)?;
                let expired = claims.is_expired_at(chrono::Utc::now());
                println!(
                    "user_id={} expires_at={} expired={}",
                    claims.user_id.map(|id| id.to_string()).unwrap_or_else(|| "-".into()),
                    claims
                        .expires_at()
                        .map(|at| at.to_rfc3339())
                        .unwrap_or_else(|| "-".into()),
                    expired
                );
            }
            None => println!("No stored session"),
        },
        Commands::Books { search } => print_json(&library.list_books(&BookQuery { search }).await?)?,
        Commands::Book { id } => print_json(&library.get_book(id).await?)?,
        Commands::Categories => print_json(&library.books_by_category().await?)?,
        Commands::BookCount => println!("{}", library.book_count().await?),
        Commands::UpdateBook {
            id,
            title,
            author,
            category,
        } => {
            let update = BookUpdate {
                title,
                author,
                category,
            };
            print_json(&library.update_book(id, &update).await?)?;
        }
        Commands::DeleteBook { id } => {
            library.delete_book(id).await?;
            println!("Deleted book {}", id);
        }
        Commands::Issue { book_id } => print_json(&library.issue_book(book_id).await?)?,
        Commands::Return { transaction_id } => print_json(&library.return_book(transaction_id).await?)?,
        Commands::PayFine {
            transaction_id,
            amount,
        } => print_json(&library.pay_fine(transaction_id, amount).await?)?,
        Commands::History => {
            let now = Utc::now();
            for transaction in library.my_history().await? {
                println!("{}", describe_transaction(&transaction, now));
            }
        }
        Commands::Transactions => print_json(&library.all_transactions().await?)?,
        Commands::UsersCount => println!("{}", library.user_count().await?),
        Commands::AddLibrarian {
            email,
            username,
            password,
        } => {
            let request = RegisterRequest::from_form(&email, &username, &password, &password)?;
            print_json(&library.add_librarian(&request).await?)?;
        }
        Commands::CanVisit { path } => match evaluate_path(&session.snapshot(), &path) {
            Some(decision) => println!("{:?}", decision),
            None => anyhow::bail!("Unknown path: {}", path),
        },
    }

    Ok(())
}

fn print_json<T: Serialize>(value: &T) -> anyhow::Result<()> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}

fn describe_user(user: &UserProfile) -> String {
    let mut line = format!("{} (id {}, {})", user.username, user.id, user.role);
    if user.is_admin() {
        line.push_str(" [admin]");
    } else if user.has_admin_flags() {
        line.push_str(" [staff flags set]");
    }
    line
}

fn describe_transaction(transaction: &Transaction, now: DateTime<Utc>) -> String {
    let mut line = format!(
        "#{} {} ({:?}) due {}",
        transaction.id,
        transaction.book.title,
        transaction.status,
        transaction.due_date.format("%Y-%m-%d")
    );
    if transaction.is_overdue_at(now) {
        line.push_str(" OVERDUE");
    }
    if transaction.has_fine() {
        line.push_str(&format!(" fine {}", transaction.fine_amount));
    }
    line
}
