pub mod config;
pub mod crypto;
pub mod evidence_store;
pub mod payment_log_repo;
pub mod recognizer;
pub mod repository;
pub mod telegram;
pub mod token;
pub mod transaction_repo;

pub use config::*;
pub use crypto::*;
pub use evidence_store::*;
pub use payment_log_repo::*;
pub use recognizer::*;
pub use repository::*;
pub use telegram::*;
pub use token::*;
pub use transaction_repo::*;
