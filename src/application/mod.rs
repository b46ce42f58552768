pub mod access;
pub mod admin;
pub mod auth;
pub mod budget;
pub mod chat;
pub mod ledger;
pub mod payment;

pub use access::*;
pub use admin::*;
pub use auth::*;
pub use budget::*;
pub use chat::*;
pub use ledger::*;
pub use payment::*;
