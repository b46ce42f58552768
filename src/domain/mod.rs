pub mod access;
pub mod account;
pub mod budget;
pub mod payment;
pub mod transaction;

pub use access::*;
pub use account::*;
pub use budget::*;
pub use payment::*;
pub use transaction::*;
