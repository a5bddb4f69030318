pub mod category;
pub mod error;
pub mod time;

pub use category::{CategoryRegistry, ClaimCategory, ClaimSource, ClaimsAvailability, TableSource};
pub use error::{CoreError, ErrorCategory, Result};
pub use time::{BEFORE_LAST_UPDATED, Timestamp};
