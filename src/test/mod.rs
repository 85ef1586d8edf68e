mod availability;
mod subscriptions;
pub mod utils;

pub use utils::{test_db, test_utils};
