pub mod applications;
pub mod appointments;
pub mod availability;
pub mod packages;
pub mod sessions;
pub mod subscriptions;
pub mod users;

pub use applications::*;
pub use appointments::*;
pub use availability::*;
pub use packages::*;
pub use sessions::*;
pub use subscriptions::*;
pub use users::*;
