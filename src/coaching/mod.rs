pub mod ledger;
pub mod lifecycle;
pub mod slots;

pub use ledger::*;
pub use lifecycle::*;
pub use slots::*;
