// HTTP routes
pub mod harvest;
pub mod health;

pub use harvest::*;
pub use health::*;
