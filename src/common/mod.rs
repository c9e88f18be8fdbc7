//! Building blocks shared by every component

pub mod channels;
pub mod clock;
pub mod errors;
pub mod scheduler;
pub mod store;
pub mod traits;
pub mod types;
