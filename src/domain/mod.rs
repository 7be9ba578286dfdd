pub mod retry;
pub mod sync;
pub mod tracker;

pub use retry::*;
pub use sync::*;
pub use tracker::*;
