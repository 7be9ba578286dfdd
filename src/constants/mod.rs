mod retry;
pub use retry::*;

mod tracker;
pub use tracker::*;

mod sync;
pub use sync::*;
