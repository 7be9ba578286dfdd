mod time;
pub use time::*;

mod abi;
pub use abi::*;
