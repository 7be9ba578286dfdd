mod error;
pub use error::*;

mod contract_error;
pub use contract_error::*;

mod transaction;
pub use transaction::*;

mod state;
pub use state::*;
