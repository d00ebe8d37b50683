pub mod model;

pub use model::{PairKind, Transaction, TransactionError};
