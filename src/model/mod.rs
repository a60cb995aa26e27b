pub mod chain;
pub mod payment;

pub use chain::Chain;
pub use payment::{AggregatedPayment, Balance, Payment};
