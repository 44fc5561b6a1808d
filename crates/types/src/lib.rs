//! Shared primitives for the Tally settlement layer: fixed-point amounts,
//! account addresses and block time.

pub mod address;
pub mod amount;
pub mod time;

pub use address::*;
pub use amount::*;
pub use time::*;
