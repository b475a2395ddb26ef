//! DAP2 wire formats and the HTTP session that speaks them.

pub mod constraint;
pub mod das;
pub mod dds;
pub mod error;
mod grammar;
pub mod session;
pub mod xdr;
