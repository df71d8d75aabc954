//! C5/C6 — the vendor query planner/executor and cursor authenticator
//! (spec §4.5, §4.6).

pub mod cursor;
pub mod executor;
pub mod filter;
pub mod planner;
pub mod sql;

pub use executor::{execute, ExecutionResult};
pub use filter::VendorFilter;
