//! Core building blocks for the rollcall attendance tool: the reference
//! gallery, descriptor matching, session tracking, the attendance ledger,
//! guided enrollment and the live capture loop.

pub mod capture;
pub mod enrollment;
pub mod errors;
pub mod faces;
pub mod ledger;
pub mod live;
pub mod session;

pub use errors::{AppError, AppResult};
