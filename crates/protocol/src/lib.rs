//! Plain data types for the interim XR session gate.
//!
//! Everything in this crate is pure data: no platform handles, no behavior
//! beyond (de)serialization and a few constructors. Platform traits live in
//! `xr-interim-runtime`; the gate itself lives in `xr-interim`.

pub mod frame;
pub mod pose;
pub mod session;

pub use frame::*;
pub use pose::*;
pub use session::*;
