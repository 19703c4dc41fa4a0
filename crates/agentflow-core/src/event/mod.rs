//! Run event broadcasting.

pub mod bus;
