//! Hand landmark estimation and the continuous detection loop.

pub mod landmark;
pub mod tracking;
