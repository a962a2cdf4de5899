//! Scenario tests across contexts.

pub mod frames;
pub mod routing;
pub mod scenarios;
