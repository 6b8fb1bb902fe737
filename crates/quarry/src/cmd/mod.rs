//! Command implementations for the Quarry CLI

pub mod aggs;
pub mod input;
pub mod interval;
pub mod output;
pub mod query;
pub mod search;
pub mod tabify;
