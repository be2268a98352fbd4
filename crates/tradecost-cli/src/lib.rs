//! Tradecost CLI library.
//!
//! This crate provides the report rendering and terminal helpers used by the
//! `tradecost` binary.

pub mod output;
pub mod terminal;
