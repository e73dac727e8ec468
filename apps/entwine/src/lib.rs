//! # entwine
//!
//! Command-line front end for entwine-core.
//!
//! The binary is a thin shell over this library so the commands can be
//! driven from integration tests.

pub mod cli;
pub mod demo;
