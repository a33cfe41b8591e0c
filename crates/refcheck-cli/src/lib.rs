//! Library components of the `refcheck` command line.

pub mod config;
pub mod logging;
pub mod projects;
