//! `cdptool` command-line front end.

pub mod cli;
pub mod commands;
pub mod logging;
pub mod report;
