//! doctorctl - command line front end for the system doctor engine

pub mod cli;
pub mod commands;
pub mod render;
