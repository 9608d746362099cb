//! CSV script input and report output for the command-line front end.

pub mod command_reader;
pub mod report_writer;
