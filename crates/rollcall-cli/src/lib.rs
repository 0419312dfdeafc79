pub mod cli;
pub mod commands;
pub mod config;
pub mod doctor;
pub mod enroll;
pub mod output;
pub mod report;
pub mod roster;
pub mod session;
