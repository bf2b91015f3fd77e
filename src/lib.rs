//! Pomodoro timer made of a small daemon that owns the countdown and a cli that talks to it.
//! Finished sessions are logged per day and can be summarized with the `stats` command.
//!

pub mod beeper;
pub mod cli;
pub mod command;
pub mod daemon;
pub mod protocol;
pub mod storage;
pub mod timer;
pub mod utils;
