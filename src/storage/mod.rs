//!  Persistence used by the [TimerManager](crate::timer::manager::TimerManager).
//!   - [config::JsonConfigStore] keeps the beep duration and saved timers in a single json file.
//!   - [session_log::SessionLogStorage] appends one [entities::LogEntry] per finished session
//!     into a file per local day.

pub mod config;
pub mod entities;
pub mod session_log;
