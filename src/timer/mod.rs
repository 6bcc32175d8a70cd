pub mod controller;
pub mod state;

pub use controller::{FocusTimer, TimerEvent, TimerSnapshot};
pub use state::{TimerMode, TimerState, TimerStatus};
