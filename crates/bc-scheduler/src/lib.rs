//! Slot scheduling and the publication queue worker.

pub mod schedule;
pub mod slots;
pub mod worker;

pub use schedule::{schedule_post, ScheduleError};
pub use slots::{adjust_to_window, calculate_next_slot};
pub use worker::{Worker, WorkerConfig, WorkerError};
