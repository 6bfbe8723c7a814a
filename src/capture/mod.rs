pub mod pump;
pub mod runner;
pub mod service;
pub mod store;

pub use pump::{CaptureSummary, FrameInfo, fetch_motion_jpeg, pump, split_file};
pub use runner::spawn_capture;
