pub mod app_state;
pub mod capture;
pub mod config;
pub mod core;
pub mod mjpeg;
pub mod web;

#[cfg(test)]
mod test_support;
