pub mod calibration;
pub mod config;
pub mod detector;
pub mod error;
pub mod event_log;
pub mod indicator;
pub mod network;
pub mod notify;
pub mod scheduler;
pub mod sensors;
pub mod status;
