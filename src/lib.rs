pub mod config;
pub mod logs;
pub mod ui;
