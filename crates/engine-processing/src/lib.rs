pub mod bad_records;
pub mod controller;
pub mod error;
pub mod hooks;
pub mod loader;
