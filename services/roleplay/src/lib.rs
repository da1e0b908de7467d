pub mod config;
pub mod console;
pub mod gateway_adapter;
pub mod report_store;
