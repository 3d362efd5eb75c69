pub mod config;
pub mod cors;
pub mod errors;
pub mod server_utils;
pub mod static_files;
