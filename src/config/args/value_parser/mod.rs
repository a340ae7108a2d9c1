pub mod log_level;
pub mod url;
