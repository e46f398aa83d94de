pub mod json_path;
pub mod quote_guard;
