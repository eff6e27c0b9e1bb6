pub mod config;
pub mod parser;
pub mod storage;
pub mod upload;
pub mod utils;
