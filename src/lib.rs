pub mod analysis;
pub mod api;
pub mod data_collector;
pub mod error;
pub mod merger;
pub mod models;
pub mod storage;
pub mod ui;
pub mod utils;
