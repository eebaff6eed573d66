pub mod app;
pub mod components;
pub mod layout;
pub mod state;

pub use app::{run_app, DashboardApp};
