pub mod actions;
pub mod api;
pub mod dashboard;
pub mod session;
