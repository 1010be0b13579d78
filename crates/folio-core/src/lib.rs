pub mod analytics;
pub mod config;
pub mod error;
pub mod location;
pub mod page_view;
pub mod store;
pub mod visitor;
