pub mod analytics;
pub mod health;
pub mod page_views;
pub mod visitors;
