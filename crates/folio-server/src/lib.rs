pub mod app;
pub mod client_ip;
pub mod config;
pub mod error;
pub mod geo;
pub mod rate_limit;
pub mod routes;
pub mod state;
pub mod tracker;
pub mod user_agent;
