pub mod client;
pub mod config;
pub mod proxy;
pub mod routes;
