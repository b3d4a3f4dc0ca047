pub mod configuration;
pub mod domain;
pub mod error;
pub mod mirror;
pub mod routes;
pub mod schema;
pub mod startup;
pub mod store;
pub mod telemetry;
