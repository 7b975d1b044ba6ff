pub mod config;
pub mod graphdb;

pub use config::Config;
pub use graphdb::GraphDB;
