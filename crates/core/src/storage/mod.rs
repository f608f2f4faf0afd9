pub mod database_config;
pub mod models;
pub mod psql_manager;
pub mod schema;
