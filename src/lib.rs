pub mod config;
pub mod errors;
pub mod mcp;
pub mod querier;
pub mod query;
pub mod tools;
pub mod types;
