// Library root: configuration, Lahman dataset loading, the query service and
// static team metadata.

pub mod config;
pub mod dataset;
pub mod query;
pub mod teams;
