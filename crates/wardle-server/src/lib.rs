// Wardle backend server: JSON API handlers and the HTTP transport.

pub mod api;
pub mod http;
