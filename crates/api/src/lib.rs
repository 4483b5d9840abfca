//! HTTP API: router, request/response mapping and the admin guard.

pub mod app;
pub mod middleware;
