//! Middleware for HTTP request processing: admin token checks and
//! response security headers.

pub mod auth;
pub mod security_headers;
