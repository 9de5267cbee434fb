//! Bearer-token resource server.
//!
//! Incoming requests on protected routes go through the authorization chain:
//! JWKS key resolution → RS256 token validation → `/userinfo` principal check.
//! The result is a per-request [`AuthCtx`](api::extractors::AuthCtx) that
//! handlers read through an extractor.

pub mod api;
pub mod app;
pub mod config;
pub mod error;
pub mod middleware;
pub mod services;
pub mod state;
