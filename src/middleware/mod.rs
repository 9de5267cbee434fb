/*
 * Responsibility
 * - public interface of the middlewares
 *   - auth::access  : authorization chain on protected routes
 *   - cors / http / security_headers : router-wide layers
 */
pub mod auth;
pub mod cors;
pub mod http;
pub mod security_headers;
