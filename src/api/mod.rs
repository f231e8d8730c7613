// HTTP surface over the normalized store. Thin by design: handlers compose
// filters into parameterized queries and nothing else.

pub mod handlers;
pub mod models;
pub mod routes;
pub mod server;

pub use server::ApiServer;
