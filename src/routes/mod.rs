//! HTTP route handlers grouped by resource domain.
//!
//! Each submodule corresponds to a logical area of the public surface
//! (indexing, querying, admin, health) and exposes typed Rocket handlers
//! annotated with `#[openapi]` so `rocket_okapi` can derive an OpenAPI
//! document automatically.

pub mod admin;
pub mod ask;
pub mod email;
pub mod health;
pub mod index;
pub mod status;
