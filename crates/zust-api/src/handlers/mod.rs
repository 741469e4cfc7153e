//! Route handlers
//!
//! Handlers take already-decoded inputs and return [`ApiResult`](crate::ApiResult);
//! the embedding server does routing, body decoding and rendering through
//! [`ApiResponse`](crate::ApiResponse).

pub mod accounts;
pub mod auth;
pub mod media;

pub use accounts::AccountHandlers;
pub use auth::{AuthHandlers, REGISTERED_WITHOUT_EMAIL};
pub use media::MediaHandlers;
