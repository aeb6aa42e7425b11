//! HTTP inbound adapter: health probes and domain error rendering.

pub mod error;
pub mod health;

pub use error::ApiResult;
