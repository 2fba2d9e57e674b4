//! 中间件模块

mod auth;
mod panic;

pub use auth::{AuthUser, PUBLIC_PATHS, auth_middleware};
pub use panic::catch_panic_layer;
