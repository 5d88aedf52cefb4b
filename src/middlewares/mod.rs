pub mod auth;
pub mod cors;

pub use auth::{AuthMiddleware, AuthUser, current_user, optional_user, require_admin, require_staff};
pub use cors::create_cors;
