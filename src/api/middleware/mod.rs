pub mod auth_user;
pub mod trace_id;

pub use auth_user::AuthUser;
pub use trace_id::trace_id_middleware;
