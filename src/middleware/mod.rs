pub mod auth;

pub use auth::{current_user, CurrentUser};
