pub mod auth;
pub mod guards;

pub use auth::{bearer_token, JwtTokenVerifier, TokenVerifier};
pub use guards::AuthenticatedUser;
