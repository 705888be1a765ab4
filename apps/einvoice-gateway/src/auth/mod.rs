//! Session tokens and password hashing

pub mod jwt;
pub mod password;

pub use jwt::{generate_session_token, strip_bearer, validate_session_token};
pub use password::{hash_password, verify_password};
