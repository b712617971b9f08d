//! Authentication and authorization for staff accounts
//!
//! # Modules
//!
//! - [`password`]: Argon2id password hashing and verification
//! - [`jwt`]: access and refresh token generation and validation
//! - [`middleware`]: bearer token extraction into an [`middleware::AuthContext`]
//! - [`authorization`]: the admin role gate
//!
//! # Example
//!
//! ```no_run
//! use foodbank_shared::auth::password::{hash_password, verify_password};
//! use foodbank_shared::auth::jwt::{create_token, Claims, TokenType};
//! use uuid::Uuid;
//!
//! # fn example() -> Result<(), Box<dyn std::error::Error>> {
//! let hash = hash_password("user_password")?;
//! assert!(verify_password("user_password", &hash)?);
//!
//! let claims = Claims::new(Uuid::new_v4(), None, TokenType::Access);
//! let token = create_token(&claims, "secret-key-at-least-32-bytes-long")?;
//! # Ok(())
//! # }
//! ```

pub mod authorization;
pub mod jwt;
pub mod middleware;
pub mod password;
