//! Tessera Auth — credential hashing, access/refresh token lifecycle,
//! session orchestration and the hierarchical authorization model.

pub mod authz;
pub mod config;
pub mod error;
pub mod password;
pub mod service;
pub mod token;

pub use authz::AuthzService;
pub use config::AuthConfig;
pub use error::AuthError;
pub use service::{AuthService, DeviceContext, LoginInput, LoginOutput};
pub use token::{AccessClaims, RefreshClaims};
