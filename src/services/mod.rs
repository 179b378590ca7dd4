pub mod auth;
pub use auth::{AuthService, can_modify};

pub mod credentials;

pub mod google;
pub use google::{GoogleClaims, GoogleVerifier, IdentityVerifier, VerifyError};

pub mod uploads;
pub use uploads::{UploadKind, UploadStore};
