pub mod claim_credential;
pub mod jwt;

pub use claim_credential::ClaimCredential;
pub use jwt::*;
