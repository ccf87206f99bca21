pub mod claim_count_service;
pub mod claim_service;
pub(crate) mod locking;
pub mod promotion_service;
pub mod redemption_service;
pub mod user_service;
pub mod venue_service;

pub use claim_count_service::*;
pub use claim_service::*;
pub use promotion_service::*;
pub use redemption_service::*;
pub use user_service::*;
pub use venue_service::*;
