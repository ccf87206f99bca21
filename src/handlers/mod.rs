pub mod claim;
pub mod promotion;
pub mod redemption;

pub use claim::claim_config;
pub use promotion::promotion_config;
pub use redemption::redemption_config;
