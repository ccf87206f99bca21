pub mod promotion_claims;
pub mod promotions;
pub mod users;
pub mod venue_staff;
pub mod venues;

pub use promotion_claims::ClaimStatus;
pub use promotions::PromotionType;

pub use promotion_claims as promotion_claim_entity;
pub use promotions as promotion_entity;
pub use users as user_entity;
pub use venue_staff as venue_staff_entity;
pub use venues as venue_entity;
