pub mod claim;
pub mod common;
pub mod pagination;
pub mod promotion;
pub mod redemption;

pub use claim::*;
pub use common::*;
pub use pagination::*;
pub use promotion::*;
pub use redemption::*;
