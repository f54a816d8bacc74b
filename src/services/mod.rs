pub mod cache;
pub mod price;
pub mod safe;
pub mod verification;

pub use cache::CacheService;
pub use price::PriceService;
pub use safe::{SafeResolver, SafeTransactionService};
pub use verification::{VerificationService, VerificationSettings, MAX_BATCH_SIZE};
