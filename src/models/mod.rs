pub mod network;
pub mod price;
pub mod response;
pub mod transaction;

pub use network::*;
pub use price::*;
pub use response::*;
pub use transaction::*;
