pub mod deal;
pub mod store_account;
pub mod token;

pub use deal::{Deal, NearbyDeal, NewDeal};
pub use store_account::{PublicStore, StoreAccount};
pub use token::RefreshTokenRecord;
