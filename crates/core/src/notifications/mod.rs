//! Realtime notification mirror: models, contracts, and the store.

mod model;
mod store;
mod traits;

pub use model::*;
pub use store::*;
pub use traits::*;
