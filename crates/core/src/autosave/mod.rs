//! Debounced auto-save: model, persistence contract, and the controller.

mod controller;
mod model;
mod traits;

pub use controller::*;
pub use model::*;
pub use traits::*;
