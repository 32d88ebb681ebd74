mod model;
mod snapshot;
mod store;

pub use model::*;
pub use snapshot::*;
pub use store::*;
