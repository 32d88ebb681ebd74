mod clients;
mod stores;

pub use clients::*;
pub use stores::*;
