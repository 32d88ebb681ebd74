mod lodestone_client;

pub use lodestone_client::*;
