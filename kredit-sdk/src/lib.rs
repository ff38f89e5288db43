#[cfg(feature = "client")]
pub mod client;
pub mod objects;
pub mod session;
