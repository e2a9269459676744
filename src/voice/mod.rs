pub mod adapter;
pub mod connection;
pub mod transport;

#[cfg(test)]
pub(crate) mod testing;

pub use adapter::*;
pub use connection::*;
pub use transport::*;
