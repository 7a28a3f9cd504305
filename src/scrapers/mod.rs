pub mod retry;
pub mod rightmove;
pub mod traits;
pub mod transport;
pub mod types;

#[cfg(test)]
pub(crate) mod testing;

pub use rightmove::RightmoveScraper;
pub use traits::{RunContext, SearchEngine};
pub use transport::{HttpTransport, Transport};
