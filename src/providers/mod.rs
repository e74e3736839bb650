//! Market data source implementations

pub mod cryptowatch;

pub use cryptowatch::CryptowatchProvider;
