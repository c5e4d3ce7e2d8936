//! Upstream data sources and the shared HTTP plumbing in front of them.

pub mod cache;
pub mod ergast;
pub mod http;
pub mod openf1;

pub use cache::{CacheSettings, CacheUsage, ResponseCache};
pub use ergast::ErgastClient;
pub use http::HttpFetcher;
pub use openf1::OpenF1Client;
