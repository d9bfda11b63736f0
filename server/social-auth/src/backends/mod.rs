mod facebook;
mod twitter;

pub use facebook::FacebookConnectBackend;
pub use twitter::TwitterBackend;
