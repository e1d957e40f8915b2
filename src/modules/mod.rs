pub mod thumbnail;
pub mod transcode;
