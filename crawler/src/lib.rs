pub mod batch;
pub mod bridge;
pub mod browser;
pub mod config;
pub mod fetcher;
pub mod realtime;
