pub mod config;
pub mod m3u;
pub mod platform;
pub mod protocol;
pub mod state;
