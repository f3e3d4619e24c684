pub mod config;
pub mod http;
pub mod jamf;
pub mod snipeit;
pub mod sync;
