// Gateway logging benchmark - Library root for testing

pub mod bench;
pub mod config;
pub mod error;
pub mod gateway;
pub mod logging;
pub mod utils;
