pub mod checksum;
pub mod common;
pub mod logger;
