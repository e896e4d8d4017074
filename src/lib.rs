pub mod auth;
pub mod config;
pub mod server;
pub mod storage;
pub mod topic;
