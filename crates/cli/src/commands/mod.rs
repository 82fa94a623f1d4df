pub mod bootstrap;
pub mod chat;
pub mod config_cmd;
pub mod ingest;
pub mod search;
pub mod serve;
