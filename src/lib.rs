pub mod constants;
pub mod engine;
pub mod error;
pub mod game_store;
pub mod ledger;
pub mod pending;
pub mod scheduler;
pub mod server_protocol;
pub mod types;
