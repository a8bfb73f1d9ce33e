// Adapters layer: concrete implementations for external systems (files, exports, password managers).

pub mod bitwarden;
pub mod op_cli;
pub mod storage;

pub use op_cli::OpCli;
pub use storage::LocalStorage;
