pub mod bulk_list;
pub mod cli;
pub mod load_config;
pub mod sheet;

pub use cli::{run, Cli, Commands};
