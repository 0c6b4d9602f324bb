pub mod cli;
pub mod manifest;

pub use cli::{
    build_cli_command, BatchCommands, Cli, Commands, ImportCommands, MdlCommands, RunFormat, RunsCommands,
    ScenariosCommands,
};
