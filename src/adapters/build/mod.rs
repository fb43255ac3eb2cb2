//! Build tool adapters.

pub mod command;
pub mod scripted;

pub use command::CommandBuildTool;
pub use scripted::ScriptedBuildTool;
