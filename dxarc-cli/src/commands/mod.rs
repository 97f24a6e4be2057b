//! Command implementations for DxArc CLI.

pub mod create;
pub mod extract;
pub mod info;
pub mod list;

pub use create::{CreateOptions, cmd_create};
pub use extract::{ExtractOptions, cmd_extract};
pub use info::cmd_info;
pub use list::{ListOptions, cmd_list};
