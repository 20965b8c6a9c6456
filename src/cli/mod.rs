pub mod commands;
pub mod completions;
pub mod run;
