pub mod app;
pub mod commands;
pub mod demo;
pub mod dispatch;
pub mod env;
pub mod output;
pub mod plan;
pub mod run;
pub mod runtime;

pub use output::OutputFormat;
