//! Page driver port for Waypoint.
//!
//! The engine talks to the browser exclusively through [`PageDriver`]. Two backends
//! ship here: [`ChromiumDriver`] drives a real Chromium over the DevTools protocol,
//! and [`ScriptedDriver`] renders an in-memory page for tests and offline demos.

pub mod chromium;
pub mod config;
pub mod driver;
pub mod error;
pub mod scripted;
mod scripts;

pub use chromium::ChromiumDriver;
pub use config::CdpConfig;
pub use driver::PageDriver;
pub use error::{AdapterError, AdapterErrorKind};
pub use scripted::{
    Effect, InputPath, InteractionRecord, Route, ScriptedDriver, ScriptedElement, ScriptedSite,
};
