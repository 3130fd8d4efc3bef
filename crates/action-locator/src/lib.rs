//! Element resolution for Waypoint
//!
//! A [`LocatorSpec`] lists alternative ways of finding one semantic target, most
//! preferred first. The resolver walks them in order and returns the first element
//! of the first candidate that matches anything. There is no scoring and no healing:
//! ambiguity is resolved purely by declaration order.

pub mod errors;
pub mod resolver;
pub mod types;

pub use errors::*;
pub use resolver::*;
pub use types::*;
