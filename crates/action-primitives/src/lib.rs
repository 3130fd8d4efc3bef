//! Action primitives for Waypoint
//!
//! Two building blocks sit between resolution and orchestration:
//! - [`WaitStrategy::await_ready`] re-resolves a locator until the element reaches a
//!   readiness predicate (attached, visible, checked) or the wait budget runs out
//! - [`ActionPrimitives::perform`] delivers an interaction through an ordered chain of
//!   techniques (standard, forced, programmatic), each under its own timeout

pub mod errors;
mod primitives;
pub mod types;
mod waiting;

pub use errors::*;
pub use primitives::*;
pub use types::*;
pub use waiting::*;
