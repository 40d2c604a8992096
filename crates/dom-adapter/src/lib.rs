//! DOM capability surface for the Pageflow workflow engine.
//!
//! This crate hosts the locator model, the [`DomBridge`] trait that execution
//! layers wire against, and an in-memory backend used by tests and demos. The
//! real in-page glue (content-script DOM access) lives outside this workspace
//! and implements the same trait.

pub mod bridge;
pub mod element;
pub mod errors;
pub mod locator;
pub mod memory;

pub use bridge::DomBridge;
pub use element::ElementHandle;
pub use errors::DomError;
pub use locator::{Locator, Strategy};
pub use memory::{ElementSpec, EventKind, MemoryDom};
