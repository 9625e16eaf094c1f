//! # meshform-model
//!
//! In-memory state model for a service-mesh virtual node.
//!
//! ## Design Principles
//!
//! - A `Spec` is the desired configuration; it is validated as a whole and
//!   every violated constraint is reported, not just the first
//! - Repeated blocks are sets keyed by semantic identity (a listener by
//!   `port/protocol`, a backend by the virtual service it names)
//! - Exactly one service-discovery mechanism may be selected
//! - Observed state is only ever replaced by a fresh remote read
//!
//! ## Attribute Representation
//!
//! At the boundary a spec is a nested key-value tree (`Attributes`). Set
//! elements carry their key, so the tree is order-independent and diffs
//! over it are deterministic.

mod attributes;
mod error;
mod object;
mod spec;
mod validate;

pub use attributes::*;
pub use error::{ValidationError, Violation};
pub use object::*;
pub use spec::*;
