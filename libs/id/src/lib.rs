//! # meshform-id
//!
//! Names, composite identities, and resource ARNs for managed mesh objects.
//!
//! ## Design Principles
//!
//! - Names are user-controlled labels, validated once at the edge
//! - Identities have a canonical string representation with strict parsing
//! - Identities support roundtrip serialization (parse → format → parse)
//! - Names are typed to prevent mixing a mesh name with a node name
//!
//! ## Identity Format
//!
//! A virtual node is addressed by its parent mesh and its own name:
//! `{mesh}/{name}`
//!
//! Examples:
//! - `simpleapp/serviceBv1`
//! - `tf-test-mesh-1234/tf-test-node-5678`
//!
//! The same pair, plus partition, region, and account, forms the remote ARN:
//! `arn:aws:appmesh:us-west-2:123456789012:mesh/simpleapp/virtualNode/serviceBv1`

mod arn;
mod error;
mod macros;
mod types;

pub use arn::ResourceArn;
pub use error::IdError;
pub use types::*;
