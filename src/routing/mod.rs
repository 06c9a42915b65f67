//! Routing subsystem.
//!
//! # Data Flow
//! ```text
//! Route Compilation (at startup):
//!     catalog.rs (per-domain descriptor: service, method template, fields)
//!     → RoutePolicy (public reads, deadlines)
//!     → RouteEntry[] (six per domain)
//!     → Freeze as immutable RouteTable
//!
//! Incoming Request (verb, path)
//!     → router.rs (route lookup)
//!     → matcher.rs (segment matching, parameter capture)
//!     → Return: RouteMatch or RouteNotFound
//! ```
//!
//! # Design Decisions
//! - Routes generated from descriptors, never registered by hand
//! - No regex in hot path
//! - Deterministic: same input always matches same route

pub mod catalog;
pub mod matcher;
pub mod router;

pub use catalog::{DomainDescriptor, FieldKind, FieldSpec, Operation, ServiceId, DOMAINS};
pub use matcher::{PathParams, PathPattern};
pub use router::{AuthRequirement, RouteEntry, RouteMatch, RouteNotFound, RoutePolicy, RouteTable};
