//! Resource path resolution.
//!
//! Turns a URL-style resource path (or an MQTT topic, which uses the same
//! grammar) into a typed, ordered sequence of navigation steps plus a request
//! classification:
//!
//! ```text
//! "/Groups(sdf)/Relations"
//!   → tokenize  → [Segment(Groups), Identifier(sdf), PropertySuffix(Relations)]
//!   → resolve   → Collection [Relations, Groups(sdf)]
//! ```
//!
//! Resolution is pure: a [`PathResolver`] only holds an `Arc` to the immutable
//! entity model and may be shared across threads.

pub mod error;
pub mod lexer;
pub mod resolved;
pub mod resolver;
pub mod settings;

pub use error::InvalidUrlError;
pub use lexer::{tokenize, Token};
pub use resolved::{format_identifier, PathModifier, PathSegment, PathType, ResolvedPath};
pub use resolver::PathResolver;
pub use settings::PathSettings;
