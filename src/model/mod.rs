//! Declarative rules: translets, aspects, exception handling and the
//! name patterns that bind them together.

pub mod aspect_rule;
pub mod method;
pub mod pattern;
pub mod translet_rule;

pub use aspect_rule::*;
pub use method::*;
pub use pattern::*;
pub use translet_rule::*;
