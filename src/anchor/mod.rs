pub mod locate;

pub use locate::{AnchorSpec, Locate, Span};
