//! Built-in filter implementations.
//!
//! This module contains the node kinds every registry starts with.

mod buffer;
mod audio;
mod routing;

use crate::filters::registry::FilterRegistry;

/// Register all built-in kinds.
pub fn register_all(registry: &mut FilterRegistry) {
    buffer::register(registry);
    audio::register(registry);
    routing::register(registry);
}

// Re-export for direct access
pub use buffer::{BufferSink, BufferSource};
pub use audio::{Anull, Head, Volume};
pub use routing::{AMix, ASplit, MixDuration};
