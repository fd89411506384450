//! Page screenshots through a proxy session
//!
//! The core abstraction is the [`ScreenshotRenderer`] trait. Implementations:
//!
//! - [`CommandScreenshotRenderer`]: runs an external renderer executable
//! - [`NoOpScreenshotRenderer`]: stub used when no renderer is installed
//!
//! Rendering is expensive, so every render first takes a slot from the
//! process-wide [`ScreenshotLimiter`], which is shared by all runs.
//!
//! ```no_run
//! use geoprobe::screenshot::{CommandScreenshotRenderer, NoOpScreenshotRenderer, ScreenshotRenderer};
//! use std::sync::Arc;
//!
//! let renderer: Arc<dyn ScreenshotRenderer> = match CommandScreenshotRenderer::from_path() {
//!     Some(renderer) => Arc::new(renderer),
//!     None => Arc::new(NoOpScreenshotRenderer),
//! };
//! println!("screenshots via {}", renderer.name());
//! ```

mod command;
mod limiter;
mod noop;
mod traits;

pub use command::{CommandScreenshotRenderer, DEFAULT_RENDERER_BINARY};
pub use limiter::{ScreenshotLimiter, ScreenshotPermit};
pub use noop::NoOpScreenshotRenderer;
pub use traits::{ScreenshotOptions, ScreenshotRenderer};
