//! Asset Loader: resolves the model identifier, fetches the asset, and decodes it
//! into a scene node.
//!
//! # Invariants
//! - Each [`LoadRequest`] resolves exactly once: success, failure, or cancellation.
//! - Loading never touches the scene graph. Results are handed back through a
//!   callback and applied by the caller on its own thread.
//! - Compressed geometry is always delegated to a [`GeometryDecoder`].

pub mod decoder;
pub mod import;
pub mod loader;
pub mod source;

pub use decoder::{DecodeError, DecoderConfig, GeometryDecoder, UnavailableDecoder, default_decoder};
pub use loader::{AssetLoader, LoadError, LoadRequest, LoadStatus};
pub use source::{MODEL_PARAM, ModelSource, SourceError, SourceLocation};

pub fn crate_info() -> &'static str {
    "modelview-assets v0.1.0"
}
