//! Error type shared by the whole conversion pipeline.
//!
//! ## Rust Lesson #20: Error Handling with thiserror
//!
//! Rust uses `Result<T, E>` instead of exceptions. Writing `Display` and
//! `std::error::Error` by hand for every variant gets old fast, so the
//! `thiserror` derive generates them from the `#[error(...)]` attributes.
//! `#[from]` additionally generates a `From` impl, which is what lets the
//! `?` operator convert an `std::io::Error` into our `Error` for free.

use thiserror::Error;

use crate::inline::BridgeError;
use crate::path::PathError;

/// Convenience alias used throughout the crate.
pub type Result<T> = std::result::Result<T, Error>;

#[derive(Debug, Error)]
pub enum Error {
    /// The markup itself is not well-formed XML.
    #[error("SVG parse error at position {position}: {message}")]
    Xml { position: u64, message: String },

    /// An attribute value could not be understood (length, viewBox, transform, points).
    #[error("invalid {attribute} value '{value}'")]
    Attribute { attribute: String, value: String },

    /// Malformed `d` attribute. The whole conversion stops; a half-parsed
    /// outline cannot be trusted.
    #[error("bad path data in '{item}': {source}")]
    Path {
        item: String,
        #[source]
        source: PathError,
    },

    #[error("SVG document has neither width/height nor a viewBox")]
    MissingSize,

    #[error("no valid layers found, maybe try --force Layer.Name")]
    NoLayers,

    #[error("the selected layers contain nothing that can be drawn")]
    NoContent,

    /// A layer name or one of its options is unusable.
    #[error("layer '{layer}': {message}")]
    Layer { layer: String, message: String },

    /// The inliner could not connect a hole without crossing other geometry.
    #[error("cannot inline holes of '{item}' on layer {layer}: {source}")]
    Bridge {
        layer: String,
        item: String,
        #[source]
        source: BridgeError,
    },

    /// Option combinations the output format cannot express.
    #[error("unsupported configuration: {0}")]
    Config(String),

    /// An existing legacy module file that the updater cannot make sense of.
    #[error("legacy module file: {0}")]
    Legacy(String),

    #[error(transparent)]
    Io(#[from] std::io::Error),

    #[error(transparent)]
    Fmt(#[from] std::fmt::Error),
}

impl Error {
    pub(crate) fn attribute(attribute: &str, value: &str) -> Self {
        Error::Attribute {
            attribute: attribute.to_string(),
            value: value.to_string(),
        }
    }
}
