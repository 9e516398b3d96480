//! # webpx-bridge
//!
//! Streams decoded images through libwebp into any [`std::io::Write`] sink.
//!
//! This crate wraps libwebp via FFI to provide:
//! - A [`Picture`] adapter for packed RGBA/NRGBA and planar YCbCr images
//! - An owned [`PictureHandle`] with deterministic native cleanup
//! - A memoized [`EncodeConfig`]
//! - A [`WriterRegistry`] routing libwebp's output callbacks to the right
//!   sink, safe for concurrent encodes
//!
//! ## Quick Start
//!
//! ```rust
//! use imgref::ImgRef;
//! use rgb::RGBA8;
//! use webpx_bridge::{EncodeConfig, ImageView, Picture, PictureHandle};
//!
//! // 2x2 opaque red
//! let pixels = vec![RGBA8::new(255, 0, 0, 255); 4];
//! let picture = Picture::new(ImageView::Nrgba(ImgRef::new(&pixels[..], 2, 2)))?;
//!
//! let config = EncodeConfig::new().lossless(true).method(0).quality(100.0);
//! let mut handle = PictureHandle::new(picture);
//! handle.initialize()?;
//!
//! let mut webp = Vec::new();
//! handle.encode(&mut webp, &config)?;
//! handle.free();
//!
//! assert_eq!(&webp[8..12], b"WEBP");
//! # Ok::<(), webpx_bridge::Error>(())
//! ```
//!
//! ## Alpha
//!
//! Premultiplied ([`ImageView::Rgba`]) and straight ([`ImageView::Nrgba`])
//! RGBA go through the same libwebp import, which assumes straight alpha.
//! Semi-transparent premultiplied pixels therefore come out darker. The
//! [`AlphaMode`] is recorded on every packed picture.

#![deny(unsafe_op_in_unsafe_fn)]
#![warn(missing_docs)]

mod config;
mod encode;
mod error;
mod handle;
mod picture;
mod streaming;
mod types;

// Re-exports
pub use config::{EncodeConfig, ImageHint, Preset};
pub use encode::{encode_image, encode_to_vec};
pub use error::{EncodingError, Error, InitStage, Result};
pub use handle::{HandleState, PictureHandle};
pub use picture::{PackedPicture, Picture, PlanarPicture, MAX_DIMENSION};
pub use streaming::{PictureId, Registration, WriterRegistry};
pub use types::{AlphaMode, ImageView, Subsampling, YCbCrRef};

/// Library version information.
pub fn version() -> (u32, u32, u32) {
    let v = unsafe { libwebp_sys::WebPGetEncoderVersion() } as u32;
    ((v >> 16) & 0xff, (v >> 8) & 0xff, v & 0xff)
}
