//! One-call encoding of decoded images.

use crate::config::EncodeConfig;
use crate::error::Result;
use crate::handle::PictureHandle;
use crate::picture::Picture;
use crate::types::ImageView;
use std::io::Write;

/// Encode a decoded image into `sink`.
///
/// Runs the whole picture lifecycle: adapt, initialize, populate, encode,
/// free. Returns the number of bytes written. Unsupported layouts fail
/// before libwebp is touched.
///
/// # Example
///
/// ```rust
/// use imgref::ImgRef;
/// use rgb::RGBA8;
/// use webpx_bridge::{encode_image, EncodeConfig, ImageView};
///
/// let pixels = vec![RGBA8::new(0, 128, 255, 255); 16 * 16];
/// let mut webp = Vec::new();
/// encode_image(
///     ImageView::Nrgba(ImgRef::new(&pixels[..], 16, 16)),
///     &mut webp,
///     &EncodeConfig::new().quality(85.0),
/// )?;
/// assert_eq!(&webp[..4], b"RIFF");
/// # Ok::<(), webpx_bridge::Error>(())
/// ```
pub fn encode_image<W: Write + Send>(
    image: ImageView<'_>,
    sink: &mut W,
    config: &EncodeConfig,
) -> Result<u64> {
    let picture = Picture::new(image)?;
    let mut handle = PictureHandle::new(picture);
    handle.initialize()?;
    let written = handle.encode(sink, config)?;
    handle.free();
    Ok(written)
}

/// Encode a decoded image into a new buffer.
pub fn encode_to_vec(image: ImageView<'_>, config: &EncodeConfig) -> Result<Vec<u8>> {
    let mut output = Vec::new();
    encode_image(image, &mut output, config)?;
    Ok(output)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::Error;
    use imgref::ImgRef;
    use rgb::alt::BGRA8;

    #[test]
    fn test_unsupported_layout_writes_nothing() {
        let pixels = vec![BGRA8 { b: 0, g: 0, r: 255, a: 255 }; 4];
        let mut out = Vec::new();
        let err = encode_image(
            ImageView::Bgra(ImgRef::new(&pixels[..], 2, 2)),
            &mut out,
            &EncodeConfig::new(),
        )
        .unwrap_err();
        assert_eq!(err, Error::UnsupportedFormat("bgra".into()));
        assert!(out.is_empty());
    }

    #[test]
    fn test_encode_to_vec_gray_ycbcr() {
        let y = [128u8; 8 * 8];
        let c = [128u8; 4 * 4];
        let webp = encode_to_vec(
            ImageView::YCbCr(crate::types::YCbCrRef {
                y: &y,
                cb: &c,
                cr: &c,
                y_stride: 8,
                c_stride: 4,
                subsampling: crate::types::Subsampling::S420,
                width: 8,
                height: 8,
            }),
            &EncodeConfig::new(),
        )
        .unwrap();
        assert_eq!(&webp[..4], b"RIFF");
    }
}
