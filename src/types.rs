//! Decoded-image views handed in by the surrounding application.

use crate::error::Error;
use imgref::ImgRef;
use rgb::alt::BGRA8;
use rgb::{RGB8, RGBA8};

/// Chroma subsampling ratio of a planar YCbCr image.
///
/// The ratio describes chroma resolution relative to luma.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Subsampling {
    /// Full-resolution chroma.
    S444,
    /// Half horizontal chroma resolution.
    S422,
    /// Half horizontal and half vertical chroma resolution.
    #[default]
    S420,
    /// Half vertical chroma resolution.
    S440,
    /// Quarter horizontal chroma resolution.
    S411,
    /// Quarter horizontal and half vertical chroma resolution.
    S410,
}

impl Subsampling {
    /// Chroma plane dimensions for a luma plane of `width` x `height`.
    ///
    /// Partial chroma samples at the right/bottom edge round up.
    #[must_use]
    pub const fn chroma_dimensions(self, width: u32, height: u32) -> (u32, u32) {
        match self {
            Subsampling::S444 => (width, height),
            Subsampling::S422 => (width.div_ceil(2), height),
            Subsampling::S420 => (width.div_ceil(2), height.div_ceil(2)),
            Subsampling::S440 => (width, height.div_ceil(2)),
            Subsampling::S411 => (width.div_ceil(4), height),
            Subsampling::S410 => (width.div_ceil(4), height.div_ceil(2)),
        }
    }
}

/// How the color channels of packed RGBA samples relate to alpha.
///
/// Both modes are imported the same way: libwebp treats every packed
/// picture as straight alpha, so semi-transparent premultiplied pixels
/// encode darker than intended. The mode is kept on each
/// [`PackedPicture`](crate::PackedPicture) for the caller and for a future
/// un-premultiply step.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AlphaMode {
    /// Color channels are already multiplied by alpha.
    Premultiplied,
    /// Color channels are independent of alpha.
    Straight,
}

/// Borrowed planar YCbCr image.
#[derive(Debug, Clone, Copy)]
pub struct YCbCrRef<'a> {
    /// Y (luma) plane data.
    pub y: &'a [u8],
    /// Cb (chroma blue) plane data.
    pub cb: &'a [u8],
    /// Cr (chroma red) plane data.
    pub cr: &'a [u8],
    /// Y plane stride in bytes.
    pub y_stride: usize,
    /// Cb and Cr plane stride in bytes.
    pub c_stride: usize,
    /// Chroma subsampling ratio.
    pub subsampling: Subsampling,
    /// Image width.
    pub width: u32,
    /// Image height.
    pub height: u32,
}

/// A decoded image as produced by an upstream decoder.
///
/// Only [`Rgba`](ImageView::Rgba), [`Nrgba`](ImageView::Nrgba) and
/// [`YCbCr`](ImageView::YCbCr) can be turned into a
/// [`Picture`](crate::Picture); the remaining layouts must be converted by
/// the caller first.
#[derive(Debug, Clone, Copy)]
#[non_exhaustive]
pub enum ImageView<'a> {
    /// Packed RGBA with premultiplied alpha.
    Rgba(ImgRef<'a, RGBA8>),
    /// Packed RGBA with straight (non-premultiplied) alpha.
    Nrgba(ImgRef<'a, RGBA8>),
    /// Planar YCbCr with chroma subsampling.
    YCbCr(YCbCrRef<'a>),
    /// Packed RGB without alpha.
    Rgb(ImgRef<'a, RGB8>),
    /// Packed BGRA.
    Bgra(ImgRef<'a, BGRA8>),
    /// 8-bit grayscale.
    Gray(ImgRef<'a, u8>),
}

impl<'a> ImageView<'a> {
    /// Short name of the pixel layout, used in error messages.
    #[must_use]
    pub fn layout_name(&self) -> &'static str {
        match self {
            ImageView::Rgba(_) => "rgba",
            ImageView::Nrgba(_) => "nrgba",
            ImageView::YCbCr(_) => "ycbcr",
            ImageView::Rgb(_) => "rgb",
            ImageView::Bgra(_) => "bgra",
            ImageView::Gray(_) => "gray",
        }
    }

    /// Image dimensions, saturating at `u32::MAX`.
    #[must_use]
    pub fn dimensions(&self) -> (u32, u32) {
        let (width, height) = match self {
            ImageView::Rgba(img) | ImageView::Nrgba(img) => (img.width(), img.height()),
            ImageView::YCbCr(planes) => return (planes.width, planes.height),
            ImageView::Rgb(img) => (img.width(), img.height()),
            ImageView::Bgra(img) => (img.width(), img.height()),
            ImageView::Gray(img) => (img.width(), img.height()),
        };
        (saturate(width), saturate(height))
    }

    /// Borrow an [`image::DynamicImage`].
    ///
    /// 8-bit RGBA becomes [`ImageView::Nrgba`] (the `image` crate stores
    /// straight alpha). Colour types with no matching view fail with
    /// [`Error::UnsupportedFormat`].
    #[cfg(feature = "image")]
    pub fn from_dynamic(img: &'a image::DynamicImage) -> crate::Result<Self> {
        use rgb::FromSlice;

        let (width, height) = (img.width() as usize, img.height() as usize);
        match img {
            image::DynamicImage::ImageRgba8(buf) => Ok(ImageView::Nrgba(ImgRef::new(
                buf.as_raw().as_rgba(),
                width,
                height,
            ))),
            image::DynamicImage::ImageRgb8(buf) => Ok(ImageView::Rgb(ImgRef::new(
                buf.as_raw().as_rgb(),
                width,
                height,
            ))),
            image::DynamicImage::ImageLuma8(buf) => Ok(ImageView::Gray(ImgRef::new(
                buf.as_raw().as_slice(),
                width,
                height,
            ))),
            other => Err(Error::UnsupportedFormat(format!("{:?}", other.color()))),
        }
    }
}

fn saturate(value: usize) -> u32 {
    u32::try_from(value).unwrap_or(u32::MAX)
}

/// Reinterpret packed RGBA samples as bytes.
pub(crate) fn rgba_bytes(pixels: &[RGBA8]) -> &[u8] {
    // SAFETY: RGBA8 is repr(C) and has the same layout as [u8; 4]
    unsafe { core::slice::from_raw_parts(pixels.as_ptr() as *const u8, pixels.len() * 4) }
}

/// Reject a view that cannot become a picture.
pub(crate) fn unsupported(view: &ImageView<'_>) -> Error {
    Error::UnsupportedFormat(view.layout_name().into())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_chroma_dimensions() {
        assert_eq!(Subsampling::S444.chroma_dimensions(5, 3), (5, 3));
        assert_eq!(Subsampling::S422.chroma_dimensions(5, 3), (3, 3));
        assert_eq!(Subsampling::S420.chroma_dimensions(5, 3), (3, 2));
        assert_eq!(Subsampling::S440.chroma_dimensions(5, 3), (5, 2));
        assert_eq!(Subsampling::S411.chroma_dimensions(5, 3), (2, 3));
        assert_eq!(Subsampling::S410.chroma_dimensions(5, 3), (2, 2));
    }

    #[test]
    fn test_rgba_bytes() {
        let px = [RGBA8::new(1, 2, 3, 4), RGBA8::new(5, 6, 7, 8)];
        assert_eq!(rgba_bytes(&px), &[1, 2, 3, 4, 5, 6, 7, 8]);
    }

    #[test]
    fn test_layout_names() {
        let gray = [0u8; 4];
        let view = ImageView::Gray(ImgRef::new(&gray[..], 2, 2));
        assert_eq!(view.layout_name(), "gray");
        assert_eq!(view.dimensions(), (2, 2));
        assert_eq!(saturate(usize::MAX), u32::MAX);
        assert_eq!(unsupported(&view), Error::UnsupportedFormat("gray".into()));
    }

    #[cfg(feature = "image")]
    #[test]
    fn test_from_dynamic() {
        let img = image::DynamicImage::new_rgba8(3, 2);
        let view = ImageView::from_dynamic(&img).unwrap();
        assert_eq!(view.layout_name(), "nrgba");
        assert_eq!(view.dimensions(), (3, 2));

        let img = image::DynamicImage::new_luma_a8(1, 1);
        assert!(matches!(
            ImageView::from_dynamic(&img),
            Err(Error::UnsupportedFormat(_))
        ));
    }
}
