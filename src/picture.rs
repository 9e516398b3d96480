//! Picture variants and the adapter from decoded images.

use crate::error::{Error, Result};
use crate::types::{rgba_bytes, unsupported, AlphaMode, ImageView, Subsampling};

/// Largest width or height libwebp accepts.
pub const MAX_DIMENSION: u32 = 16383;

/// Pixel data ready to be handed to the encoder.
///
/// Construct one with [`Picture::new`] from an [`ImageView`], or directly
/// from raw buffers via [`PackedPicture::new`] / [`PlanarPicture::new`].
/// A picture never changes after construction.
#[derive(Debug, Clone, Copy)]
pub enum Picture<'a> {
    /// Interleaved RGBA samples.
    Packed(PackedPicture<'a>),
    /// Separate Y, U and V planes.
    Planar(PlanarPicture<'a>),
}

impl<'a> Picture<'a> {
    /// Adapt a decoded image.
    ///
    /// Both RGBA flavours become [`Picture::Packed`] and YCbCr becomes
    /// [`Picture::Planar`]; buffers are borrowed, not copied. Any other
    /// layout fails with [`Error::UnsupportedFormat`].
    ///
    /// Premultiplied and straight alpha are imported by the same libwebp
    /// call, so semi-transparent premultiplied colors are not
    /// un-premultiplied. The [`AlphaMode`] is kept on the packed picture.
    ///
    /// # Example
    ///
    /// ```rust
    /// use imgref::ImgRef;
    /// use rgb::RGBA8;
    /// use webpx_bridge::{ImageView, Picture};
    ///
    /// let pixels = vec![RGBA8::new(255, 0, 0, 255); 4];
    /// let picture = Picture::new(ImageView::Nrgba(ImgRef::new(&pixels[..], 2, 2)))?;
    /// assert!(picture.is_packed());
    /// # Ok::<(), webpx_bridge::Error>(())
    /// ```
    pub fn new(image: ImageView<'a>) -> Result<Self> {
        match image {
            ImageView::Rgba(img) => Ok(Picture::Packed(PackedPicture::new(
                rgba_bytes(img.into_buf()),
                dimension("width", img.width())?,
                dimension("height", img.height())?,
                row_bytes(img.stride())?,
                AlphaMode::Premultiplied,
            )?)),
            ImageView::Nrgba(img) => Ok(Picture::Packed(PackedPicture::new(
                rgba_bytes(img.into_buf()),
                dimension("width", img.width())?,
                dimension("height", img.height())?,
                row_bytes(img.stride())?,
                AlphaMode::Straight,
            )?)),
            ImageView::YCbCr(planes) => Ok(Picture::Planar(PlanarPicture::new(
                planes.y,
                planes.cb,
                planes.cr,
                planes.width,
                planes.height,
                planes.y_stride,
                planes.c_stride,
                planes.subsampling,
            )?)),
            other => Err(unsupported(&other)),
        }
    }

    /// Picture width in pixels.
    #[must_use]
    pub fn width(&self) -> u32 {
        match self {
            Picture::Packed(p) => p.width,
            Picture::Planar(p) => p.width,
        }
    }

    /// Picture height in pixels.
    #[must_use]
    pub fn height(&self) -> u32 {
        match self {
            Picture::Packed(p) => p.height,
            Picture::Planar(p) => p.height,
        }
    }

    /// Whether this is the packed RGBA variant.
    #[must_use]
    pub fn is_packed(&self) -> bool {
        matches!(self, Picture::Packed(_))
    }

    /// Alpha interpretation of a packed picture; `None` for planar.
    #[must_use]
    pub fn alpha_mode(&self) -> Option<AlphaMode> {
        match self {
            Picture::Packed(p) => Some(p.alpha),
            Picture::Planar(_) => None,
        }
    }
}

impl<'a> TryFrom<ImageView<'a>> for Picture<'a> {
    type Error = Error;

    fn try_from(image: ImageView<'a>) -> Result<Self> {
        Picture::new(image)
    }
}

/// Interleaved RGBA picture.
#[derive(Debug, Clone, Copy)]
pub struct PackedPicture<'a> {
    pixels: &'a [u8],
    width: u32,
    height: u32,
    stride: usize,
    alpha: AlphaMode,
}

impl<'a> PackedPicture<'a> {
    /// Wrap RGBA bytes.
    ///
    /// `stride` is in bytes and may exceed `width * 4` for padded rows.
    pub fn new(
        pixels: &'a [u8],
        width: u32,
        height: u32,
        stride: usize,
        alpha: AlphaMode,
    ) -> Result<Self> {
        validate_dimensions(width, height)?;
        validate_plane("rgba", pixels.len(), width as usize * 4, height, stride)?;
        Ok(Self {
            pixels,
            width,
            height,
            stride,
            alpha,
        })
    }

    /// RGBA bytes.
    #[must_use]
    pub fn pixels(&self) -> &'a [u8] {
        self.pixels
    }

    /// Row stride in bytes.
    #[must_use]
    pub fn stride(&self) -> usize {
        self.stride
    }

    /// Alpha interpretation.
    #[must_use]
    pub fn alpha(&self) -> AlphaMode {
        self.alpha
    }

    /// Bytes libwebp reads: full stride for every row but the last.
    pub(crate) fn used_len(&self) -> usize {
        self.stride * (self.height as usize - 1) + self.width as usize * 4
    }
}

/// Planar YUV picture.
#[derive(Debug, Clone, Copy)]
pub struct PlanarPicture<'a> {
    y: &'a [u8],
    u: &'a [u8],
    v: &'a [u8],
    width: u32,
    height: u32,
    y_stride: usize,
    uv_stride: usize,
    subsampling: Subsampling,
}

impl<'a> PlanarPicture<'a> {
    /// Wrap Y, U and V planes.
    ///
    /// Chroma planes share `uv_stride`; their dimensions follow
    /// `subsampling`.
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        y: &'a [u8],
        u: &'a [u8],
        v: &'a [u8],
        width: u32,
        height: u32,
        y_stride: usize,
        uv_stride: usize,
        subsampling: Subsampling,
    ) -> Result<Self> {
        validate_dimensions(width, height)?;
        validate_plane("y", y.len(), width as usize, height, y_stride)?;

        let (uv_width, uv_height) = subsampling.chroma_dimensions(width, height);
        validate_plane("u", u.len(), uv_width as usize, uv_height, uv_stride)?;
        validate_plane("v", v.len(), uv_width as usize, uv_height, uv_stride)?;

        Ok(Self {
            y,
            u,
            v,
            width,
            height,
            y_stride,
            uv_stride,
            subsampling,
        })
    }

    /// Y (luma) plane.
    #[must_use]
    pub fn y(&self) -> &'a [u8] {
        self.y
    }

    /// U (chroma blue) plane.
    #[must_use]
    pub fn u(&self) -> &'a [u8] {
        self.u
    }

    /// V (chroma red) plane.
    #[must_use]
    pub fn v(&self) -> &'a [u8] {
        self.v
    }

    /// Y plane stride in bytes.
    #[must_use]
    pub fn y_stride(&self) -> usize {
        self.y_stride
    }

    /// U and V plane stride in bytes.
    #[must_use]
    pub fn uv_stride(&self) -> usize {
        self.uv_stride
    }

    /// Chroma subsampling ratio.
    #[must_use]
    pub fn subsampling(&self) -> Subsampling {
        self.subsampling
    }
}

/// Narrow a `usize` image dimension, rejecting values `u32` cannot hold.
fn dimension(name: &str, value: usize) -> Result<u32> {
    u32::try_from(value)
        .map_err(|_| Error::InvalidInput(format!("{} {} exceeds u32", name, value)))
}

fn row_bytes(stride_pixels: usize) -> Result<usize> {
    stride_pixels
        .checked_mul(4)
        .ok_or_else(|| Error::InvalidInput(format!("stride {} overflows", stride_pixels)))
}

pub(crate) fn validate_dimensions(width: u32, height: u32) -> Result<()> {
    if width == 0 || height == 0 {
        return Err(Error::InvalidInput(
            "width and height must be non-zero".into(),
        ));
    }
    if width > MAX_DIMENSION || height > MAX_DIMENSION {
        return Err(Error::InvalidInput(format!(
            "dimensions exceed maximum ({} x {})",
            MAX_DIMENSION, MAX_DIMENSION
        )));
    }
    Ok(())
}

fn validate_plane(
    name: &str,
    len: usize,
    row_bytes: usize,
    rows: u32,
    stride: usize,
) -> Result<()> {
    if stride < row_bytes {
        return Err(Error::InvalidInput(format!(
            "{} stride {} is smaller than row size {}",
            name, stride, row_bytes
        )));
    }
    // the last row need not be padded out to the full stride
    let expected = stride
        .saturating_mul(rows as usize - 1)
        .saturating_add(row_bytes);
    if len < expected {
        return Err(Error::InvalidInput(format!(
            "{} buffer too small: got {}, expected {}",
            name, len, expected
        )));
    }
    Ok(())
}

#[cfg(test)]
impl<'a> PackedPicture<'a> {
    /// Skip validation so tests can hand libwebp bounds it rejects.
    pub(crate) fn unchecked(pixels: &'a [u8], width: u32, height: u32, stride: usize) -> Self {
        Self {
            pixels,
            width,
            height,
            stride,
            alpha: AlphaMode::Straight,
        }
    }
}
