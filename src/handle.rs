//! Owned native picture for a single encode.

use crate::config::EncodeConfig;
use crate::error::{EncodingError, Error, InitStage, Result};
use crate::picture::{PackedPicture, Picture, PlanarPicture};
use crate::streaming::{write_chunk, PictureId, WriterRegistry};
use crate::types::Subsampling;
use core::ffi::c_int;
use core::fmt;
use std::io::Write;
use tracing::{debug, warn};

/// Lifecycle state of a [`PictureHandle`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HandleState {
    /// Native picture not yet allocated.
    Uninitialized,
    /// Native buffers allocated; ready to populate and encode.
    Allocated,
    /// Native buffers released.
    Freed,
}

impl fmt::Display for HandleState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let msg = match self {
            HandleState::Uninitialized => "uninitialized",
            HandleState::Allocated => "allocated",
            HandleState::Freed => "freed",
        };
        write!(f, "{}", msg)
    }
}

/// A libwebp `WebPPicture` wrapping one [`Picture`] for one encode.
///
/// Lifecycle: [`initialize`](Self::initialize) allocates the native
/// buffers, [`encode`](Self::encode) populates them from the picture and
/// runs the encoder, [`free`](Self::free) releases everything. `free` is
/// idempotent, a no-op before initialization, and runs on drop, so every
/// exit path releases the native memory.
///
/// Pixel copies handed to libwebp are owned by the handle and released
/// together with the native picture in `free`, whichever variant produced
/// them. Planar population stores raw plane pointers in the native
/// structure, so those copies must outlive the encode call.
///
/// # Example
///
/// ```rust
/// use webpx_bridge::{AlphaMode, EncodeConfig, PackedPicture, Picture, PictureHandle};
///
/// let red = [255u8, 0, 0, 255].repeat(4);
/// let picture = Picture::Packed(PackedPicture::new(&red, 2, 2, 8, AlphaMode::Straight)?);
///
/// let mut handle = PictureHandle::new(picture);
/// handle.initialize()?;
///
/// let mut webp = Vec::new();
/// let written = handle.encode(&mut webp, &EncodeConfig::new_lossless())?;
/// handle.free();
///
/// assert_eq!(written as usize, webp.len());
/// assert_eq!(&webp[..4], b"RIFF");
/// # Ok::<(), webpx_bridge::Error>(())
/// ```
pub struct PictureHandle<'p> {
    picture: Picture<'p>,
    // boxed so the native address, our correlation key, never moves
    native: Box<libwebp_sys::WebPPicture>,
    state: HandleState,
    buffers: Vec<Vec<u8>>,
}

// SAFETY: the native picture only points into memory owned by this handle
// (libwebp's allocation and `buffers`), so it can move between threads.
unsafe impl Send for PictureHandle<'_> {}

impl fmt::Debug for PictureHandle<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PictureHandle")
            .field("id", &self.id())
            .field("state", &self.state)
            .field("width", &self.picture.width())
            .field("height", &self.picture.height())
            .finish()
    }
}

impl<'p> PictureHandle<'p> {
    /// Wrap a picture. No native call is made until
    /// [`initialize`](Self::initialize).
    pub fn new(picture: Picture<'p>) -> Self {
        Self {
            picture,
            // SAFETY: WebPPicture is plain C data; all-zero is a valid
            // (null pointers, no callbacks) value until WebPPictureInit runs.
            native: Box::new(unsafe { core::mem::zeroed() }),
            state: HandleState::Uninitialized,
            buffers: Vec::new(),
        }
    }

    /// The wrapped picture.
    pub fn picture(&self) -> &Picture<'p> {
        &self.picture
    }

    /// Current lifecycle state.
    pub fn state(&self) -> HandleState {
        self.state
    }

    /// Identity of the native picture, used to route encoder output.
    pub fn id(&self) -> PictureId {
        PictureId::of(&*self.native)
    }

    /// Initialize the native picture and allocate buffers for its bounds.
    ///
    /// Packed pictures get an ARGB buffer, planar pictures a YUV420 one.
    /// On failure the handle stays [`HandleState::Uninitialized`].
    pub fn initialize(&mut self) -> Result<()> {
        if self.state != HandleState::Uninitialized {
            return Err(Error::InvalidState(self.state));
        }

        if !unsafe { libwebp_sys::WebPPictureInit(&mut *self.native) } {
            return Err(Error::InitializationFailed {
                stage: InitStage::Init,
                status: 0,
            });
        }

        self.native.width = self.picture.width() as c_int;
        self.native.height = self.picture.height() as c_int;
        match self.picture {
            Picture::Packed(_) => self.native.use_argb = 1,
            Picture::Planar(_) => {
                self.native.use_argb = 0;
                self.native.colorspace = libwebp_sys::WebPEncCSP::WEBP_YUV420;
            }
        }

        let status = unsafe { libwebp_sys::WebPPictureAlloc(&mut *self.native) };
        if status == 0 {
            return Err(Error::InitializationFailed {
                stage: InitStage::Alloc,
                status,
            });
        }

        self.state = HandleState::Allocated;
        debug!(
            id = ?self.id(),
            width = self.picture.width(),
            height = self.picture.height(),
            packed = self.picture.is_packed(),
            "picture allocated"
        );
        Ok(())
    }

    /// Copy the picture's pixels into the native picture.
    ///
    /// Called by [`encode`](Self::encode); exposed for callers driving
    /// libwebp themselves.
    pub fn populate(&mut self) -> Result<()> {
        if self.state != HandleState::Allocated {
            return Err(Error::InvalidState(self.state));
        }
        // copies from an earlier populate are no longer referenced: the RGBA
        // import copied them and the planar pointers are reassigned below
        self.buffers.clear();
        match self.picture {
            Picture::Packed(packed) => self.import_rgba(packed),
            Picture::Planar(planar) => self.assign_yuv(planar),
        }
    }

    fn import_rgba(&mut self, packed: PackedPicture<'p>) -> Result<()> {
        let stride = c_int::try_from(packed.stride())
            .map_err(|_| Error::InvalidInput(format!("stride {} too large", packed.stride())))?;

        // TODO: un-premultiply AlphaMode::Premultiplied input before import;
        // libwebp expects straight alpha. The gap is described on
        // `crate::AlphaMode`.
        let pixels = packed.pixels()[..packed.used_len()].to_vec();
        let ptr = pixels.as_ptr();
        self.buffers.push(pixels);

        let status = unsafe { libwebp_sys::WebPPictureImportRGBA(&mut *self.native, ptr, stride) };
        if status == 0 {
            return Err(Error::ImportFailed {
                status,
                code: EncodingError::from(self.native.error_code as i32),
            });
        }
        Ok(())
    }

    fn assign_yuv(&mut self, planar: PlanarPicture<'p>) -> Result<()> {
        if planar.subsampling() != Subsampling::S420 {
            return Err(Error::UnsupportedFormat(format!(
                "ycbcr {:?} (libwebp takes 4:2:0 planes only)",
                planar.subsampling()
            )));
        }
        let y_stride = c_int::try_from(planar.y_stride())
            .map_err(|_| Error::InvalidInput("y stride too large".into()))?;
        let uv_stride = c_int::try_from(planar.uv_stride())
            .map_err(|_| Error::InvalidInput("uv stride too large".into()))?;

        let mut y = planar.y().to_vec();
        let mut u = planar.u().to_vec();
        let mut v = planar.v().to_vec();

        // moving a Vec keeps its heap buffer in place
        self.native.y = y.as_mut_ptr();
        self.native.u = u.as_mut_ptr();
        self.native.v = v.as_mut_ptr();
        self.native.y_stride = y_stride;
        self.native.uv_stride = uv_stride;
        self.buffers.extend([y, u, v]);
        Ok(())
    }

    /// Encode into `sink` through the process-wide [`WriterRegistry`].
    ///
    /// Returns the number of bytes delivered to the sink. On failure,
    /// bytes already delivered stay in the sink.
    pub fn encode<W: Write + Send>(&mut self, sink: &mut W, config: &EncodeConfig) -> Result<u64> {
        self.encode_with(WriterRegistry::global(), sink, config)
    }

    /// Encode into `sink`, routing output through `registry`.
    ///
    /// Populates the native picture and runs `WebPEncode`. The sink is
    /// registered only for the duration of this call. A sink error fails
    /// the encode with [`EncodingError::BadWrite`].
    pub fn encode_with<W: Write + Send>(
        &mut self,
        registry: &WriterRegistry,
        sink: &mut W,
        config: &EncodeConfig,
    ) -> Result<u64> {
        if self.state != HandleState::Allocated {
            return Err(Error::InvalidState(self.state));
        }
        let webp_config = config.materialize()?;
        self.populate()?;

        self.native.writer = Some(write_chunk);
        self.native.custom_ptr = registry as *const WriterRegistry as *mut _;
        let registration = registry.register(self.id(), sink);
        let ok = unsafe { libwebp_sys::WebPEncode(webp_config, &mut *self.native) };

        let written = registration.bytes_written();
        let failure = registration.failure();
        drop(registration);
        self.native.writer = None;
        self.native.custom_ptr = core::ptr::null_mut();

        if let Some(kind) = failure {
            warn!(id = ?self.id(), ?kind, written, "encode aborted by sink");
            return Err(Error::EncodeFailed(EncodingError::BadWrite));
        }
        if ok == 0 {
            let code = EncodingError::from(self.native.error_code as i32);
            warn!(id = ?self.id(), %code, "WebPEncode failed");
            return Err(Error::EncodeFailed(code));
        }

        debug!(id = ?self.id(), written, "encode complete");
        Ok(written)
    }

    /// Release the native picture and every pixel copy made for it.
    ///
    /// Does nothing before [`initialize`](Self::initialize) succeeded or
    /// after the first call.
    pub fn free(&mut self) {
        match self.state {
            HandleState::Allocated => {
                unsafe { libwebp_sys::WebPPictureFree(&mut *self.native) };
                self.buffers.clear();
                self.state = HandleState::Freed;
                debug!(id = ?self.id(), "picture freed");
            }
            HandleState::Uninitialized | HandleState::Freed => {}
        }
    }
}

impl Drop for PictureHandle<'_> {
    fn drop(&mut self) {
        self.free();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::AlphaMode;

    const RED_2X2: [u8; 16] = [
        255, 0, 0, 255, 255, 0, 0, 255, //
        255, 0, 0, 255, 255, 0, 0, 255,
    ];

    fn red_picture() -> Picture<'static> {
        Picture::Packed(PackedPicture::new(&RED_2X2, 2, 2, 8, AlphaMode::Straight).unwrap())
    }

    #[test]
    fn test_free_before_initialize_is_noop() {
        let mut handle = PictureHandle::new(red_picture());
        handle.free();
        assert_eq!(handle.state(), HandleState::Uninitialized);
        handle.free();
        assert_eq!(handle.state(), HandleState::Uninitialized);
    }

    #[test]
    fn test_double_free_is_noop() {
        let mut handle = PictureHandle::new(red_picture());
        handle.initialize().unwrap();
        assert_eq!(handle.state(), HandleState::Allocated);
        handle.free();
        assert_eq!(handle.state(), HandleState::Freed);
        handle.free();
        assert_eq!(handle.state(), HandleState::Freed);
    }

    #[test]
    fn test_initialize_twice_rejected() {
        let mut handle = PictureHandle::new(red_picture());
        handle.initialize().unwrap();
        assert_eq!(
            handle.initialize(),
            Err(Error::InvalidState(HandleState::Allocated))
        );
        handle.free();
        assert_eq!(
            handle.initialize(),
            Err(Error::InvalidState(HandleState::Freed))
        );
    }

    #[test]
    fn test_encode_requires_allocation() {
        let mut handle = PictureHandle::new(red_picture());
        let registry = WriterRegistry::new();
        let mut out = Vec::new();
        let err = handle
            .encode_with(&registry, &mut out, &EncodeConfig::new())
            .unwrap_err();
        assert_eq!(err, Error::InvalidState(HandleState::Uninitialized));
        assert!(out.is_empty());
        assert!(registry.is_empty());
    }

    #[test]
    fn test_encode_packed_with_own_registry() {
        let mut handle = PictureHandle::new(red_picture());
        handle.initialize().unwrap();

        let registry = WriterRegistry::new();
        let mut out = Vec::new();
        let written = handle
            .encode_with(&registry, &mut out, &EncodeConfig::new_lossless())
            .unwrap();

        assert!(registry.is_empty());
        assert_eq!(written as usize, out.len());
        assert_eq!(&out[..4], b"RIFF");
        assert_eq!(&out[8..12], b"WEBP");
    }

    #[test]
    fn test_planar_non_420_rejected_before_assignment() {
        let y = [16u8; 4];
        let c = [128u8; 4];
        let planar = PlanarPicture::new(&y, &c, &c, 2, 2, 2, 2, Subsampling::S444).unwrap();
        let mut handle = PictureHandle::new(Picture::Planar(planar));
        handle.initialize().unwrap();

        let registry = WriterRegistry::new();
        let mut out = Vec::new();
        let err = handle
            .encode_with(&registry, &mut out, &EncodeConfig::new())
            .unwrap_err();
        assert!(matches!(err, Error::UnsupportedFormat(_)));
        assert!(registry.is_empty());
        assert!(out.is_empty());
    }

    #[test]
    fn test_failed_allocation_stays_uninitialized() {
        let pixels = [0u8; 8];
        let picture = Picture::Packed(PackedPicture::unchecked(&pixels, 0, 2, 8));
        let mut handle = PictureHandle::new(picture);

        assert_eq!(
            handle.initialize(),
            Err(Error::InitializationFailed {
                stage: InitStage::Alloc,
                status: 0,
            })
        );
        assert_eq!(handle.state(), HandleState::Uninitialized);
        handle.free();
        assert_eq!(handle.state(), HandleState::Uninitialized);
        assert!(handle.buffers.is_empty());
    }

    #[test]
    fn test_import_failure_reports_status() {
        let mut handle = PictureHandle::new(red_picture());
        handle.initialize().unwrap();
        // libwebp refuses to reallocate a zero-width picture during import
        handle.native.width = 0;

        let err = handle.populate().unwrap_err();
        assert!(
            matches!(err, Error::ImportFailed { status: 0, .. }),
            "unexpected error: {:?}",
            err
        );
        handle.free();
        assert_eq!(handle.state(), HandleState::Freed);
    }

    #[test]
    fn test_repeated_encodes_reuse_buffer_slots() {
        let registry = WriterRegistry::new();
        let config = EncodeConfig::new_lossless();

        let mut packed = PictureHandle::new(red_picture());
        packed.initialize().unwrap();
        for _ in 0..5 {
            let mut out = Vec::new();
            packed.encode_with(&registry, &mut out, &config).unwrap();
            assert_eq!(packed.buffers.len(), 1);
        }

        let y = [16u8; 16];
        let c = [128u8; 4];
        let planar = PlanarPicture::new(&y, &c, &c, 4, 4, 4, 2, Subsampling::S420).unwrap();
        let mut planar = PictureHandle::new(Picture::Planar(planar));
        planar.initialize().unwrap();
        for _ in 0..5 {
            let mut out = Vec::new();
            planar
                .encode_with(&registry, &mut out, &EncodeConfig::new())
                .unwrap();
            assert_eq!(planar.buffers.len(), 3);
            assert_eq!(planar.native.y, planar.buffers[0].as_ptr() as *mut u8);
        }
        assert!(registry.is_empty());
    }

    #[test]
    fn test_populate_tracks_owned_buffers() {
        let y = [16u8; 16];
        let c = [128u8; 4];
        let planar = PlanarPicture::new(&y, &c, &c, 4, 4, 4, 2, Subsampling::S420).unwrap();
        let mut handle = PictureHandle::new(Picture::Planar(planar));
        handle.initialize().unwrap();
        handle.populate().unwrap();

        assert_eq!(handle.buffers.len(), 3);
        assert_eq!(handle.native.y, handle.buffers[0].as_ptr() as *mut u8);
        assert_eq!(handle.native.uv_stride, 2);

        handle.free();
        assert!(handle.buffers.is_empty());
    }
}
