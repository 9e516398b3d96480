//! Error types for picture adaptation and encoding.

use crate::handle::HandleState;
use core::fmt;

/// Result type for webpx-bridge operations.
pub type Result<T> = core::result::Result<T, Error>;

/// Error type for webpx-bridge operations.
#[derive(Debug, Clone, PartialEq, Eq)]
#[non_exhaustive]
pub enum Error {
    /// Invalid input parameters (dimensions, stride, buffer size, etc.)
    InvalidInput(String),
    /// The decoded image uses a pixel layout the encoder cannot accept.
    UnsupportedFormat(String),
    /// `WebPPictureInit` or `WebPPictureAlloc` reported failure.
    InitializationFailed {
        /// Which native call failed.
        stage: InitStage,
        /// Status returned by libwebp.
        status: i32,
    },
    /// `WebPPictureImportRGBA` reported failure.
    ImportFailed {
        /// Status returned by libwebp.
        status: i32,
        /// Error code left on the picture.
        code: EncodingError,
    },
    /// Seeding the config from its preset failed.
    ConfigFailed(i32),
    /// Configuration validation failed
    InvalidConfig(String),
    /// `WebPEncode` reported failure.
    ///
    /// A sink write failure surfaces here as [`EncodingError::BadWrite`].
    EncodeFailed(EncodingError),
    /// A handle operation was attempted in the wrong lifecycle state.
    InvalidState(HandleState),
}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Error::InvalidInput(msg) => write!(f, "invalid input: {}", msg),
            Error::UnsupportedFormat(layout) => write!(f, "unsupported pixel format: {}", layout),
            Error::InitializationFailed { stage, status } => {
                write!(f, "picture {} failed with status {}", stage, status)
            }
            Error::ImportFailed { status, code } => {
                write!(f, "RGBA import failed with status {}: {}", status, code)
            }
            Error::ConfigFailed(status) => {
                write!(f, "config preset failed with status {}", status)
            }
            Error::InvalidConfig(msg) => write!(f, "invalid config: {}", msg),
            Error::EncodeFailed(e) => write!(f, "encode failed: {}", e),
            Error::InvalidState(state) => write!(f, "picture handle is {}", state),
        }
    }
}

impl std::error::Error for Error {}

/// The native call that failed during [`PictureHandle::initialize`](crate::PictureHandle::initialize).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InitStage {
    /// `WebPPictureInit`
    Init,
    /// `WebPPictureAlloc`
    Alloc,
}

impl fmt::Display for InitStage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            InitStage::Init => write!(f, "init"),
            InitStage::Alloc => write!(f, "allocation"),
        }
    }
}

/// Encoding error codes from libwebp.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(i32)]
pub enum EncodingError {
    /// No error
    Ok = 0,
    /// Memory allocation error
    OutOfMemory = 1,
    /// Bitstream out of memory
    BitstreamOutOfMemory = 2,
    /// NULL parameter
    NullParameter = 3,
    /// Invalid configuration
    InvalidConfiguration = 4,
    /// Bad dimension (width or height is 0 or > 16383)
    BadDimension = 5,
    /// Partition is bigger than 512k
    Partition0Overflow = 6,
    /// Partition is bigger than 16M
    PartitionOverflow = 7,
    /// Bad write callback
    BadWrite = 8,
    /// File is bigger than 4G
    FileTooBig = 9,
    /// User abort
    UserAbort = 10,
    /// Last error (unknown)
    Last = 11,
}

impl From<i32> for EncodingError {
    fn from(code: i32) -> Self {
        match code {
            0 => EncodingError::Ok,
            1 => EncodingError::OutOfMemory,
            2 => EncodingError::BitstreamOutOfMemory,
            3 => EncodingError::NullParameter,
            4 => EncodingError::InvalidConfiguration,
            5 => EncodingError::BadDimension,
            6 => EncodingError::Partition0Overflow,
            7 => EncodingError::PartitionOverflow,
            8 => EncodingError::BadWrite,
            9 => EncodingError::FileTooBig,
            10 => EncodingError::UserAbort,
            _ => EncodingError::Last,
        }
    }
}

impl fmt::Display for EncodingError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let msg = match self {
            EncodingError::Ok => "ok",
            EncodingError::OutOfMemory => "out of memory",
            EncodingError::BitstreamOutOfMemory => "bitstream out of memory",
            EncodingError::NullParameter => "null parameter",
            EncodingError::InvalidConfiguration => "invalid configuration",
            EncodingError::BadDimension => "bad dimension",
            EncodingError::Partition0Overflow => "partition0 overflow",
            EncodingError::PartitionOverflow => "partition overflow",
            EncodingError::BadWrite => "bad write",
            EncodingError::FileTooBig => "file too big",
            EncodingError::UserAbort => "user abort",
            EncodingError::Last => "unknown error",
        };
        write!(f, "{}", msg)
    }
}
