//! Routes libwebp's push-style output chunks to `io::Write` sinks.
//!
//! libwebp hands encoded bytes to a C callback installed on the
//! `WebPPicture`, passing only the data span and the picture pointer. A
//! [`WriterRegistry`] maps that pointer (a [`PictureId`]) to the sink the
//! caller supplied for the current encode, so any number of encodes can run
//! concurrently on different threads without their output mixing.
//!
//! The registry is reached from the callback through the picture's
//! `custom_ptr`; the picture pointer itself is the lookup key.
//!
//! # Write failures
//!
//! The callback can only answer libwebp with "accepted" or "abort". When a
//! sink fails, the registry remembers the [`io::ErrorKind`], refuses every
//! later chunk for that picture, and the encode reports
//! [`EncodingError::BadWrite`](crate::EncodingError::BadWrite). The underlying
//! `io::Error` is logged, not returned.

use core::ffi::c_int;
use core::marker::PhantomData;
use std::collections::HashMap;
use std::io::{self, Write};
use std::panic::{catch_unwind, AssertUnwindSafe};
use std::sync::{LazyLock, Mutex, MutexGuard, PoisonError};

use tracing::{trace, warn};

/// Identity of a native picture, used to correlate callbacks with sinks.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct PictureId(usize);

impl PictureId {
    pub(crate) fn of(picture: *const libwebp_sys::WebPPicture) -> Self {
        Self(picture as usize)
    }
}

/// Sink pointer with its borrow lifetime erased.
///
/// Only dereferenced while the owning [`Registration`] is alive, which
/// borrows the sink for at least as long.
#[derive(Clone, Copy)]
struct SinkPtr(*mut (dyn Write + Send + 'static));

// SAFETY: the pointee is `Send`, and a registration is only ever used by the
// encode call that created it.
unsafe impl Send for SinkPtr {}

struct Slot {
    sink: SinkPtr,
    failure: Option<io::ErrorKind>,
    written: u64,
}

enum Lookup {
    Missing,
    Failed,
    Sink(SinkPtr),
}

static GLOBAL: LazyLock<WriterRegistry> = LazyLock::new(WriterRegistry::new);

/// Correlation table from [`PictureId`] to output sink.
///
/// Entries live exactly as long as the [`Registration`] guard returned by
/// [`register`](WriterRegistry::register); at rest the registry is empty.
/// The lock is held only for map reads and writes, never while a sink is
/// being written or libwebp is running.
///
/// # Example
///
/// ```rust
/// use webpx_bridge::WriterRegistry;
///
/// let registry = WriterRegistry::new();
/// assert!(registry.is_empty());
/// ```
pub struct WriterRegistry {
    slots: Mutex<HashMap<PictureId, Slot>>,
}

impl Default for WriterRegistry {
    fn default() -> Self {
        Self::new()
    }
}

impl core::fmt::Debug for WriterRegistry {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_struct("WriterRegistry")
            .field("in_flight", &self.len())
            .finish()
    }
}

impl WriterRegistry {
    /// Create an empty registry.
    #[must_use]
    pub fn new() -> Self {
        Self {
            slots: Mutex::new(HashMap::new()),
        }
    }

    /// The process-wide registry used by [`PictureHandle::encode`](crate::PictureHandle::encode).
    pub fn global() -> &'static WriterRegistry {
        &GLOBAL
    }

    fn slots(&self) -> MutexGuard<'_, HashMap<PictureId, Slot>> {
        // map operations never panic mid-update, so a poisoned map is intact
        self.slots.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Route chunks for `id` to `sink` until the returned guard is dropped.
    ///
    /// Registering an id that is already present replaces its sink.
    pub fn register<'r, 's>(
        &'r self,
        id: PictureId,
        sink: &'s mut (dyn Write + Send + 's),
    ) -> Registration<'r, 's> {
        let ptr: *mut (dyn Write + Send + 's) = sink;
        // SAFETY: only the lifetime bound changes. `Registration` borrows the
        // sink for 's and removes the entry on drop, so the pointer is never
        // used after the borrow ends.
        let ptr: *mut (dyn Write + Send + 'static) = unsafe { core::mem::transmute(ptr) };

        let replaced = self.slots().insert(
            id,
            Slot {
                sink: SinkPtr(ptr),
                failure: None,
                written: 0,
            },
        );
        if replaced.is_some() {
            warn!(?id, "replaced an existing sink registration");
        }

        Registration {
            registry: self,
            id,
            _sink: PhantomData,
        }
    }

    /// Remove the sink for `id`, if any.
    pub fn deregister(&self, id: PictureId) {
        self.slots().remove(&id);
    }

    /// Whether a sink is registered for `id`.
    pub fn contains(&self, id: PictureId) -> bool {
        self.slots().contains_key(&id)
    }

    /// Number of in-flight registrations.
    pub fn len(&self) -> usize {
        self.slots().len()
    }

    /// Whether no encode is currently registered.
    pub fn is_empty(&self) -> bool {
        self.slots().is_empty()
    }

    fn lookup(&self, id: PictureId) -> Lookup {
        match self.slots().get(&id) {
            None => Lookup::Missing,
            Some(slot) if slot.failure.is_some() => Lookup::Failed,
            Some(slot) => Lookup::Sink(slot.sink),
        }
    }

    fn record_written(&self, id: PictureId, len: usize) {
        if let Some(slot) = self.slots().get_mut(&id) {
            slot.written += len as u64;
        }
    }

    fn record_failure(&self, id: PictureId, kind: io::ErrorKind) {
        if let Some(slot) = self.slots().get_mut(&id) {
            slot.failure = Some(kind);
        }
    }
}

/// Guard for one sink registration; deregisters on drop.
#[must_use = "the sink is deregistered as soon as the registration is dropped"]
pub struct Registration<'r, 's> {
    registry: &'r WriterRegistry,
    id: PictureId,
    _sink: PhantomData<&'s mut ()>,
}

impl Registration<'_, '_> {
    /// The picture this registration routes.
    pub fn id(&self) -> PictureId {
        self.id
    }

    /// Total bytes the sink has accepted so far.
    pub fn bytes_written(&self) -> u64 {
        self.registry
            .slots()
            .get(&self.id)
            .map_or(0, |slot| slot.written)
    }

    /// The sink failure that aborted this registration, if any.
    pub fn failure(&self) -> Option<io::ErrorKind> {
        self.registry
            .slots()
            .get(&self.id)
            .and_then(|slot| slot.failure)
    }
}

impl Drop for Registration<'_, '_> {
    fn drop(&mut self) {
        self.registry.deregister(self.id);
    }
}

/// `WebPWriterFunction` installed on every picture we encode.
///
/// Returns the chunk length when the sink accepted it and 0 (abort) when the
/// picture has no registry or registration, or the sink failed now or
/// earlier.
///
/// # Safety
///
/// `picture` must be null or point to a live `WebPPicture` whose
/// `custom_ptr` is null or points to a live [`WriterRegistry`]; `data` must
/// be valid for `data_size` bytes.
pub(crate) unsafe extern "C" fn write_chunk(
    data: *const u8,
    data_size: usize,
    picture: *const libwebp_sys::WebPPicture,
) -> c_int {
    if picture.is_null() {
        return 0;
    }
    let registry = unsafe { (*picture).custom_ptr } as *const WriterRegistry;
    if registry.is_null() {
        warn!("write callback on a picture without a registry");
        return 0;
    }
    let registry = unsafe { &*registry };
    let id = PictureId::of(picture);

    let sink = match registry.lookup(id) {
        Lookup::Sink(sink) => sink,
        Lookup::Failed => return 0,
        Lookup::Missing => {
            warn!(?id, "write callback for an unregistered picture");
            return 0;
        }
    };

    if data_size == 0 {
        return 1;
    }
    let chunk = unsafe { core::slice::from_raw_parts(data, data_size) };

    // a panic must not unwind into libwebp
    let written = catch_unwind(AssertUnwindSafe(|| unsafe { (*sink.0).write_all(chunk) }));
    match written {
        Ok(Ok(())) => {
            registry.record_written(id, data_size);
            trace!(?id, len = data_size, "delivered chunk");
            c_int::try_from(data_size).unwrap_or(c_int::MAX)
        }
        Ok(Err(e)) => {
            warn!(?id, error = %e, "sink write failed, aborting encode");
            registry.record_failure(id, e.kind());
            0
        }
        Err(_) => {
            warn!(?id, "sink panicked, aborting encode");
            registry.record_failure(id, io::ErrorKind::Other);
            0
        }
    }
}
