use spin::{RwLock, RwLockReadGuard, RwLockWriteGuard};

/// A lazily populated global slot.
#[repr(transparent)]
pub(crate) struct HookLock<T: 'static + Send + Sync>(RwLock<Option<T>>);

impl<T: 'static + Send + Sync> HookLock<T> {
    #[must_use]
    pub(crate) const fn new() -> Self {
        Self(RwLock::new(None))
    }

    #[inline]
    pub(crate) fn read(&'static self) -> RwLockReadGuard<'static, Option<T>> {
        self.0.read()
    }

    #[inline]
    pub(crate) fn write(&'static self) -> RwLockWriteGuard<'static, Option<T>> {
        self.0.write()
    }
}
