use parking_lot::Mutex;
use std::fmt;

/// Per-checkout callback run against the pooled value.
pub type Hook<T> = Box<dyn FnMut(&mut T) + Send>;

struct Slot<T> {
    value: Option<T>,
    in_use: bool,
    on_acquire: Option<Hook<T>>,
    on_release: Option<Hook<T>>,
}

/// One pool slot: a value, an in-use flag and the hooks of the current checkout.
///
/// The value is moved out on checkout and moved back on release, so it can
/// only be reached by application code while the slot is in use.
pub struct PooledObject<T> {
    slot: Mutex<Slot<T>>,
}

impl<T> PooledObject<T> {
    pub fn new(value: T) -> Self {
        Self {
            slot: Mutex::new(Slot {
                value: Some(value),
                in_use: false,
                on_acquire: None,
                on_release: None,
            }),
        }
    }

    /// Check the value out, running `on_acquire` before handing it over.
    ///
    /// Returns `None` when the slot is already checked out.
    pub fn get_obj(&self, on_acquire: Hook<T>, on_release: Hook<T>) -> Option<T> {
        self.checkout(on_acquire, on_release).ok()
    }

    /// Like [`PooledObject::get_obj`], but hands the hooks back on failure.
    pub(crate) fn checkout(
        &self,
        mut on_acquire: Hook<T>,
        on_release: Hook<T>,
    ) -> Result<T, (Hook<T>, Hook<T>)> {
        let mut slot = self.slot.lock();
        if slot.in_use {
            return Err((on_acquire, on_release));
        }
        // The hook runs before the checkout commits; if it panics the slot
        // stays idle and keeps its value
        match slot.value.as_mut() {
            Some(value) => on_acquire(value),
            None => return Err((on_acquire, on_release)),
        }

        match slot.value.take() {
            Some(value) => {
                slot.in_use = true;
                slot.on_acquire = Some(on_acquire);
                slot.on_release = Some(on_release);
                Ok(value)
            }
            None => Err((on_acquire, on_release)),
        }
    }

    /// Return a checked-out value, running the stored `on_release` hook.
    ///
    /// A slot that is not in use hands the value back untouched.
    pub fn release_obj(&self, mut value: T) -> Result<(), T> {
        let mut slot = self.slot.lock();
        if !slot.in_use {
            return Err(value);
        }

        if let Some(mut hook) = slot.on_release.take() {
            hook(&mut value);
        }
        slot.on_acquire = None;
        slot.value = Some(value);
        slot.in_use = false;
        Ok(())
    }

    pub fn is_in_use(&self) -> bool {
        self.slot.lock().in_use
    }
}

impl<T> fmt::Debug for PooledObject<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PooledObject")
            .field("in_use", &self.is_in_use())
            .finish()
    }
}
