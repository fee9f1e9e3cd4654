//! Write-once slots for field injection

use once_cell::sync::OnceCell;
use std::fmt;
use std::ops::Deref;
use std::sync::Arc;

/// A field filled by the container after construction.
///
/// Elements declare injectable fields as `Injected<T>` and initialise them
/// with [`Injected::new`]. The field post-processor writes the slot exactly
/// once.
///
/// # Panics
///
/// Dereferencing an empty slot panics. Fields are filled before
/// `PostInitialization` methods run and before the instance is handed
/// out, so this only happens when the value is read inside its own
/// constructor or on an instance built outside the container. Use
/// [`Injected::get`] where the slot may legitimately still be empty.
///
/// ```rust
/// use element_injector::Injected;
/// use std::sync::Arc;
///
/// let slot: Injected<String> = Injected::new();
/// assert!(slot.get().is_none());
///
/// slot.set(Arc::new("filled".to_string())).unwrap();
/// assert_eq!(slot.as_str(), "filled");
/// ```
pub struct Injected<T: ?Sized> {
    cell: OnceCell<Arc<T>>,
}

impl<T: ?Sized> Injected<T> {
    #[inline]
    pub const fn new() -> Self {
        Self { cell: OnceCell::new() }
    }

    /// Fill the slot. Returns the value back if the slot was already filled.
    #[inline]
    pub fn set(&self, value: Arc<T>) -> Result<(), Arc<T>> {
        self.cell.set(value)
    }

    #[inline]
    pub fn get(&self) -> Option<&Arc<T>> {
        self.cell.get()
    }

    #[inline]
    pub fn is_injected(&self) -> bool {
        self.cell.get().is_some()
    }
}

impl<T: ?Sized> Default for Injected<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T: ?Sized> Deref for Injected<T> {
    type Target = T;

    /// # Panics
    ///
    /// Panics when read before injection.
    fn deref(&self) -> &T {
        match self.cell.get() {
            Some(value) => value,
            None => panic!("Injected<{}> read before injection", std::any::type_name::<T>()),
        }
    }
}

impl<T: ?Sized> fmt::Debug for Injected<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Injected")
            .field("type", &std::any::type_name::<T>())
            .field("injected", &self.is_injected())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_set_once() {
        let slot: Injected<u32> = Injected::default();
        assert!(!slot.is_injected());
        assert!(slot.set(Arc::new(1)).is_ok());
        assert_eq!(slot.set(Arc::new(2)), Err(Arc::new(2)));
        assert_eq!(*slot, 1);
    }

    #[test]
    #[should_panic(expected = "read before injection")]
    fn test_deref_before_injection_panics() {
        let slot: Injected<str> = Injected::new();
        let _ = slot.len();
    }
}
