use core::cell::Cell;
use core::ptr::NonNull;

use alloc::boxed::Box;

/// Cleanup routine shared by every member of a family.
pub(crate) enum Destroyer<T> {
    /// Reclaim the object as the `Box<T>` it was allocated as.
    Drop,
    Custom(Box<dyn FnOnce(NonNull<T>)>),
}

impl<T> Destroyer<T> {
    /// # Safety
    ///
    /// `ptr` must be the object the family owns, and no member may use it afterwards.
    pub(crate) unsafe fn destroy(self, ptr: NonNull<T>) {
        match self {
            Destroyer::Drop => drop(Box::from_raw(ptr.as_ptr())),
            Destroyer::Custom(destroy) => destroy(ptr),
        }
    }
}

/// Control block referenced by every `SharedBox` of one family.
///
/// A `None` destroyer means the family has been disarmed by a release and must not
/// run any cleanup when it dies.
pub(crate) struct Family<T> {
    count: Cell<usize>,
    destroyer: Cell<Option<Destroyer<T>>>,
}

impl<T> Family<T> {
    /// Allocates a singleton family.
    pub(crate) fn alloc(destroyer: Destroyer<T>) -> NonNull<Family<T>> {
        let family = Box::new(Family {
            count: Cell::new(1),
            destroyer: Cell::new(Some(destroyer)),
        });
        NonNull::from(Box::leak(family))
    }

    pub(crate) fn count(&self) -> usize {
        self.count.get()
    }

    pub(crate) fn join(&self) {
        let count = self.count.get();
        assert!(count != usize::MAX, "SharedBox reference count overflow");
        self.count.set(count + 1);
    }

    /// Removes one member, returning `true` if it was the last.
    pub(crate) fn leave(&self) -> bool {
        let count = self.count.get() - 1;
        self.count.set(count);
        count == 0
    }

    pub(crate) fn disarm(&self) {
        // dropping the taken destroyer drops its captures, never the object
        drop(self.destroyer.take());
    }

    pub(crate) fn is_armed(&self) -> bool {
        self.inspect(|destroyer| destroyer.is_some())
    }

    pub(crate) fn has_default_destroyer(&self) -> bool {
        self.inspect(|destroyer| matches!(destroyer, Some(Destroyer::Drop)))
    }

    pub(crate) fn take_destroyer(&self) -> Option<Destroyer<T>> {
        self.destroyer.take()
    }

    fn inspect<R>(&self, f: impl FnOnce(&Option<Destroyer<T>>) -> R) -> R {
        let destroyer = self.destroyer.take();
        let result = f(&destroyer);
        self.destroyer.set(destroyer);
        result
    }

    /// # Safety
    ///
    /// `family` must come from [`Family::alloc`] and have no members left.
    pub(crate) unsafe fn free(family: NonNull<Family<T>>) {
        drop(Box::from_raw(family.as_ptr()));
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_count() {
        let family = Family::<u32>::alloc(Destroyer::Drop);
        let block = unsafe { family.as_ref() };
        assert_eq!(block.count(), 1);
        block.join();
        block.join();
        assert_eq!(block.count(), 3);
        assert!(!block.leave());
        assert!(!block.leave());
        assert!(block.leave());
        unsafe { Family::free(family) };
    }

    #[test]
    fn test_disarm() {
        let family = Family::<u32>::alloc(Destroyer::Drop);
        let block = unsafe { family.as_ref() };
        assert!(block.is_armed());
        assert!(block.has_default_destroyer());
        block.disarm();
        assert!(!block.is_armed());
        assert!(!block.has_default_destroyer());
        assert!(block.take_destroyer().is_none());
        unsafe { Family::free(family) };
    }

    #[test]
    fn test_custom_destroyer() {
        use std::rc::Rc;

        let seen = Rc::new(Cell::new(0));
        let family = Family::<u32>::alloc(Destroyer::Custom(Box::new({
            let seen = seen.clone();
            move |ptr: NonNull<u32>| {
                let value = unsafe { Box::from_raw(ptr.as_ptr()) };
                seen.set(*value);
            }
        })));
        let block = unsafe { family.as_ref() };
        assert!(!block.has_default_destroyer());

        let object = NonNull::from(Box::leak(Box::new(7u32)));
        if let Some(destroyer) = block.take_destroyer() {
            unsafe { destroyer.destroy(object) };
        }
        assert_eq!(seen.get(), 7);
        unsafe { Family::free(family) };
    }
}
