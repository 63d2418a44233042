use core::cmp::Ordering;
use core::fmt;
use core::hash::{self, Hash};
use core::marker::PhantomData;
use core::ops;
use core::ptr::{self, NonNull};

use alloc::boxed::Box;

use crate::family::{Destroyer, Family};

/// Box a value into a new singleton family
///
/// `sharedbox!(val)` is [`SharedBox::new`]; `sharedbox!(val, destroyer)` is
/// [`SharedBox::new_with`], where the destroyer receives the value back as a `Box`
/// once the last member of the family is gone.
///
/// # Example
///
/// ```
/// #[macro_use]
/// extern crate sharedbox;
///
/// # fn main() {
/// use std::cell::Cell;
/// use std::rc::Rc;
///
/// let plain = sharedbox!(String::from("plain"));
/// assert_eq!(*plain, "plain");
///
/// let returned = Rc::new(Cell::new(0));
/// let pooled = sharedbox!(42u32, {
///     let returned = returned.clone();
///     move |value: Box<u32>| returned.set(*value)
/// });
/// drop(pooled);
/// assert_eq!(returned.get(), 42);
/// # }
/// ```
#[macro_export]
macro_rules! sharedbox {
    ( $e: expr ) => {
        $crate::SharedBox::new($e)
    };
    ( $e: expr, $d: expr ) => {
        $crate::SharedBox::new_with($e, $d)
    };
}

/// A single-threaded reference-counted box with a replaceable destroyer
///
/// Clones of a `SharedBox` form a *family*: they share the object, a member
/// count and a destroyer. The destroyer runs exactly once, when the last member
/// of the family is dropped, reset, or assigned over.
///
/// Operations that could shadow methods of `T` through [`Deref`](ops::Deref) are
/// associated functions, e.g. `SharedBox::is_unique(&b)`.
///
/// `SharedBox` is neither `Send` nor `Sync`: the member count is not atomic.
pub struct SharedBox<T> {
    ptr: Option<NonNull<T>>,
    family: NonNull<Family<T>>,
    _phantom: PhantomData<T>,
}

impl<T> SharedBox<T> {
    /// Move a value to the heap and own it in a new singleton family.
    ///
    /// # Example
    ///
    /// ```
    /// use sharedbox::SharedBox;
    ///
    /// let a = SharedBox::new([1, 2, 3]);
    /// let b = a.clone();
    ///
    /// assert_eq!(SharedBox::use_count(&a), 2);
    /// assert_eq!(b.len(), 3);
    /// ```
    pub fn new(val: T) -> SharedBox<T> {
        SharedBox::from_box(Box::new(val))
    }

    /// Like [`new`](SharedBox::new), but `destroyer` receives the value
    /// instead of it being dropped.
    pub fn new_with<D>(val: T, destroyer: D) -> SharedBox<T>
    where
        T: 'static,
        D: FnOnce(Box<T>) + 'static,
    {
        SharedBox::from_box_with(Box::new(val), destroyer)
    }

    /// An empty box in its own singleton family.
    ///
    /// ```
    /// use sharedbox::SharedBox;
    ///
    /// let empty = SharedBox::<u8>::empty();
    /// assert!(SharedBox::is_empty(&empty));
    /// assert!(SharedBox::is_unique(&empty));
    /// ```
    pub fn empty() -> SharedBox<T> {
        unsafe { SharedBox::from_parts(None, Destroyer::Drop) }
    }

    /// Take ownership of a boxed value.
    pub fn from_box(boxed: Box<T>) -> SharedBox<T> {
        let ptr = NonNull::from(Box::leak(boxed));
        unsafe { SharedBox::from_parts(Some(ptr), Destroyer::Drop) }
    }

    /// Take ownership of a boxed value, handing it to `destroyer` when the
    /// family dies.
    ///
    /// # Example
    ///
    /// ```
    /// use std::cell::RefCell;
    /// use std::rc::Rc;
    /// use sharedbox::SharedBox;
    ///
    /// let pool = Rc::new(RefCell::new(Vec::new()));
    /// let conn = SharedBox::from_box_with(Box::new(String::from("conn-1")), {
    ///     let pool = pool.clone();
    ///     move |conn: Box<String>| pool.borrow_mut().push(*conn)
    /// });
    ///
    /// let other = conn.clone();
    /// drop(conn);
    /// assert!(pool.borrow().is_empty());
    ///
    /// drop(other);
    /// assert_eq!(*pool.borrow(), ["conn-1"]);
    /// ```
    pub fn from_box_with<D>(boxed: Box<T>, destroyer: D) -> SharedBox<T>
    where
        T: 'static,
        D: FnOnce(Box<T>) + 'static,
    {
        let ptr = NonNull::from(Box::leak(boxed));
        unsafe { SharedBox::from_parts(Some(ptr), boxed_destroyer(destroyer)) }
    }

    /// Take ownership of a raw pointer. A null pointer gives an empty box.
    ///
    /// # Safety
    ///
    /// A non-null `ptr` must come from [`Box::into_raw`] (or [`SharedBox::release`]
    /// of a box using the default destroyer), and nothing else may own it. Wrapping
    /// one pointer in two independently constructed boxes makes two families that
    /// will each destroy it.
    pub unsafe fn from_raw(ptr: *mut T) -> SharedBox<T> {
        SharedBox::from_parts(NonNull::new(ptr), Destroyer::Drop)
    }

    /// Take ownership of a raw pointer, to be cleaned up by `destroyer`.
    ///
    /// The destroyer is never called for a null `ptr`.
    ///
    /// # Safety
    ///
    /// Nothing else may own `ptr`, and it must stay valid for reads until
    /// `destroyer` runs.
    pub unsafe fn from_raw_with<D>(ptr: *mut T, destroyer: D) -> SharedBox<T>
    where
        D: FnOnce(NonNull<T>) + 'static,
    {
        SharedBox::from_parts(NonNull::new(ptr), Destroyer::Custom(Box::new(destroyer)))
    }

    unsafe fn from_parts(ptr: Option<NonNull<T>>, destroyer: Destroyer<T>) -> SharedBox<T> {
        let family = Family::alloc(destroyer);
        trace!(
            "SharedBox<{}>: family {:p} born, holding {:?}",
            core::any::type_name::<T>(),
            family,
            ptr
        );
        SharedBox {
            ptr,
            family,
            _phantom: PhantomData,
        }
    }

    fn family(&self) -> &Family<T> {
        // the family outlives every member
        unsafe { self.family.as_ref() }
    }

    /// Returns true if the box holds no object
    pub fn is_empty(this: &Self) -> bool {
        this.ptr.is_none()
    }

    /// Returns true if `this` is the only member of its family
    pub fn is_unique(this: &Self) -> bool {
        this.family().count() == 1
    }

    /// Number of live members in the family of `this`
    pub fn use_count(this: &Self) -> usize {
        this.family().count()
    }

    /// Returns true if both boxes belong to the same family.
    ///
    /// Two boxes constructed independently are never in the same family, even
    /// if they wrap the same address.
    pub fn same_family(this: &Self, other: &Self) -> bool {
        this.family == other.family
    }

    /// Returns true if both boxes point at the same object, or are both empty.
    pub fn ptr_eq(this: &Self, other: &Self) -> bool {
        this.ptr == other.ptr
    }

    /// Returns true if the family drops its object as a plain `Box<T>`
    pub fn has_default_destroyer(this: &Self) -> bool {
        this.family().has_default_destroyer()
    }

    /// The object, if any. Never changes ownership.
    pub fn get(this: &Self) -> Option<&T> {
        this.ptr.map(|ptr| unsafe { &*ptr.as_ptr() })
    }

    /// Mutable access to the object, if `this` is the only member of its family
    /// and the family still owns the object.
    ///
    /// ```
    /// use sharedbox::SharedBox;
    ///
    /// let mut a = SharedBox::new(1);
    /// *SharedBox::get_mut(&mut a).unwrap() += 1;
    ///
    /// let b = a.clone();
    /// assert!(SharedBox::get_mut(&mut a).is_none());
    /// drop(b);
    /// assert_eq!(*a, 2);
    /// ```
    pub fn get_mut(this: &mut Self) -> Option<&mut T> {
        if !SharedBox::is_unique(this) || !this.family().is_armed() {
            return None;
        }
        this.ptr.map(|ptr| unsafe { &mut *ptr.as_ptr() })
    }

    /// The raw object pointer, null when empty. Never changes ownership.
    pub fn as_ptr(this: &Self) -> *const T {
        this.ptr.map_or(ptr::null(), |ptr| ptr.as_ptr().cast_const())
    }

    /// Leave the family and become an empty singleton.
    ///
    /// If `this` was the last member, the destroyer runs on the old object
    /// before this call returns. Other members keep their own family intact.
    pub fn reset(this: &mut Self) {
        *this = SharedBox::empty();
    }

    /// Leave the family and own `boxed` in a new singleton family.
    ///
    /// The old object, if `this` was its last owner, is destroyed before
    /// `boxed` is installed.
    pub fn reset_to(this: &mut Self, boxed: Box<T>) {
        *this = SharedBox::from_box(boxed);
    }

    /// Like [`reset_to`](SharedBox::reset_to), with a custom destroyer for the
    /// new family.
    pub fn reset_to_with<D>(this: &mut Self, boxed: Box<T>, destroyer: D)
    where
        T: 'static,
        D: FnOnce(Box<T>) + 'static,
    {
        *this = SharedBox::from_box_with(boxed, destroyer);
    }

    /// Raw-pointer form of [`reset_to`](SharedBox::reset_to).
    ///
    /// # Safety
    ///
    /// Same contract as [`from_raw`](SharedBox::from_raw).
    pub unsafe fn reset_raw(this: &mut Self, ptr: *mut T) {
        *this = SharedBox::from_raw(ptr);
    }

    /// Raw-pointer form of [`reset_to_with`](SharedBox::reset_to_with).
    ///
    /// # Safety
    ///
    /// Same contract as [`from_raw_with`](SharedBox::from_raw_with).
    pub unsafe fn reset_raw_with<D>(this: &mut Self, ptr: *mut T, destroyer: D)
    where
        D: FnOnce(NonNull<T>) + 'static,
    {
        *this = SharedBox::from_raw_with(ptr, destroyer);
    }

    /// Give up the object without destroying it and become an empty singleton.
    ///
    /// The caller becomes responsible for the returned object; with the default
    /// destroyer it can be reclaimed with [`Box::from_raw`]. If other members
    /// remain, the family is disarmed: they still point at the object but none
    /// of them will run the destroyer, so the object must outlive them. Releasing
    /// one of those members again returns the same pointer; ownership passed
    /// with the first release.
    ///
    /// # Example
    ///
    /// ```
    /// use sharedbox::SharedBox;
    ///
    /// let mut a = SharedBox::new(String::from("mine"));
    /// let raw = SharedBox::release(&mut a).unwrap();
    ///
    /// assert!(SharedBox::is_empty(&a));
    /// let owned = unsafe { Box::from_raw(raw.as_ptr()) };
    /// assert_eq!(*owned, "mine");
    /// ```
    #[must_use = "losing the released pointer leaks the object"]
    pub fn release(this: &mut Self) -> Option<NonNull<T>> {
        let ptr = this.ptr.take();
        if ptr.is_some() && !SharedBox::is_unique(this) {
            trace!(
                "SharedBox<{}>: family {:p} disarmed by release",
                core::any::type_name::<T>(),
                this.family
            );
            this.family().disarm();
        }
        // with `ptr` taken, leaving the old family never runs its destroyer
        *this = SharedBox::empty();
        ptr
    }

    /// Unwrap the object if `this` is its only owner and the family would drop
    /// it as a plain `Box<T>`. Otherwise the box is returned untouched.
    ///
    /// ```
    /// use sharedbox::SharedBox;
    ///
    /// let a = SharedBox::new(5);
    /// let b = a.clone();
    /// let a = SharedBox::try_into_box(a).unwrap_err();
    /// drop(b);
    /// assert_eq!(*SharedBox::try_into_box(a).unwrap(), 5);
    /// ```
    pub fn try_into_box(this: Self) -> Result<Box<T>, Self> {
        if SharedBox::is_empty(&this)
            || !SharedBox::is_unique(&this)
            || !SharedBox::has_default_destroyer(&this)
        {
            return Err(this);
        }
        let mut this = this;
        match SharedBox::release(&mut this) {
            Some(ptr) => Ok(unsafe { Box::from_raw(ptr.as_ptr()) }),
            None => Err(this),
        }
    }
}

fn boxed_destroyer<T, D>(destroyer: D) -> Destroyer<T>
where
    T: 'static,
    D: FnOnce(Box<T>) + 'static,
{
    Destroyer::Custom(Box::new(move |ptr: NonNull<T>| {
        destroyer(unsafe { Box::from_raw(ptr.as_ptr()) })
    }))
}

/// Allocate `val` and own it in a new singleton family.
///
/// ```
/// use sharedbox::make_shared;
///
/// let name = make_shared(String::from("ferris"));
/// assert_eq!(name.len(), 6);
/// ```
pub fn make_shared<T>(val: T) -> SharedBox<T> {
    SharedBox::new(val)
}

/// Construct a value with `init` and share it, passing construction errors
/// through unchanged.
///
/// ```
/// use sharedbox::try_make_shared;
///
/// let port = try_make_shared(|| "8080".parse::<u16>()).unwrap();
/// assert_eq!(*port, 8080);
///
/// assert!(try_make_shared(|| "http".parse::<u16>()).is_err());
/// ```
pub fn try_make_shared<T, E, F>(init: F) -> Result<SharedBox<T>, E>
where
    F: FnOnce() -> Result<T, E>,
{
    init().map(SharedBox::new)
}

impl<T> ops::Deref for SharedBox<T> {
    type Target = T;

    fn deref(&self) -> &T {
        match SharedBox::get(self) {
            Some(val) => val,
            None => panic!("dereferenced an empty SharedBox"),
        }
    }
}

impl<T> ops::Drop for SharedBox<T> {
    fn drop(&mut self) {
        if !self.family().leave() {
            return;
        }

        let destroyer = self.family().take_destroyer();
        // free the block first so a panicking destroyer leaks nothing of ours
        unsafe { Family::free(self.family) };

        if let (Some(ptr), Some(destroyer)) = (self.ptr, destroyer) {
            trace!(
                "SharedBox<{}>: family {:p} died, destroying {:p}",
                core::any::type_name::<T>(),
                self.family,
                ptr
            );
            unsafe { destroyer.destroy(ptr) };
        }
    }
}

impl<T> Clone for SharedBox<T> {
    /// Join the family of `self`.
    fn clone(&self) -> Self {
        self.family().join();
        SharedBox {
            ptr: self.ptr,
            family: self.family,
            _phantom: PhantomData,
        }
    }

    /// Leave the current family and join the family of `source`.
    ///
    /// Assigning within one family changes nothing.
    fn clone_from(&mut self, source: &Self) {
        if SharedBox::same_family(self, source) {
            return;
        }
        *self = source.clone();
    }
}

impl<T> Default for SharedBox<T> {
    fn default() -> Self {
        SharedBox::empty()
    }
}

impl<T> From<Box<T>> for SharedBox<T> {
    fn from(boxed: Box<T>) -> Self {
        SharedBox::from_box(boxed)
    }
}

impl<T> From<T> for SharedBox<T> {
    fn from(val: T) -> Self {
        SharedBox::new(val)
    }
}

/// An empty box displays as nothing.
impl<T: fmt::Display> fmt::Display for SharedBox<T> {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match SharedBox::get(self) {
            Some(val) => fmt::Display::fmt(val, f),
            None => Ok(()),
        }
    }
}

impl<T: fmt::Debug> fmt::Debug for SharedBox<T> {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match SharedBox::get(self) {
            Some(val) => fmt::Debug::fmt(val, f),
            None => f.write_str("(empty)"),
        }
    }
}

impl<T> fmt::Pointer for SharedBox<T> {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        fmt::Pointer::fmt(&SharedBox::as_ptr(self), f)
    }
}

// Comparisons look at the objects; an empty box sorts before any object.

impl<T: PartialEq> PartialEq for SharedBox<T> {
    #[inline]
    fn eq(&self, other: &SharedBox<T>) -> bool {
        SharedBox::get(self) == SharedBox::get(other)
    }
}

impl<T: PartialOrd> PartialOrd for SharedBox<T> {
    #[inline]
    fn partial_cmp(&self, other: &SharedBox<T>) -> Option<Ordering> {
        SharedBox::get(self).partial_cmp(&SharedBox::get(other))
    }
}

impl<T: Ord> Ord for SharedBox<T> {
    #[inline]
    fn cmp(&self, other: &SharedBox<T>) -> Ordering {
        SharedBox::get(self).cmp(&SharedBox::get(other))
    }
}

impl<T: Eq> Eq for SharedBox<T> {}

impl<T: Hash> Hash for SharedBox<T> {
    fn hash<H: hash::Hasher>(&self, state: &mut H) {
        SharedBox::get(self).hash(state);
    }
}
