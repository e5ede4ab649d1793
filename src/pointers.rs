use std::{
    fmt,
    ops::Deref,
    ptr,
    rc::{self, Rc},
};

#[cfg(feature = "global")]
use std::sync::{self, Arc};

#[cfg(feature = "global")]
use crate::family::Global;
use crate::{
    error::ChainedError,
    family::{Family, Local, Upcast},
    stats::{self, Event},
};

/// Which representation a handle currently holds.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Mode
{
    Unset,
    Raw,
    Shared,
    Weak,
}

/// Owning handle, or rather: maybe-owning handle.
///
/// Holds its target either by borrow (`Raw`) or by shared ownership
/// (`Shared`), without the holder having to care which. The mode is fixed at
/// construction, but validity is checked at every access: accessing an
/// `Unset` handle fails with a `NullHandle` error, however long ago the
/// handle was made.
///
/// Cloning a `Shared` handle bumps the reference count, cloning a `Raw`
/// handle copies the borrow.
pub enum OwningHandle<'a, T: ?Sized, F: Family = Local>
{
    Unset,
    Raw(&'a T),
    Shared(F::Shared<T>),
}

impl<'a, T> OwningHandle<'a, T>
{
    /// Allocate `value` with shared ownership and wrap it.
    pub fn new(value: T) -> Self { Self::allocate(value) }
}

impl<'a, T, F: Family> OwningHandle<'a, T, F>
{
    /// Allocate `value` with shared ownership in any family.
    pub fn allocate(value: T) -> Self { Self::Shared(F::allocate(value)) }
}

impl<'a, T: ?Sized, F: Family> OwningHandle<'a, T, F>
{
    pub fn shared(ptr: F::Shared<T>) -> Self { Self::Shared(ptr) }

    /// Wrap a borrow. No ownership is taken and no liveness check will ever
    /// be made; the borrow checker keeps the target alive.
    pub fn raw(target: &'a T) -> Self { Self::Raw(target) }

    /// Upcast construction, leaving `other` untouched.
    pub fn from_derived<K>(other: &OwningHandle<'a, K, F>) -> Self
    where
        K: ?Sized + Upcast<T>,
    {
        other.clone().upcast::<T>()
    }

    pub fn mode(&self) -> Mode
    {
        match self {
            Self::Unset => Mode::Unset,
            Self::Raw(_) => Mode::Raw,
            Self::Shared(_) => Mode::Shared,
        }
    }

    pub fn is_set(&self) -> bool { !matches!(self, Self::Unset) }

    /// Access the target.
    ///
    /// Fails with a `NullHandle` error if the handle is `Unset`.
    pub fn get(&self) -> Result<&T, ChainedError>
    {
        self.try_get().ok_or_else(null_access)
    }

    /// Access the target without raising, logging or counting anything.
    pub fn try_get(&self) -> Option<&T>
    {
        match self {
            Self::Unset => None,
            Self::Raw(target) => Some(*target),
            Self::Shared(ptr) => Some(&**ptr),
        }
    }

    pub fn as_shared(&self) -> Option<&F::Shared<T>>
    {
        match self {
            Self::Shared(ptr) => Some(ptr),
            _ => None,
        }
    }

    pub fn into_shared(self) -> Option<F::Shared<T>>
    {
        match self {
            Self::Shared(ptr) => Some(ptr),
            _ => None,
        }
    }

    /// Whether both handles point at the same object. Two `Unset` handles
    /// are equal, like two null pointers.
    pub fn ptr_eq(&self, other: &Self) -> bool
    {
        match (self.try_get(), other.try_get()) {
            (Some(a), Some(b)) => ptr::addr_eq(a as *const T, b as *const T),
            (None, None) => true,
            _ => false,
        }
    }

    /// Produce a weak alias.
    ///
    /// A `Shared` handle becomes a `Weak` observer of the same allocation,
    /// a `Raw` handle stays a plain borrow.
    pub fn downgrade(&self) -> WeakHandle<'a, T, F>
    {
        match self {
            Self::Unset => WeakHandle::Unset,
            Self::Raw(target) => WeakHandle::Raw(*target),
            Self::Shared(ptr) => WeakHandle::Weak(F::downgrade::<T>(ptr)),
        }
    }

    /// Produce a weak alias typed as `B`, sharing the same target.
    pub fn downgrade_to<B>(&self) -> WeakHandle<'a, B, F>
    where
        T: Upcast<B>,
        B: ?Sized + 'a,
    {
        match self {
            Self::Unset => WeakHandle::Unset,
            Self::Raw(target) => WeakHandle::Raw(<T as Upcast<B>>::upcast_ref(target)),
            Self::Shared(ptr) => {
                WeakHandle::Weak(F::upcast_weak::<T, B>(F::downgrade::<T>(ptr)))
            }
        }
    }

    /// Convert along a declared `Upcast` relation, preserving the mode.
    pub fn upcast<B>(self) -> OwningHandle<'a, B, F>
    where
        T: Upcast<B>,
        B: ?Sized + 'a,
    {
        match self {
            Self::Unset => OwningHandle::Unset,
            Self::Raw(target) => OwningHandle::Raw(<T as Upcast<B>>::upcast_ref(target)),
            Self::Shared(ptr) => OwningHandle::Shared(F::upcast::<T, B>(ptr)),
        }
    }
}

fn null_access() -> ChainedError
{
    stats::record(Event::NullAccess);
    log::debug!("access through an unset handle");
    ChainedError::null_handle()
}

impl<'a, T: ?Sized, F: Family> Deref for OwningHandle<'a, T, F>
{
    type Target = T;

    /// # Panics
    ///
    /// Panics with the `NullHandle` message if the handle is `Unset`. Use
    /// `get` to handle that case.
    fn deref(&self) -> &T
    {
        match self.get() {
            Ok(target) => target,
            Err(e) => panic!("{}", e),
        }
    }
}

impl<'a, T: ?Sized, F: Family> Clone for OwningHandle<'a, T, F>
{
    fn clone(&self) -> Self
    {
        match self {
            Self::Unset => Self::Unset,
            Self::Raw(target) => Self::Raw(*target),
            Self::Shared(ptr) => Self::Shared(ptr.clone()),
        }
    }
}

// manual: derive would demand `T: Default + Sized` and `F: Default`
impl<'a, T: ?Sized, F: Family> Default for OwningHandle<'a, T, F>
{
    fn default() -> Self { Self::Unset }
}

impl<'a, T: ?Sized, F: Family> fmt::Debug for OwningHandle<'a, T, F>
{
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result
    {
        f.debug_struct("OwningHandle")
            .field("mode", &self.mode())
            .field("ptr", &self.try_get().map(|it| it as *const T))
            .finish()
    }
}

impl<'a, T: ?Sized, F: Family> From<&'a T> for OwningHandle<'a, T, F>
{
    fn from(target: &'a T) -> Self { Self::Raw(target) }
}

impl<'a, T: ?Sized> From<Rc<T>> for OwningHandle<'a, T, Local>
{
    fn from(ptr: Rc<T>) -> Self { Self::Shared(ptr) }
}

#[cfg(feature = "global")]
impl<'a, T: ?Sized> From<Arc<T>> for OwningHandle<'a, T, Global>
{
    fn from(ptr: Arc<T>) -> Self { Self::Shared(ptr) }
}

impl<'a, T: ?Sized, F: Family> From<WeakHandle<'a, T, F>> for OwningHandle<'a, T, F>
{
    fn from(weak: WeakHandle<'a, T, F>) -> Self { weak.lock() }
}

/// Weak handle, observing its target without necessarily owning it.
///
/// Built from exactly one of a weak observer, a shared owner or a borrow;
/// the mode never changes afterwards. A `Weak` handle never keeps its target
/// alive, so liveness is checked again on every use.
///
/// `Raw` handles report no liveness information at all: they are always
/// considered alive, and `lock` always succeeds.
pub enum WeakHandle<'a, T: ?Sized, F: Family = Local>
{
    Unset,
    Raw(&'a T),
    Shared(F::Shared<T>),
    Weak(F::Weak<T>),
}

impl<'a, T: ?Sized, F: Family> WeakHandle<'a, T, F>
{
    pub fn weak(ptr: F::Weak<T>) -> Self { Self::Weak(ptr) }

    pub fn shared(ptr: F::Shared<T>) -> Self { Self::Shared(ptr) }

    pub fn raw(target: &'a T) -> Self { Self::Raw(target) }

    pub fn mode(&self) -> Mode
    {
        match self {
            Self::Unset => Mode::Unset,
            Self::Raw(_) => Mode::Raw,
            Self::Shared(_) => Mode::Shared,
            Self::Weak(_) => Mode::Weak,
        }
    }

    /// Whether `lock` would currently produce a set handle.
    ///
    /// This is not a check-then-use primitive: the target of a `Weak` handle
    /// may be gone by the time of the next call. Use `lock` and inspect the
    /// result instead.
    pub fn is_alive(&self) -> bool
    {
        match self {
            Self::Unset => false,
            Self::Raw(_) | Self::Shared(_) => true,
            Self::Weak(ptr) => F::upgrade::<T>(ptr).is_some(),
        }
    }

    /// Obtain an owning handle to the target.
    ///
    /// `Raw` and `Shared` handles lock to the same mode. A `Weak` handle
    /// promotes to `Shared`, or yields `Unset` if the target no longer
    /// exists.
    pub fn lock(&self) -> OwningHandle<'a, T, F>
    {
        match self {
            Self::Unset => OwningHandle::Unset,
            Self::Raw(target) => OwningHandle::Raw(*target),
            Self::Shared(ptr) => OwningHandle::Shared(ptr.clone()),
            Self::Weak(ptr) => match F::upgrade::<T>(ptr) {
                Some(ptr) => OwningHandle::Shared(ptr),
                None => {
                    stats::record(Event::FailedLock);
                    log::trace!("weak handle outlived its target");
                    OwningHandle::Unset
                }
            },
        }
    }

    /// Convert along a declared `Upcast` relation, preserving the mode.
    pub fn upcast<B>(self) -> WeakHandle<'a, B, F>
    where
        T: Upcast<B>,
        B: ?Sized + 'a,
    {
        match self {
            Self::Unset => WeakHandle::Unset,
            Self::Raw(target) => WeakHandle::Raw(<T as Upcast<B>>::upcast_ref(target)),
            Self::Shared(ptr) => WeakHandle::Shared(F::upcast::<T, B>(ptr)),
            Self::Weak(ptr) => WeakHandle::Weak(F::upcast_weak::<T, B>(ptr)),
        }
    }
}

impl<'a, T: ?Sized, F: Family> Clone for WeakHandle<'a, T, F>
{
    fn clone(&self) -> Self
    {
        match self {
            Self::Unset => Self::Unset,
            Self::Raw(target) => Self::Raw(*target),
            Self::Shared(ptr) => Self::Shared(ptr.clone()),
            Self::Weak(ptr) => Self::Weak(ptr.clone()),
        }
    }
}

// manual: derive would demand `T: Default + Sized` and `F: Default`
impl<'a, T: ?Sized, F: Family> Default for WeakHandle<'a, T, F>
{
    fn default() -> Self { Self::Unset }
}

impl<'a, T: ?Sized, F: Family> fmt::Debug for WeakHandle<'a, T, F>
{
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result
    {
        f.debug_struct("WeakHandle")
            .field("mode", &self.mode())
            .finish()
    }
}

impl<'a, T: ?Sized, F: Family> From<&'a T> for WeakHandle<'a, T, F>
{
    fn from(target: &'a T) -> Self { Self::Raw(target) }
}

impl<'a, T: ?Sized> From<Rc<T>> for WeakHandle<'a, T, Local>
{
    fn from(ptr: Rc<T>) -> Self { Self::Shared(ptr) }
}

impl<'a, T: ?Sized> From<rc::Weak<T>> for WeakHandle<'a, T, Local>
{
    fn from(ptr: rc::Weak<T>) -> Self { Self::Weak(ptr) }
}

#[cfg(feature = "global")]
impl<'a, T: ?Sized> From<Arc<T>> for WeakHandle<'a, T, Global>
{
    fn from(ptr: Arc<T>) -> Self { Self::Shared(ptr) }
}

#[cfg(feature = "global")]
impl<'a, T: ?Sized> From<sync::Weak<T>> for WeakHandle<'a, T, Global>
{
    fn from(ptr: sync::Weak<T>) -> Self { Self::Weak(ptr) }
}
