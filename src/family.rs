//! Ownership families.
//!
//! A family is the pair of primitives a handle is built over: a refcounted
//! shared-ownership pointer and the weak observer that goes with it. `Local`
//! is `Rc` and is confined to one thread. `Global` is `Arc`, with thread-safe
//! refcounting and promotion. It is to `Local` what `Arc` is to `Rc`.

use std::{
    ops::Deref,
    rc::{self, Rc},
    sync::{self, Arc},
};

pub trait Family: 'static
{
    type Shared<T: ?Sized>: Clone + Deref<Target = T>;
    type Weak<T: ?Sized>: Clone;

    fn allocate<T>(value: T) -> Self::Shared<T>;
    fn downgrade<T: ?Sized>(this: &Self::Shared<T>) -> Self::Weak<T>;

    /// Attempt to promote a weak observer. This is the only atomic
    /// check-and-use operation on a weak reference.
    fn upgrade<T: ?Sized>(this: &Self::Weak<T>) -> Option<Self::Shared<T>>;

    fn upcast<K, B>(this: Self::Shared<K>) -> Self::Shared<B>
    where
        K: ?Sized + Upcast<B>,
        B: ?Sized;

    fn upcast_weak<K, B>(this: Self::Weak<K>) -> Self::Weak<B>
    where
        K: ?Sized + Upcast<B>,
        B: ?Sized;
}

/// Single-threaded family over `Rc`.
#[derive(Debug)]
pub enum Local {}

impl Family for Local
{
    type Shared<T: ?Sized> = Rc<T>;
    type Weak<T: ?Sized> = rc::Weak<T>;

    fn allocate<T>(value: T) -> Rc<T> { Rc::new(value) }
    fn downgrade<T: ?Sized>(this: &Rc<T>) -> rc::Weak<T> { Rc::downgrade(this) }
    fn upgrade<T: ?Sized>(this: &rc::Weak<T>) -> Option<Rc<T>> { this.upgrade() }

    fn upcast<K, B>(this: Rc<K>) -> Rc<B>
    where
        K: ?Sized + Upcast<B>,
        B: ?Sized,
    {
        K::upcast_rc(this)
    }

    fn upcast_weak<K, B>(this: rc::Weak<K>) -> rc::Weak<B>
    where
        K: ?Sized + Upcast<B>,
        B: ?Sized,
    {
        K::upcast_rc_weak(this)
    }
}

/// Thread-safe family over `Arc`.
#[cfg(feature = "global")]
#[derive(Debug)]
pub enum Global {}

#[cfg(feature = "global")]
impl Family for Global
{
    type Shared<T: ?Sized> = Arc<T>;
    type Weak<T: ?Sized> = sync::Weak<T>;

    fn allocate<T>(value: T) -> Arc<T> { Arc::new(value) }
    fn downgrade<T: ?Sized>(this: &Arc<T>) -> sync::Weak<T> { Arc::downgrade(this) }
    fn upgrade<T: ?Sized>(this: &sync::Weak<T>) -> Option<Arc<T>> { this.upgrade() }

    fn upcast<K, B>(this: Arc<K>) -> Arc<B>
    where
        K: ?Sized + Upcast<B>,
        B: ?Sized,
    {
        K::upcast_arc(this)
    }

    fn upcast_weak<K, B>(this: sync::Weak<K>) -> sync::Weak<B>
    where
        K: ?Sized + Upcast<B>,
        B: ?Sized,
    {
        K::upcast_arc_weak(this)
    }
}

/// Declares that `Self` "is a" `B`.
///
/// Every type is trivially an instance of itself. Further relations, from a
/// type to a trait object it implements or from a trait object to one of its
/// supertraits, are declared with the `upcast!` macro. Handles only convert
/// along declared relations, so an invalid upcast is a compile error:
///
/// ```compile_fail
/// use mptr::OwningHandle;
///
/// trait Shape {}
/// struct Square;
///
/// // implemented, but never declared with `upcast!`
/// impl Shape for Square {}
///
/// let square = OwningHandle::new(Square);
/// let shape: OwningHandle<dyn Shape> = square.upcast();
/// ```
pub trait Upcast<B: ?Sized>
{
    fn upcast_ref(&self) -> &B;
    fn upcast_rc(this: Rc<Self>) -> Rc<B>;
    fn upcast_rc_weak(this: rc::Weak<Self>) -> rc::Weak<B>;
    fn upcast_arc(this: Arc<Self>) -> Arc<B>;
    fn upcast_arc_weak(this: sync::Weak<Self>) -> sync::Weak<B>;
}

impl<T: ?Sized> Upcast<T> for T
{
    fn upcast_ref(&self) -> &T { self }
    fn upcast_rc(this: Rc<Self>) -> Rc<T> { this }
    fn upcast_rc_weak(this: rc::Weak<Self>) -> rc::Weak<T> { this }
    fn upcast_arc(this: Arc<Self>) -> Arc<T> { this }
    fn upcast_arc_weak(this: sync::Weak<Self>) -> sync::Weak<T> { this }
}

/// `&B` without the reference's lifetime leaking into a trait object's
/// default bound; used by `upcast!`.
#[doc(hidden)]
pub type BaseRef<'r, B> = &'r B;

/// Declare `Derived => Base` relations for `Upcast`.
///
/// `Base` must be a trait object that `Derived` coerces to: a trait `Derived`
/// implements, or a supertrait when `Derived` is itself a trait object.
///
/// ```
/// use mptr::{upcast, OwningHandle};
///
/// trait Shape { fn area(&self) -> f64; }
/// trait Polygon: Shape { fn corners(&self) -> usize; }
///
/// struct Square(f64);
/// impl Shape for Square { fn area(&self) -> f64 { self.0 * self.0 } }
/// impl Polygon for Square { fn corners(&self) -> usize { 4 } }
///
/// upcast!(Square => dyn Polygon, Square => dyn Shape, dyn Polygon => dyn Shape);
///
/// let square = OwningHandle::new(Square(2.0));
/// let polygon: OwningHandle<dyn Polygon> = square.upcast();
/// let shape: OwningHandle<dyn Shape> = polygon.clone().upcast();
/// assert_eq!(polygon.get()?.corners(), 4);
/// assert_eq!(shape.get()?.area(), 4.0);
/// # Ok::<(), mptr::ChainedError>(())
/// ```
#[macro_export]
macro_rules! upcast {
    ($($derived:ty => $base:ty),+ $(,)?) => {
        $(
            impl $crate::Upcast<$base> for $derived
            {
                fn upcast_ref(&self) -> $crate::family::BaseRef<'_, $base> { self }

                fn upcast_rc(this: ::std::rc::Rc<Self>) -> ::std::rc::Rc<$base> { this }

                fn upcast_rc_weak(this: ::std::rc::Weak<Self>) -> ::std::rc::Weak<$base>
                {
                    this
                }

                fn upcast_arc(this: ::std::sync::Arc<Self>) -> ::std::sync::Arc<$base> { this }

                fn upcast_arc_weak(
                    this: ::std::sync::Weak<Self>,
                ) -> ::std::sync::Weak<$base>
                {
                    this
                }
            }
        )+
    };
}
