//! Uniform invocation through whatever is holding the target.
//!
//! An operation is anything callable as `op(&target, args...)`, typically a
//! method path such as `Counter::add`, paired with a tuple of the remaining
//! arguments. Representations that hold their target implement `Holds` and
//! are invoked unconditionally with `invoke`. Representations that merely
//! observe it implement `Observes` and go through `invoke_weak`, which
//! reports a vanished target as `false` rather than as an error.

use std::{
    rc::{self, Rc},
    sync::{self, Arc},
};

use crate::{
    error::ChainedError,
    family::Family,
    pointers::{OwningHandle, WeakHandle},
    stats::{self, Event},
};

/// A representation that always holds its target.
pub trait Holds<T: ?Sized>
{
    /// Fails only for an `Unset` `OwningHandle`.
    fn resolve(&self) -> Result<&T, ChainedError>;
}

impl<T: ?Sized> Holds<T> for T
{
    fn resolve(&self) -> Result<&T, ChainedError> { Ok(self) }
}

impl<T: ?Sized> Holds<T> for &T
{
    fn resolve(&self) -> Result<&T, ChainedError> { Ok(*self) }
}

impl<T: ?Sized> Holds<T> for Box<T>
{
    fn resolve(&self) -> Result<&T, ChainedError> { Ok(&**self) }
}

impl<T: ?Sized> Holds<T> for Rc<T>
{
    fn resolve(&self) -> Result<&T, ChainedError> { Ok(&**self) }
}

impl<T: ?Sized> Holds<T> for Arc<T>
{
    fn resolve(&self) -> Result<&T, ChainedError> { Ok(&**self) }
}

impl<'a, T: ?Sized, F: Family> Holds<T> for OwningHandle<'a, T, F>
{
    fn resolve(&self) -> Result<&T, ChainedError> { self.get() }
}

/// A representation that observes its target, which may be gone.
pub trait Observes<T: ?Sized>
{
    /// Run `f` on the target if it is still alive.
    fn observe<R>(&self, f: impl FnOnce(&T) -> R) -> Option<R>;
}

impl<T: ?Sized> Observes<T> for rc::Weak<T>
{
    fn observe<R>(&self, f: impl FnOnce(&T) -> R) -> Option<R>
    {
        let target = self.upgrade()?;
        Some(f(&*target))
    }
}

impl<T: ?Sized> Observes<T> for sync::Weak<T>
{
    fn observe<R>(&self, f: impl FnOnce(&T) -> R) -> Option<R>
    {
        let target = self.upgrade()?;
        Some(f(&*target))
    }
}

impl<'a, T: ?Sized, F: Family> Observes<T> for WeakHandle<'a, T, F>
{
    fn observe<R>(&self, f: impl FnOnce(&T) -> R) -> Option<R>
    {
        self.lock().try_get().map(f)
    }
}

/// An operation on a `T` taking the argument tuple `Args`.
///
/// Implemented for every `FnOnce(&T, A1, .., An) -> R` up to six arguments,
/// with `Args = (A1, .., An)`.
pub trait Callable<T: ?Sized, Args>
{
    type Output;

    fn call(self, target: &T, args: Args) -> Self::Output;
}

macro_rules! impl_callable {
    ($($arg:ident),*) => {
        impl<T: ?Sized, Op, R, $($arg),*> Callable<T, ($($arg,)*)> for Op
        where
            Op: FnOnce(&T, $($arg),*) -> R,
        {
            type Output = R;

            #[allow(non_snake_case)]
            fn call(self, target: &T, ($($arg,)*): ($($arg,)*)) -> R { self(target, $($arg),*) }
        }
    };
}

impl_callable!();
impl_callable!(A1);
impl_callable!(A1, A2);
impl_callable!(A1, A2, A3);
impl_callable!(A1, A2, A3, A4);
impl_callable!(A1, A2, A3, A4, A5);
impl_callable!(A1, A2, A3, A4, A5, A6);

/// Invoke `op` on the target of `holder`.
///
/// Never declines: an `Unset` owning handle surfaces as its `NullHandle`
/// error.
pub fn invoke<T, H, Op, Args>(holder: &H, op: Op, args: Args) -> Result<Op::Output, ChainedError>
where
    T: ?Sized,
    H: Holds<T> + ?Sized,
    Op: Callable<T, Args>,
{
    let target = <H as Holds<T>>::resolve(holder)?;
    Ok(<Op as Callable<T, Args>>::call(op, target, args))
}

/// Invoke `op` on the target of `observer`, if it is still alive.
///
/// Returns whether the operation ran. A vanished target is an expected
/// outcome, not an error: nothing runs and `false` is returned.
pub fn invoke_weak<T, H, Op, Args>(observer: &H, op: Op, args: Args) -> bool
where
    T: ?Sized,
    H: Observes<T> + ?Sized,
    Op: Callable<T, Args>,
{
    invoke_weak_with(observer, op, args).is_some()
}

/// Like `invoke_weak`, handing back the operation's result.
pub fn invoke_weak_with<T, H, Op, Args>(observer: &H, op: Op, args: Args) -> Option<Op::Output>
where
    T: ?Sized,
    H: Observes<T> + ?Sized,
    Op: Callable<T, Args>,
{
    let res = <H as Observes<T>>::observe(observer, |target| {
        <Op as Callable<T, Args>>::call(op, target, args)
    });
    if res.is_none() {
        stats::record(Event::DeclinedInvocation);
        log::trace!("declined invocation: observed target is gone");
    }
    res
}
