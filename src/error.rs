//! Chained-context errors.
//!
//! A `ChainedError` is the one error type of this crate. Any failure can be
//! re-raised with added context by wrapping it as the parent of a new error,
//! which builds a diagnostic chain without losing the original message.

use std::fmt::{self, Display, Write};
use thiserror::Error;

/// Coarse classification of a `ChainedError`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[non_exhaustive]
pub enum ErrorKind
{
    /// Access through an `Unset` handle.
    NullHandle,

    /// Anything raised by code built on top of the handles.
    Other,
}

/// An error message with an optional, exclusively owned cause.
///
/// Displays as its own message followed by a space and the parent's own
/// message. Only one level is flattened; walk `parent()` or use
/// `full_message()` to render deeper chains.
///
/// Dropping an error drops its whole chain recursively, so the call depth of
/// a drop is proportional to the depth of the chain.
#[derive(Debug, Clone, Error)]
#[error("{}", self.rendered_message())]
pub struct ChainedError
{
    kind: ErrorKind,
    message: String,
    #[source]
    parent: Option<Box<ChainedError>>,
}

impl ChainedError
{
    pub(crate) const NULL_HANDLE: &'static str = "handle should not contain null pointers";

    pub fn new(message: impl Into<String>) -> Self
    {
        Self {
            kind: ErrorKind::Other,
            message: message.into(),
            parent: None,
        }
    }

    /// Wrap a copy of `parent`.
    ///
    /// The argument is left untouched, so one error can be wrapped several
    /// times without the wrappers aliasing each other.
    pub fn wrap(parent: &ChainedError, message: impl Into<String>) -> Self
    {
        Self::caused_by(parent.clone(), message)
    }

    /// Wrap `parent`, taking ownership of it.
    pub fn caused_by(parent: ChainedError, message: impl Into<String>) -> Self
    {
        Self {
            kind: ErrorKind::Other,
            message: message.into(),
            parent: Some(Box::new(parent)),
        }
    }

    /// The error raised by accessing an `Unset` handle.
    pub fn null_handle() -> Self
    {
        Self {
            kind: ErrorKind::NullHandle,
            message: Self::NULL_HANDLE.to_owned(),
            parent: None,
        }
    }

    /// Concatenate the `Display` output of every part, with no separators.
    ///
    /// Backs the `chained!` macro.
    pub fn from_parts(parts: &[&dyn Display]) -> Self { Self::new(concat(parts)) }

    /// Like `from_parts`, wrapping a copy of `parent`.
    pub fn wrap_parts(parent: &ChainedError, parts: &[&dyn Display]) -> Self
    {
        Self::wrap(parent, concat(parts))
    }

    pub fn kind(&self) -> ErrorKind { self.kind }

    pub fn is_null_handle(&self) -> bool { self.kind == ErrorKind::NullHandle }

    pub fn has_parent(&self) -> bool { self.parent.is_some() }

    /// The cause of this error. Ownership stays with `self`.
    pub fn parent(&self) -> Option<&ChainedError> { self.parent.as_deref() }

    /// Consume this error, handing out its cause.
    pub fn into_parent(self) -> Option<ChainedError> { self.parent.map(|it| *it) }

    /// This error's own message, without any of its causes.
    pub fn message(&self) -> &str { &self.message }

    /// Own message, then the immediate parent's own message.
    pub fn rendered_message(&self) -> String
    {
        match &self.parent {
            None => self.message.clone(),
            Some(parent) => format!("{} {}", self.message, parent.message),
        }
    }

    /// Every message in the chain, outermost first, separated by spaces.
    pub fn full_message(&self) -> String
    {
        let mut res = String::new();
        for (depth, err) in self.chain().enumerate() {
            if depth > 0 {
                res.push(' ');
            }
            res.push_str(&err.message);
        }
        res
    }

    /// Iterate over this error and all of its ancestors.
    pub fn chain(&self) -> Chain<'_> { Chain { next: Some(self) } }
}

fn concat(parts: &[&dyn Display]) -> String
{
    let mut res = String::new();
    for part in parts {
        // writing into a String cannot fail
        let _ = write!(res, "{}", part);
    }
    res
}

impl From<String> for ChainedError
{
    fn from(message: String) -> Self { Self::new(message) }
}

impl From<&str> for ChainedError
{
    fn from(message: &str) -> Self { Self::new(message) }
}

/// Iterator over an error chain, see `ChainedError::chain`.
#[derive(Clone)]
pub struct Chain<'e>
{
    next: Option<&'e ChainedError>,
}

impl<'e> Iterator for Chain<'e>
{
    type Item = &'e ChainedError;

    fn next(&mut self) -> Option<Self::Item>
    {
        let res = self.next?;
        self.next = res.parent();
        Some(res)
    }
}

impl fmt::Debug for Chain<'_>
{
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result
    {
        f.debug_list().entries(self.clone().map(ChainedError::message)).finish()
    }
}

/// Wrap-and-rethrow for results.
pub trait Context<T>
{
    /// Wrap the error, if any, as the parent of a new error with `message`.
    fn context<D: Display>(self, message: D) -> Result<T, ChainedError>;

    /// Like `context`, building the message only on failure.
    fn with_context<D: Display, F: FnOnce() -> D>(self, f: F) -> Result<T, ChainedError>;
}

impl<T, E: Into<ChainedError>> Context<T> for Result<T, E>
{
    fn context<D: Display>(self, message: D) -> Result<T, ChainedError>
    {
        self.map_err(|e| ChainedError::caused_by(e.into(), message.to_string()))
    }

    fn with_context<D: Display, F: FnOnce() -> D>(self, f: F) -> Result<T, ChainedError>
    {
        self.map_err(|e| ChainedError::caused_by(e.into(), f().to_string()))
    }
}

/// Build a `ChainedError` from any number of `Display` values, concatenated
/// left to right with no separators.
///
/// `chained!(parent; parts...)` wraps a copy of `parent`.
///
/// ```
/// use mptr::chained;
///
/// let cause = chained!("disk ", 3, " is full");
/// let err = chained!(cause; "could not save ", "notes.txt");
/// assert_eq!(err.to_string(), "could not save notes.txt disk 3 is full");
/// assert_eq!(cause.message(), "disk 3 is full");
/// ```
#[macro_export]
macro_rules! chained {
    ($parent:expr; $($part:expr),+ $(,)?) => {
        $crate::ChainedError::wrap_parts(
            &$parent,
            &[$(&$part as &dyn ::core::fmt::Display),+],
        )
    };
    ($($part:expr),+ $(,)?) => {
        $crate::ChainedError::from_parts(&[$(&$part as &dyn ::core::fmt::Display),+])
    };
}
