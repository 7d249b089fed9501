//! Helpers for lifting plain values into fallible sequences.

use std::pin::Pin;

use futures::Stream;
use futures::stream;
use relseq_error::Result;

/// A boxed, type-erased sequence.
pub type BoxSeq<'a, T> = Pin<Box<dyn Stream<Item = Result<T>> + Send + 'a>>;

/// Create a sequence that yields every element of `iter` successfully.
pub fn from_iter<I>(iter: I) -> impl Stream<Item = Result<I::Item>>
where
    I: IntoIterator,
{
    stream::iter(iter.into_iter().map(Ok))
}

/// Create a sequence from already fallible elements.
///
/// Useful for simulating an upstream producer that fails mid-sequence.
pub fn from_results<I, T>(iter: I) -> impl Stream<Item = Result<T>>
where
    I: IntoIterator<Item = Result<T>>,
{
    stream::iter(iter)
}
