//! Relational combinators over lazily produced, fallible async sequences.
//!
//! A sequence is any `Stream<Item = Result<T>>`. The two engines are the
//! hash join in [`join`] (left, right and full outer joins on key equality)
//! and the sort-merge in [`merge`] (ordered union of two sorted inputs).
//! Everything else supports them.
//!
//! Every operation is deferred: nothing is pulled from an input until the
//! returned stream is polled.

pub mod aggregate;
pub mod cartesian;
pub mod comparer;
pub mod cursor;
pub mod join;
pub mod key_index;
pub mod memoize;
pub mod merge;
pub mod partition;
pub mod selector;
pub mod source;

use std::fmt::Display;
use std::future::Future;

use futures::Stream;
pub use relseq_error::{RelSeqError, Result};

use crate::join::JoinBuilder;
use crate::memoize::Memoized;
use crate::merge::MergeBuilder;

/// Method syntax for every combinator in the crate.
///
/// Splitting is exposed as `split_on` since `futures::StreamExt` already
/// claims `split`.
pub trait RelSeqExt<T>: Stream<Item = Result<T>> + Sized {
    /// Start a hash join with `other`. `self` is the first (left) input.
    fn join_with<S>(self, other: S) -> JoinBuilder<Self, S> {
        JoinBuilder::new(self, other)
    }

    /// Start an ordered merge with `other`. Both inputs must already be
    /// ordered on the merge key.
    fn merge_with<S>(self, other: S) -> MergeBuilder<Self, S> {
        MergeBuilder::new(self, other)
    }

    fn memoize(self) -> Memoized<Self, T> {
        memoize::memoize(self)
    }

    fn cartesian<S, R, O, F>(self, other: S, selector: F) -> impl Stream<Item = Result<O>>
    where
        S: Stream<Item = Result<R>>,
        T: Clone,
        R: Clone,
        F: Fn(T, R) -> O,
    {
        cartesian::cartesian(self, other, selector)
    }

    fn partition<F>(self, predicate: F) -> impl Future<Output = Result<(Vec<T>, Vec<T>)>>
    where
        F: FnMut(&T) -> bool,
    {
        partition::partition(self, predicate)
    }

    fn split_on<F>(self, is_separator: F) -> impl Stream<Item = Result<Vec<T>>>
    where
        F: FnMut(&T) -> bool,
    {
        partition::split(self, is_separator)
    }

    fn split_on_at_most<F>(
        self,
        is_separator: F,
        count: usize,
    ) -> Result<impl Stream<Item = Result<Vec<T>>>>
    where
        F: FnMut(&T) -> bool,
    {
        partition::split_at_most(self, is_separator, count)
    }

    fn aggregate<A, B, FA, FB, O, FR>(
        self,
        first: (A, FA),
        second: (B, FB),
        result: FR,
    ) -> impl Future<Output = Result<O>>
    where
        FA: FnMut(A, &T) -> A,
        FB: FnMut(B, &T) -> B,
        FR: FnOnce(A, B) -> O,
    {
        aggregate::aggregate(self, first, second, result)
    }

    fn fold_exact<const N: usize, O, F>(self, folder: F) -> impl Future<Output = Result<O>>
    where
        F: FnOnce([T; N]) -> O,
    {
        aggregate::fold_exact::<N, _, _, _, _>(self, folder)
    }

    fn to_delimited_string(self, delimiter: &str) -> impl Future<Output = Result<String>>
    where
        T: Display,
    {
        aggregate::to_delimited_string(self, delimiter)
    }
}

impl<S, T> RelSeqExt<T> for S where S: Stream<Item = Result<T>> {}
