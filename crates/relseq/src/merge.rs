//! Sort-merge union of two pre-ordered sequences.
//!
//! Both inputs must already be ordered by the merge key according to the
//! chosen `KeyOrdering`. This isn't checked: unordered input produces an
//! interleaving that is simply wrong, not an error.
//!
//! Only the current element of each side is held at any time. Equal keys are
//! consumed one-for-one, so a run of k equal keys on one side against j on
//! the other produces min(k, j) matched results followed by the leftover
//! single-side results, not k*j.

use std::cmp::Ordering;
use std::future::Future;
use std::marker::PhantomData;

use async_stream::try_stream;
use futures::Stream;
use relseq_error::Result;
use tokio_util::sync::CancellationToken;
use tracing::trace;

use crate::comparer::{KeyOrdering, NaturalOrder};
use crate::cursor::Cursor;
use crate::selector::{
    AsyncFn,
    AsyncKey,
    KeySelector,
    Projection,
    Projection2,
    SyncFn,
    SyncKey,
};

/// Entry point for merging two ordered sequences.
#[derive(Debug)]
pub struct MergeBuilder<SF, SS> {
    first: SF,
    second: SS,
    cancel: Option<CancellationToken>,
}

impl<SF, SS> MergeBuilder<SF, SS> {
    pub fn new(first: SF, second: SS) -> Self {
        MergeBuilder {
            first,
            second,
            cancel: None,
        }
    }

    pub fn with_cancellation(mut self, token: CancellationToken) -> Self {
        self.cancel = Some(token);
        self
    }

    fn keyed<K, KF, KS>(self, first_key: KF, second_key: KS) -> KeyedMerge<SF, SS, KF, KS, K> {
        KeyedMerge {
            first: self.first,
            second: self.second,
            first_key,
            second_key,
            ordering: NaturalOrder,
            cancel: self.cancel,
            _key: PhantomData,
        }
    }
}

impl<SF, SS, F, S> MergeBuilder<SF, SS>
where
    SF: Stream<Item = Result<F>>,
    SS: Stream<Item = Result<S>>,
{
    pub fn on<K, KF, KS>(
        self,
        first_key: KF,
        second_key: KS,
    ) -> KeyedMerge<SF, SS, SyncKey<KF>, SyncKey<KS>, K>
    where
        KF: Fn(&F) -> K,
        KS: Fn(&S) -> K,
    {
        self.keyed(SyncKey::new(first_key), SyncKey::new(second_key))
    }

    pub fn on_async<K, KF, KS, FutF, FutS>(
        self,
        first_key: KF,
        second_key: KS,
    ) -> KeyedMerge<SF, SS, AsyncKey<KF, FutF>, AsyncKey<KS, FutS>, K>
    where
        KF: Fn(&F) -> FutF,
        KS: Fn(&S) -> FutS,
        FutF: Future<Output = Result<K>>,
        FutS: Future<Output = Result<K>>,
    {
        self.keyed(AsyncKey::new(first_key), AsyncKey::new(second_key))
    }
}

impl<SF, SS, T> MergeBuilder<SF, SS>
where
    SF: Stream<Item = Result<T>>,
    SS: Stream<Item = Result<T>>,
{
    pub fn on_key<K, KF>(self, key: KF) -> KeyedMerge<SF, SS, SyncKey<KF>, SyncKey<KF>, K>
    where
        KF: Fn(&T) -> K + Clone,
    {
        self.keyed(SyncKey::new(key.clone()), SyncKey::new(key))
    }

    pub fn on_key_async<K, KF, Fut>(
        self,
        key: KF,
    ) -> KeyedMerge<SF, SS, AsyncKey<KF, Fut>, AsyncKey<KF, Fut>, K>
    where
        KF: Fn(&T) -> Fut + Clone,
        Fut: Future<Output = Result<K>>,
    {
        self.keyed(AsyncKey::new(key.clone()), AsyncKey::new(key))
    }
}

pub struct KeyedMerge<SF, SS, KF, KS, K, C = NaturalOrder> {
    first: SF,
    second: SS,
    first_key: KF,
    second_key: KS,
    ordering: C,
    cancel: Option<CancellationToken>,
    _key: PhantomData<fn() -> K>,
}

impl<SF, SS, KF, KS, K, C> std::fmt::Debug for KeyedMerge<SF, SS, KF, KS, K, C> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("KeyedMerge")
            .field("cancellable", &self.cancel.is_some())
            .finish_non_exhaustive()
    }
}

impl<SF, SS, KF, KS, K, C> KeyedMerge<SF, SS, KF, KS, K, C> {
    /// Order keys with `ordering` instead of ascending natural order.
    pub fn using<C2>(self, ordering: C2) -> KeyedMerge<SF, SS, KF, KS, K, C2>
    where
        C2: KeyOrdering<K>,
    {
        KeyedMerge {
            first: self.first,
            second: self.second,
            first_key: self.first_key,
            second_key: self.second_key,
            ordering,
            cancel: self.cancel,
            _key: PhantomData,
        }
    }

    pub fn with_cancellation(mut self, token: CancellationToken) -> Self {
        self.cancel = Some(token);
        self
    }
}

impl<SF, SS, F, S, KF, KS, K, C> KeyedMerge<SF, SS, KF, KS, K, C>
where
    SF: Stream<Item = Result<F>>,
    SS: Stream<Item = Result<S>>,
    KF: KeySelector<F, K>,
    KS: KeySelector<S, K>,
    C: KeyOrdering<K>,
{
    pub fn select<O, PF, PS, PB>(
        self,
        first: PF,
        second: PS,
        both: PB,
    ) -> impl Stream<Item = Result<O>>
    where
        PF: Fn(F) -> O,
        PS: Fn(S) -> O,
        PB: Fn(F, S) -> O,
    {
        ordered_merge(
            self.first,
            self.second,
            self.first_key,
            self.second_key,
            self.ordering,
            self.cancel,
            SyncFn(first),
            SyncFn(second),
            SyncFn(both),
        )
    }

    pub fn select_async<O, PF, PS, PB, FutF, FutS, FutB>(
        self,
        first: PF,
        second: PS,
        both: PB,
    ) -> impl Stream<Item = Result<O>>
    where
        PF: Fn(F) -> FutF,
        PS: Fn(S) -> FutS,
        PB: Fn(F, S) -> FutB,
        FutF: Future<Output = Result<O>>,
        FutS: Future<Output = Result<O>>,
        FutB: Future<Output = Result<O>>,
    {
        ordered_merge(
            self.first,
            self.second,
            self.first_key,
            self.second_key,
            self.ordering,
            self.cancel,
            AsyncFn(first),
            AsyncFn(second),
            AsyncFn(both),
        )
    }
}

impl<SF, SS, T, KF, KS, K, C> KeyedMerge<SF, SS, KF, KS, K, C>
where
    SF: Stream<Item = Result<T>>,
    SS: Stream<Item = Result<T>>,
    KF: KeySelector<T, K>,
    KS: KeySelector<T, K>,
    C: KeyOrdering<K>,
{
    /// Merge into a single ordered sequence. When keys tie, the element from
    /// the first sequence is kept and the second is dropped.
    pub fn merged(self) -> impl Stream<Item = Result<T>> {
        self.select(|f| f, |s| s, |f, _s| f)
    }
}

/// Sort-merge driver.
///
/// The match on the two heads is the state machine:
///
/// - (Some, Some): both active, compare keys.
/// - (Some, None) / (None, Some): one side exhausted, drain the other.
/// - (None, None): done.
///
/// Every cursor advance happens after the result that consumed the previous
/// element was yielded, so pulls happen in lockstep with output.
#[allow(clippy::too_many_arguments)]
fn ordered_merge<SF, SS, F, S, K, KF, KS, C, PF, PS, PB, O>(
    first: SF,
    second: SS,
    first_key: KF,
    second_key: KS,
    ordering: C,
    cancel: Option<CancellationToken>,
    first_only: PF,
    second_only: PS,
    both: PB,
) -> impl Stream<Item = Result<O>>
where
    SF: Stream<Item = Result<F>>,
    SS: Stream<Item = Result<S>>,
    KF: KeySelector<F, K>,
    KS: KeySelector<S, K>,
    C: KeyOrdering<K>,
    PF: Projection<F, O>,
    PS: Projection<S, O>,
    PB: Projection2<F, S, O>,
{
    try_stream! {
        let mut first_cursor = Cursor::new(first, cancel.as_ref());
        let mut second_cursor = Cursor::new(second, cancel.as_ref());

        let mut first_head = first_cursor.advance_keyed(&first_key).await?;
        let mut second_head = second_cursor.advance_keyed(&second_key).await?;

        loop {
            match (first_head.take(), second_head.take()) {
                (Some((fk, f)), Some((sk, s))) => match ordering.compare(&fk, &sk) {
                    Ordering::Less => {
                        second_head = Some((sk, s));
                        yield first_only.project(f).await?;
                        first_head = first_cursor.advance_keyed(&first_key).await?;
                        if first_head.is_none() {
                            trace!("first merge input exhausted");
                        }
                    }
                    Ordering::Greater => {
                        first_head = Some((fk, f));
                        yield second_only.project(s).await?;
                        second_head = second_cursor.advance_keyed(&second_key).await?;
                        if second_head.is_none() {
                            trace!("second merge input exhausted");
                        }
                    }
                    Ordering::Equal => {
                        yield both.project(f, s).await?;
                        first_head = first_cursor.advance_keyed(&first_key).await?;
                        second_head = second_cursor.advance_keyed(&second_key).await?;
                    }
                },
                (Some((_, f)), None) => {
                    yield first_only.project(f).await?;
                    first_head = first_cursor.advance_keyed(&first_key).await?;
                }
                (None, Some((_, s))) => {
                    yield second_only.project(s).await?;
                    second_head = second_cursor.advance_keyed(&second_key).await?;
                }
                (None, None) => break,
            }
        }
    }
}
