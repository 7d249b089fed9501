//! Equality based outer joins over two sequences.
//!
//! All variants share a single hash join driver. The "index" side is drained
//! into a `KeyIndex` when the output is first polled, then the "probe" side
//! is streamed against it one element at a time.
//!
//! - LEFT: probe = first, index = second. Unmatched probe elements are
//!   emitted through the first selector; unmatched second elements are never
//!   emitted.
//! - RIGHT: a LEFT join with the inputs exchanged. The pair selector still
//!   receives `(first, second)`.
//! - FULL: a LEFT join that also tracks which index groups were matched.
//!   Once the probe side is exhausted, unmatched index elements are emitted in
//!   their original arrival order.
//!
//! Duplicate keys multiply: n probe elements and m index elements sharing a
//! key produce n*m matched results.

use std::future::Future;
use std::marker::PhantomData;

use async_stream::try_stream;
use futures::Stream;
use relseq_error::Result;
use tokio_util::sync::CancellationToken;
use tracing::trace;

use crate::comparer::{DefaultEquality, KeyEquality};
use crate::cursor::Cursor;
use crate::key_index::{KeyIndex, MatchTracker};
use crate::selector::{
    AsyncFn,
    AsyncKey,
    KeySelector,
    Projection,
    Projection2,
    Swapped,
    SyncFn,
    SyncKey,
};

/// Entry point for joining two sequences. Select keys with one of the `on`
/// methods.
#[derive(Debug)]
pub struct JoinBuilder<SL, SR> {
    first: SL,
    second: SR,
    cancel: Option<CancellationToken>,
}

impl<SL, SR> JoinBuilder<SL, SR> {
    pub fn new(first: SL, second: SR) -> Self {
        JoinBuilder {
            first,
            second,
            cancel: None,
        }
    }

    /// Abort the join with a `Cancelled` error once the token is cancelled.
    pub fn with_cancellation(mut self, token: CancellationToken) -> Self {
        self.cancel = Some(token);
        self
    }

    fn keyed<K, KL, KR>(self, first_key: KL, second_key: KR) -> KeyedJoin<SL, SR, KL, KR, K> {
        KeyedJoin {
            first: self.first,
            second: self.second,
            first_key,
            second_key,
            equality: DefaultEquality,
            cancel: self.cancel,
            _key: PhantomData,
        }
    }
}

impl<SL, SR, L, R> JoinBuilder<SL, SR>
where
    SL: Stream<Item = Result<L>>,
    SR: Stream<Item = Result<R>>,
{
    /// Join on keys selected separately from each side.
    pub fn on<K, FL, FR>(
        self,
        first_key: FL,
        second_key: FR,
    ) -> KeyedJoin<SL, SR, SyncKey<FL>, SyncKey<FR>, K>
    where
        FL: Fn(&L) -> K,
        FR: Fn(&R) -> K,
    {
        self.keyed(SyncKey::new(first_key), SyncKey::new(second_key))
    }

    /// Join on keys produced by suspending selectors.
    pub fn on_async<K, FL, FR, FutL, FutR>(
        self,
        first_key: FL,
        second_key: FR,
    ) -> KeyedJoin<SL, SR, AsyncKey<FL, FutL>, AsyncKey<FR, FutR>, K>
    where
        FL: Fn(&L) -> FutL,
        FR: Fn(&R) -> FutR,
        FutL: Future<Output = Result<K>>,
        FutR: Future<Output = Result<K>>,
    {
        self.keyed(AsyncKey::new(first_key), AsyncKey::new(second_key))
    }
}

impl<SL, SR, T> JoinBuilder<SL, SR>
where
    SL: Stream<Item = Result<T>>,
    SR: Stream<Item = Result<T>>,
{
    /// Join two sequences of the same element type on one key selector.
    pub fn on_key<K, F>(self, key: F) -> KeyedJoin<SL, SR, SyncKey<F>, SyncKey<F>, K>
    where
        F: Fn(&T) -> K + Clone,
    {
        self.keyed(SyncKey::new(key.clone()), SyncKey::new(key))
    }

    pub fn on_key_async<K, F, Fut>(
        self,
        key: F,
    ) -> KeyedJoin<SL, SR, AsyncKey<F, Fut>, AsyncKey<F, Fut>, K>
    where
        F: Fn(&T) -> Fut + Clone,
        Fut: Future<Output = Result<K>>,
    {
        self.keyed(AsyncKey::new(key.clone()), AsyncKey::new(key))
    }
}

/// A join with its keys chosen. Pick a comparer with `using`, then produce
/// the output with `left`, `right` or `full`.
pub struct KeyedJoin<SL, SR, KL, KR, K, E = DefaultEquality> {
    first: SL,
    second: SR,
    first_key: KL,
    second_key: KR,
    equality: E,
    cancel: Option<CancellationToken>,
    _key: PhantomData<fn() -> K>,
}

impl<SL, SR, KL, KR, K, E> std::fmt::Debug for KeyedJoin<SL, SR, KL, KR, K, E> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("KeyedJoin")
            .field("cancellable", &self.cancel.is_some())
            .finish_non_exhaustive()
    }
}

impl<SL, SR, KL, KR, K, E> KeyedJoin<SL, SR, KL, KR, K, E> {
    /// Compare keys with `equality` instead of the key type's natural
    /// equality. The key type itself doesn't need to be `Hash` or `Eq`.
    pub fn using<E2>(self, equality: E2) -> KeyedJoin<SL, SR, KL, KR, K, E2>
    where
        E2: KeyEquality<K>,
    {
        KeyedJoin {
            first: self.first,
            second: self.second,
            first_key: self.first_key,
            second_key: self.second_key,
            equality,
            cancel: self.cancel,
            _key: PhantomData,
        }
    }

    pub fn with_cancellation(mut self, token: CancellationToken) -> Self {
        self.cancel = Some(token);
        self
    }
}

impl<SL, SR, L, R, KL, KR, K, E> KeyedJoin<SL, SR, KL, KR, K, E>
where
    SL: Stream<Item = Result<L>>,
    SR: Stream<Item = Result<R>>,
    L: Clone,
    R: Clone,
    KL: KeySelector<L, K>,
    KR: KeySelector<R, K>,
    E: KeyEquality<K>,
{
    /// LEFT OUTER join. Every first element is emitted at least once.
    pub fn left<O, FF, FB>(self, first: FF, both: FB) -> impl Stream<Item = Result<O>>
    where
        FF: Fn(L) -> O,
        FB: Fn(L, R) -> O,
    {
        hash_join(
            self.first,
            self.second,
            self.first_key,
            self.second_key,
            self.equality,
            self.cancel,
            SyncFn(first),
            None::<SyncFn<fn(R) -> O>>,
            SyncFn(both),
        )
    }

    pub fn left_async<O, FF, FB, FutF, FutB>(
        self,
        first: FF,
        both: FB,
    ) -> impl Stream<Item = Result<O>>
    where
        FF: Fn(L) -> FutF,
        FB: Fn(L, R) -> FutB,
        FutF: Future<Output = Result<O>>,
        FutB: Future<Output = Result<O>>,
    {
        hash_join(
            self.first,
            self.second,
            self.first_key,
            self.second_key,
            self.equality,
            self.cancel,
            AsyncFn(first),
            None::<SyncFn<fn(R) -> O>>,
            AsyncFn(both),
        )
    }

    /// RIGHT OUTER join. Every second element is emitted at least once.
    ///
    /// Probes with the second sequence against an index of the first.
    pub fn right<O, FS, FB>(self, second: FS, both: FB) -> impl Stream<Item = Result<O>>
    where
        FS: Fn(R) -> O,
        FB: Fn(L, R) -> O,
    {
        hash_join(
            self.second,
            self.first,
            self.second_key,
            self.first_key,
            self.equality,
            self.cancel,
            SyncFn(second),
            None::<SyncFn<fn(L) -> O>>,
            Swapped(SyncFn(both)),
        )
    }

    pub fn right_async<O, FS, FB, FutS, FutB>(
        self,
        second: FS,
        both: FB,
    ) -> impl Stream<Item = Result<O>>
    where
        FS: Fn(R) -> FutS,
        FB: Fn(L, R) -> FutB,
        FutS: Future<Output = Result<O>>,
        FutB: Future<Output = Result<O>>,
    {
        hash_join(
            self.second,
            self.first,
            self.second_key,
            self.first_key,
            self.equality,
            self.cancel,
            AsyncFn(second),
            None::<SyncFn<fn(L) -> O>>,
            Swapped(AsyncFn(both)),
        )
    }

    /// FULL OUTER join. Every element of both sequences is emitted at least
    /// once.
    ///
    /// Output order is all first-driven results in first arrival order,
    /// followed by unmatched second elements in second arrival order.
    pub fn full<O, FF, FS, FB>(
        self,
        first: FF,
        second: FS,
        both: FB,
    ) -> impl Stream<Item = Result<O>>
    where
        FF: Fn(L) -> O,
        FS: Fn(R) -> O,
        FB: Fn(L, R) -> O,
    {
        hash_join(
            self.first,
            self.second,
            self.first_key,
            self.second_key,
            self.equality,
            self.cancel,
            SyncFn(first),
            Some(SyncFn(second)),
            SyncFn(both),
        )
    }

    pub fn full_async<O, FF, FS, FB, FutF, FutS, FutB>(
        self,
        first: FF,
        second: FS,
        both: FB,
    ) -> impl Stream<Item = Result<O>>
    where
        FF: Fn(L) -> FutF,
        FS: Fn(R) -> FutS,
        FB: Fn(L, R) -> FutB,
        FutF: Future<Output = Result<O>>,
        FutS: Future<Output = Result<O>>,
        FutB: Future<Output = Result<O>>,
    {
        hash_join(
            self.first,
            self.second,
            self.first_key,
            self.second_key,
            self.equality,
            self.cancel,
            AsyncFn(first),
            Some(AsyncFn(second)),
            AsyncFn(both),
        )
    }
}

/// Hash join driver.
///
/// `index_only` being `Some` turns a LEFT join into a FULL join.
#[allow(clippy::too_many_arguments)]
fn hash_join<SP, SI, P, I, K, KP, KI, E, PP, PI, PB, O>(
    probe: SP,
    index: SI,
    probe_key: KP,
    index_key: KI,
    equality: E,
    cancel: Option<CancellationToken>,
    probe_only: PP,
    index_only: Option<PI>,
    both: PB,
) -> impl Stream<Item = Result<O>>
where
    SP: Stream<Item = Result<P>>,
    SI: Stream<Item = Result<I>>,
    P: Clone,
    I: Clone,
    KP: KeySelector<P, K>,
    KI: KeySelector<I, K>,
    E: KeyEquality<K>,
    PP: Projection<P, O>,
    PI: Projection<I, O>,
    PB: Projection2<P, I, O>,
{
    try_stream! {
        let mut index_cursor = Cursor::new(index, cancel.as_ref());
        let index = KeyIndex::build(&mut index_cursor, &index_key, equality).await?;

        let mut tracker = index_only
            .as_ref()
            .map(|_| MatchTracker::new(index.num_groups()));

        let mut probe_cursor = Cursor::new(probe, cancel.as_ref());
        while let Some((key, item)) = probe_cursor.advance_keyed(&probe_key).await? {
            match index.find_group(&key) {
                Some(group_idx) => {
                    if let Some(tracker) = tracker.as_mut() {
                        tracker.set_match(group_idx);
                    }
                    for other in index.group_rows(group_idx) {
                        yield both.project(item.clone(), other.clone()).await?;
                    }
                }
                None => {
                    yield probe_only.project(item).await?;
                }
            }
        }

        if let (Some(index_only), Some(tracker)) = (index_only, tracker) {
            trace!(
                unmatched_groups = tracker.num_unmatched(),
                "emitting unmatched index rows"
            );
            for (group_idx, other) in index.into_rows() {
                if !tracker.is_matched(group_idx) {
                    yield index_only.project(other).await?;
                }
            }
        }
    }
}
