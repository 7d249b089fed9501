//! Replay cache allowing a single-pass sequence to be iterated many times.

use std::pin::Pin;
use std::sync::Arc;
use std::task::{Context, Poll, Waker};

use futures::Stream;
use parking_lot::Mutex;
use relseq_error::{RelSeqError, Result};
use tracing::trace;

/// Cloneable handle over a memoized sequence.
///
/// Each call to `stream` returns a new replay. Replays yield cached elements
/// first and only pull the source once they run past the end of the cache, so
/// every source element is produced at most once no matter how many replays
/// exist. A source error is cached too and replayed at the same position.
///
/// Replays may be interleaved, including across tasks. Every replay waiting
/// on a pending source is woken once the source makes progress.
pub struct Memoized<S, T> {
    state: Arc<Mutex<MemoState<S, T>>>,
}

struct MemoState<S, T> {
    /// Set to None once the source completed or failed.
    source: Option<Pin<Box<S>>>,
    cache: Vec<T>,
    error: Option<RelSeqError>,
    /// Replays parked on a pending source, keyed by replay id.
    waiting: Vec<(usize, Waker)>,
    /// Replay whose waker the source currently holds.
    last_poller: Option<usize>,
    next_id: usize,
}

impl<S, T> MemoState<S, T> {
    fn park(&mut self, id: usize, waker: &Waker) {
        match self.waiting.iter_mut().find(|(waiting_id, _)| *waiting_id == id) {
            Some((_, existing)) => existing.clone_from(waker),
            None => self.waiting.push((id, waker.clone())),
        }
    }

    fn wake_waiting(&mut self) {
        for (_, waker) in self.waiting.drain(..) {
            waker.wake();
        }
    }
}

impl<S, T> Clone for Memoized<S, T> {
    fn clone(&self) -> Self {
        Memoized {
            state: self.state.clone(),
        }
    }
}

impl<S, T> std::fmt::Debug for Memoized<S, T> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let state = self.state.lock();
        f.debug_struct("Memoized")
            .field("cached", &state.cache.len())
            .field("source_done", &state.source.is_none())
            .field("failed", &state.error.is_some())
            .finish()
    }
}

/// Wrap a sequence so it can be replayed. Nothing is pulled until a replay is
/// polled.
pub fn memoize<S, T>(source: S) -> Memoized<S, T>
where
    S: Stream<Item = Result<T>>,
{
    Memoized {
        state: Arc::new(Mutex::new(MemoState {
            source: Some(Box::pin(source)),
            cache: Vec::new(),
            error: None,
            waiting: Vec::new(),
            last_poller: None,
            next_id: 0,
        })),
    }
}

impl<S, T> Memoized<S, T>
where
    S: Stream<Item = Result<T>>,
    T: Clone,
{
    pub fn stream(&self) -> MemoStream<S, T> {
        let id = {
            let mut state = self.state.lock();
            state.next_id += 1;
            state.next_id
        };
        MemoStream {
            state: self.state.clone(),
            id,
            pos: 0,
            done: false,
        }
    }

    /// Number of elements pulled from the source so far.
    pub fn num_cached(&self) -> usize {
        self.state.lock().cache.len()
    }
}

/// One replay over a memoized sequence.
pub struct MemoStream<S, T> {
    state: Arc<Mutex<MemoState<S, T>>>,
    id: usize,
    pos: usize,
    done: bool,
}

impl<S, T> Drop for MemoStream<S, T> {
    fn drop(&mut self) {
        let mut state = self.state.lock();
        state.waiting.retain(|(id, _)| *id != self.id);
        // The source only holds this replay's waker. Hand the pull over to
        // whoever is still waiting.
        if state.last_poller == Some(self.id) {
            state.last_poller = None;
            state.wake_waiting();
        }
    }
}

impl<S, T> std::fmt::Debug for MemoStream<S, T> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MemoStream")
            .field("id", &self.id)
            .field("pos", &self.pos)
            .field("done", &self.done)
            .finish_non_exhaustive()
    }
}

impl<S, T> Stream for MemoStream<S, T>
where
    S: Stream<Item = Result<T>>,
    T: Clone,
{
    type Item = Result<T>;

    fn poll_next(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<Self::Item>> {
        let this = self.get_mut();
        if this.done {
            return Poll::Ready(None);
        }

        let mut state = this.state.lock();

        if let Some(item) = state.cache.get(this.pos) {
            let item = item.clone();
            this.pos += 1;
            return Poll::Ready(Some(Ok(item)));
        }

        let source = match state.source.as_mut() {
            Some(source) => source,
            None => {
                // Source finished, replay its final error if it had one.
                this.done = true;
                return Poll::Ready(state.error.clone().map(Err));
            }
        };

        let polled = source.as_mut().poll_next(cx);
        state.last_poller = Some(this.id);
        if polled.is_ready() {
            state.wake_waiting();
        }

        match polled {
            Poll::Ready(Some(Ok(item))) => {
                state.cache.push(item.clone());
                this.pos += 1;
                Poll::Ready(Some(Ok(item)))
            }
            Poll::Ready(Some(Err(e))) => {
                state.source = None;
                state.error = Some(e.clone());
                this.done = true;
                Poll::Ready(Some(Err(e)))
            }
            Poll::Ready(None) => {
                trace!(cached = state.cache.len(), "memoized source exhausted");
                state.source = None;
                this.done = true;
                Poll::Ready(None)
            }
            Poll::Pending => {
                state.park(this.id, cx.waker());
                Poll::Pending
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::time::Duration;

    use futures::channel::mpsc::{UnboundedReceiver, unbounded};
    use futures::{StreamExt, TryStreamExt};
    use tokio::time::timeout;

    use super::*;
    use crate::source;

    #[tokio::test]
    async fn replays_without_repulling() {
        let pulls = Arc::new(AtomicUsize::new(0));
        let counter = pulls.clone();
        let src = source::from_iter([1, 2, 3]).inspect(move |_| {
            counter.fetch_add(1, Ordering::SeqCst);
        });

        let memo = memoize(src);
        let a: Vec<_> = memo.stream().try_collect().await.unwrap();
        let b: Vec<_> = memo.stream().try_collect().await.unwrap();

        assert_eq!(vec![1, 2, 3], a);
        assert_eq!(a, b);
        assert_eq!(3, pulls.load(Ordering::SeqCst));
        assert_eq!(3, memo.num_cached());
    }

    #[tokio::test]
    async fn interleaved_replays() {
        let memo = memoize(source::from_iter(["a", "b"]));
        let mut r1 = memo.stream();
        let mut r2 = memo.clone().stream();

        assert_eq!("a", r1.next().await.unwrap().unwrap());
        assert_eq!("a", r2.next().await.unwrap().unwrap());
        assert_eq!("b", r2.next().await.unwrap().unwrap());
        assert_eq!("b", r1.next().await.unwrap().unwrap());
        assert!(r1.next().await.is_none());
        assert!(r2.next().await.is_none());
    }

    #[tokio::test]
    async fn nothing_pulled_until_polled() {
        let memo = memoize(source::from_iter([1]));
        let _replay = memo.stream();
        assert_eq!(0, memo.num_cached());
    }

    async fn next_value(mut replay: MemoStream<UnboundedReceiver<Result<i32>>, i32>) -> Option<i32> {
        replay.next().await.map(|r| r.unwrap())
    }

    #[tokio::test]
    async fn every_parked_replay_is_woken() {
        let (tx, rx) = unbounded::<Result<i32>>();
        let memo = memoize(rx);

        let task_a = tokio::spawn(next_value(memo.stream()));
        let task_b = tokio::spawn(next_value(memo.stream()));

        // Both replays park on the empty channel.
        for _ in 0..10 {
            tokio::task::yield_now().await;
        }
        tx.unbounded_send(Ok(7)).unwrap();

        let a = timeout(Duration::from_secs(5), task_a).await.unwrap().unwrap();
        let b = timeout(Duration::from_secs(5), task_b).await.unwrap().unwrap();
        assert_eq!(Some(7), a);
        assert_eq!(Some(7), b);
        assert_eq!(1, memo.num_cached());
    }

    #[tokio::test]
    async fn dropped_replay_hands_over_pull() {
        let (tx, rx) = unbounded::<Result<i32>>();
        let memo = memoize(rx);

        let task_a = tokio::spawn(next_value(memo.stream()));
        for _ in 0..10 {
            tokio::task::yield_now().await;
        }

        // The source now only holds the waker of `b`.
        let mut b = memo.stream();
        assert!(futures::poll!(b.next()).is_pending());
        drop(b);

        tx.unbounded_send(Ok(3)).unwrap();
        let a = timeout(Duration::from_secs(5), task_a).await.unwrap().unwrap();
        assert_eq!(Some(3), a);
    }

    #[tokio::test]
    async fn error_replayed_at_same_position() {
        let memo = memoize(source::from_results([
            Ok(1),
            Err(RelSeqError::upstream("flaky")),
            Ok(3),
        ]));

        for _ in 0..2 {
            let out: Vec<Result<i32>> = memo.stream().collect().await;
            assert_eq!(2, out.len());
            assert_eq!(1, *out[0].as_ref().unwrap());
            assert_eq!("flaky", out[1].as_ref().unwrap_err().to_string());
        }
    }
}
