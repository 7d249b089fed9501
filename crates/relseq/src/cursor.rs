use std::future::Future;
use std::pin::Pin;
use std::task::{Context, Poll};

use futures::Stream;
use futures::future::poll_fn;
use relseq_error::{RelSeqError, Result};
use tokio_util::sync::{CancellationToken, WaitForCancellationFutureOwned};
use tracing::trace;

use crate::selector::KeySelector;

/// Pull position over a single input sequence.
///
/// Each call to `advance` is a suspension point. At most one pull is ever
/// outstanding per cursor since advancing requires a mutable borrow.
///
/// If a cancellation token is attached, it's checked on every advance,
/// including while the underlying stream is pending. Once cancellation is
/// observed the cursor yields a single `Cancelled` error and is exhausted from
/// then on.
pub struct Cursor<S> {
    stream: Pin<Box<S>>,
    cancelled: Option<Pin<Box<WaitForCancellationFutureOwned>>>,
    /// Set once the stream returned `None`, errored, or was cancelled. The
    /// stream is never polled again after this.
    exhausted: bool,
}

impl<S> std::fmt::Debug for Cursor<S> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Cursor")
            .field("cancellable", &self.cancelled.is_some())
            .field("exhausted", &self.exhausted)
            .finish_non_exhaustive()
    }
}

impl<S, T> Cursor<S>
where
    S: Stream<Item = Result<T>>,
{
    pub fn new(stream: S, token: Option<&CancellationToken>) -> Self {
        Cursor {
            stream: Box::pin(stream),
            cancelled: token.map(|token| Box::pin(token.clone().cancelled_owned())),
            exhausted: false,
        }
    }

    pub fn is_exhausted(&self) -> bool {
        self.exhausted
    }

    pub fn poll_advance(&mut self, cx: &mut Context<'_>) -> Poll<Result<Option<T>>> {
        if self.exhausted {
            return Poll::Ready(Ok(None));
        }

        // Poll cancellation first so that we register interest before
        // potentially going pending on the stream.
        if let Some(cancelled) = self.cancelled.as_mut() {
            if cancelled.as_mut().poll(cx).is_ready() {
                trace!("cursor observed cancellation");
                self.exhausted = true;
                return Poll::Ready(Err(RelSeqError::Cancelled));
            }
        }

        match self.stream.as_mut().poll_next(cx) {
            Poll::Ready(Some(Ok(item))) => Poll::Ready(Ok(Some(item))),
            Poll::Ready(Some(Err(e))) => {
                self.exhausted = true;
                Poll::Ready(Err(e))
            }
            Poll::Ready(None) => {
                self.exhausted = true;
                Poll::Ready(Ok(None))
            }
            Poll::Pending => Poll::Pending,
        }
    }

    /// Produce the next element, or `None` once the sequence is exhausted.
    pub async fn advance(&mut self) -> Result<Option<T>> {
        poll_fn(|cx| self.poll_advance(cx)).await
    }

    /// Produce the next element along with its key.
    pub async fn advance_keyed<K, KS>(&mut self, selector: &KS) -> Result<Option<(K, T)>>
    where
        KS: KeySelector<T, K>,
    {
        match self.advance().await? {
            Some(item) => {
                let key = selector.select_key(&item).await?;
                Ok(Some((key, item)))
            }
            None => Ok(None),
        }
    }
}

#[cfg(test)]
mod tests {
    use futures::StreamExt;
    use futures::executor::block_on;
    use futures::task::noop_waker_ref;

    use super::*;
    use crate::selector::SyncKey;
    use crate::source;

    #[test]
    fn advance_until_exhausted() {
        let mut cursor = Cursor::new(source::from_iter([1, 2]), None);

        block_on(async {
            assert_eq!(Some(1), cursor.advance().await.unwrap());
            assert_eq!(Some(2), cursor.advance().await.unwrap());
            assert_eq!(None, cursor.advance().await.unwrap());
            assert!(cursor.is_exhausted());
            // Stays exhausted.
            assert_eq!(None, cursor.advance().await.unwrap());
        });
    }

    #[test]
    fn advance_keyed() {
        let mut cursor = Cursor::new(source::from_iter(["a", "bb"]), None);
        let selector = SyncKey::new(|s: &&str| s.len());

        block_on(async {
            assert_eq!(
                Some((1, "a")),
                cursor.advance_keyed(&selector).await.unwrap()
            );
            assert_eq!(
                Some((2, "bb")),
                cursor.advance_keyed(&selector).await.unwrap()
            );
            assert_eq!(None, cursor.advance_keyed(&selector).await.unwrap());
        });
    }

    #[test]
    fn error_exhausts_cursor() {
        let stream = source::from_results([Ok(1), Err(RelSeqError::upstream("boom")), Ok(3)]);
        let mut cursor = Cursor::new(stream, None);

        block_on(async {
            assert_eq!(Some(1), cursor.advance().await.unwrap());
            let err = cursor.advance().await.unwrap_err();
            assert_eq!("boom", err.to_string());
            assert_eq!(None, cursor.advance().await.unwrap());
        });
    }

    #[test]
    fn cancelled_before_first_pull() {
        let token = CancellationToken::new();
        token.cancel();
        let mut cursor = Cursor::new(source::from_iter([1, 2, 3]), Some(&token));

        block_on(async {
            assert!(cursor.advance().await.unwrap_err().is_cancelled());
            assert_eq!(None, cursor.advance().await.unwrap());
        });
    }

    #[test]
    fn cancel_while_pending() {
        let token = CancellationToken::new();
        let pending = futures::stream::pending::<Result<i32>>();
        let mut cursor = Cursor::new(pending, Some(&token));
        let mut cx = Context::from_waker(noop_waker_ref());

        assert!(cursor.poll_advance(&mut cx).is_pending());
        assert!(cursor.poll_advance(&mut cx).is_pending());

        token.cancel();
        match cursor.poll_advance(&mut cx) {
            Poll::Ready(Err(e)) => assert!(e.is_cancelled()),
            other => panic!("unexpected poll result: {other:?}"),
        }
    }

    #[test]
    fn cancel_after_some_items() {
        let token = CancellationToken::new();
        let mut cursor = Cursor::new(source::from_iter(0..10).boxed(), Some(&token));

        block_on(async {
            assert_eq!(Some(0), cursor.advance().await.unwrap());
            assert_eq!(Some(1), cursor.advance().await.unwrap());
            token.cancel();
            assert!(cursor.advance().await.unwrap_err().is_cancelled());
        });
    }
}
