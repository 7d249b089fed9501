//! Adapters unifying direct and suspending user functions.
//!
//! The join and merge drivers are written once against these traits and
//! always await the returned future. Direct functions are wrapped into
//! already-completed futures, suspending functions are awaited as is.

use std::future::Future;
use std::marker::PhantomData;

use futures::future::{Ready, ready};
use relseq_error::Result;

/// Produces the key of an element.
pub trait KeySelector<T, K> {
    type Future: Future<Output = Result<K>>;

    fn select_key(&self, item: &T) -> Self::Future;
}

/// Projects a single element into an output element.
pub trait Projection<A, O> {
    type Future: Future<Output = Result<O>>;

    fn project(&self, a: A) -> Self::Future;
}

/// Projects a matched pair into an output element.
pub trait Projection2<A, B, O> {
    type Future: Future<Output = Result<O>>;

    fn project(&self, a: A, b: B) -> Self::Future;
}

/// Key selector backed by a direct function.
#[derive(Debug, Clone, Copy)]
pub struct SyncKey<F>(F);

impl<F> SyncKey<F> {
    pub const fn new(f: F) -> Self {
        SyncKey(f)
    }
}

impl<T, K, F> KeySelector<T, K> for SyncKey<F>
where
    F: Fn(&T) -> K,
{
    type Future = Ready<Result<K>>;

    fn select_key(&self, item: &T) -> Self::Future {
        ready(Ok((self.0)(item)))
    }
}

/// Key selector backed by a suspending, fallible function.
///
/// The returned future must not borrow the element; clone whatever the key
/// computation needs before suspending.
pub struct AsyncKey<F, Fut> {
    f: F,
    _fut: PhantomData<fn() -> Fut>,
}

impl<F, Fut> AsyncKey<F, Fut> {
    pub const fn new(f: F) -> Self {
        AsyncKey {
            f,
            _fut: PhantomData,
        }
    }
}

impl<F: Clone, Fut> Clone for AsyncKey<F, Fut> {
    fn clone(&self) -> Self {
        AsyncKey::new(self.f.clone())
    }
}

impl<F, Fut> std::fmt::Debug for AsyncKey<F, Fut> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AsyncKey").finish_non_exhaustive()
    }
}

impl<T, K, F, Fut> KeySelector<T, K> for AsyncKey<F, Fut>
where
    F: Fn(&T) -> Fut,
    Fut: Future<Output = Result<K>>,
{
    type Future = Fut;

    fn select_key(&self, item: &T) -> Self::Future {
        (self.f)(item)
    }
}

/// Projection backed by a direct function.
#[derive(Debug, Clone, Copy)]
pub struct SyncFn<F>(pub F);

impl<A, O, F> Projection<A, O> for SyncFn<F>
where
    F: Fn(A) -> O,
{
    type Future = Ready<Result<O>>;

    fn project(&self, a: A) -> Self::Future {
        ready(Ok((self.0)(a)))
    }
}

impl<A, B, O, F> Projection2<A, B, O> for SyncFn<F>
where
    F: Fn(A, B) -> O,
{
    type Future = Ready<Result<O>>;

    fn project(&self, a: A, b: B) -> Self::Future {
        ready(Ok((self.0)(a, b)))
    }
}

/// Projection backed by a suspending, fallible function.
#[derive(Debug, Clone, Copy)]
pub struct AsyncFn<F>(pub F);

impl<A, O, F, Fut> Projection<A, O> for AsyncFn<F>
where
    F: Fn(A) -> Fut,
    Fut: Future<Output = Result<O>>,
{
    type Future = Fut;

    fn project(&self, a: A) -> Self::Future {
        (self.0)(a)
    }
}

impl<A, B, O, F, Fut> Projection2<A, B, O> for AsyncFn<F>
where
    F: Fn(A, B) -> Fut,
    Fut: Future<Output = Result<O>>,
{
    type Future = Fut;

    fn project(&self, a: A, b: B) -> Self::Future {
        (self.0)(a, b)
    }
}

/// Flips the argument order of a pair projection.
///
/// Lets a right join run as a left join with the inputs exchanged while user
/// code still sees `(first, second)`.
#[derive(Debug, Clone, Copy)]
pub struct Swapped<P>(pub P);

impl<A, B, O, P> Projection2<A, B, O> for Swapped<P>
where
    P: Projection2<B, A, O>,
{
    type Future = P::Future;

    fn project(&self, a: A, b: B) -> Self::Future {
        self.0.project(b, a)
    }
}

#[cfg(test)]
mod tests {
    use futures::executor::block_on;

    use super::*;

    #[test]
    fn sync_and_async_keys() {
        let sync = SyncKey::new(|v: &(i32, &str)| v.0);
        let suspending = AsyncKey::new(|v: &(i32, &str)| {
            let key = v.1.to_string();
            async move { Ok(key) }
        });

        block_on(async {
            assert_eq!(4, sync.select_key(&(4, "x")).await.unwrap());
            assert_eq!("x", suspending.select_key(&(4, "x")).await.unwrap());
        });
    }

    #[test]
    fn swapped_projection() {
        let pair = SyncFn(|a: i32, b: &str| format!("{a}{b}"));
        let swapped = Swapped(pair);

        block_on(async {
            assert_eq!("1x", Projection2::project(&swapped, "x", 1).await.unwrap());
        });
    }

    #[test]
    fn async_projection_error() {
        let failing = AsyncFn(|a: i32| async move {
            if a < 0 {
                Err(relseq_error::RelSeqError::upstream("negative"))
            } else {
                Ok(a * 2)
            }
        });

        block_on(async {
            assert_eq!(4, Projection::project(&failing, 2).await.unwrap());
            assert!(Projection::project(&failing, -1).await.is_err());
        });
    }
}
