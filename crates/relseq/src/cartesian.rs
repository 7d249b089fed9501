use async_stream::try_stream;
use futures::Stream;
use relseq_error::Result;

use crate::cursor::Cursor;
use crate::memoize::memoize;

/// Cartesian product of two sequences.
///
/// For each element of `first` in order, every element of `second` in order.
/// `second` is memoized so it's only pulled once regardless of the size of
/// `first`.
pub fn cartesian<SL, SR, L, R, O, F>(first: SL, second: SR, selector: F) -> impl Stream<Item = Result<O>>
where
    SL: Stream<Item = Result<L>>,
    SR: Stream<Item = Result<R>>,
    L: Clone,
    R: Clone,
    F: Fn(L, R) -> O,
{
    try_stream! {
        let second = memoize(second);
        let mut first_cursor = Cursor::new(first, None);

        while let Some(left) = first_cursor.advance().await? {
            let mut second_cursor = Cursor::new(second.stream(), None);
            while let Some(right) = second_cursor.advance().await? {
                yield selector(left.clone(), right);
            }
        }
    }
}
