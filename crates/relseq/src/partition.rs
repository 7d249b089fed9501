//! Single pass partitioning and splitting.

use async_stream::try_stream;
use futures::Stream;
use relseq_error::{RelSeqError, Result};

use crate::cursor::Cursor;

/// Split a sequence into elements matching `predicate` and the rest.
///
/// Relative order is preserved within both halves.
pub async fn partition<S, T, F>(stream: S, mut predicate: F) -> Result<(Vec<T>, Vec<T>)>
where
    S: Stream<Item = Result<T>>,
    F: FnMut(&T) -> bool,
{
    let mut cursor = Cursor::new(stream, None);
    let mut matched = Vec::new();
    let mut unmatched = Vec::new();

    while let Some(item) = cursor.advance().await? {
        if predicate(&item) {
            matched.push(item);
        } else {
            unmatched.push(item);
        }
    }

    Ok((matched, unmatched))
}

/// Split a sequence into segments delimited by separator elements.
///
/// Separators are dropped. Consecutive separators produce empty segments,
/// but a trailing empty segment isn't emitted.
pub fn split<S, T, F>(stream: S, is_separator: F) -> impl Stream<Item = Result<Vec<T>>>
where
    S: Stream<Item = Result<T>>,
    F: FnMut(&T) -> bool,
{
    split_segments(stream, is_separator, usize::MAX)
}

/// Like `split`, but only the first `count` separators split the sequence.
/// Later separators are kept as ordinary elements.
///
/// Errors immediately if `count` is zero.
pub fn split_at_most<S, T, F>(
    stream: S,
    is_separator: F,
    count: usize,
) -> Result<impl Stream<Item = Result<Vec<T>>>>
where
    S: Stream<Item = Result<T>>,
    F: FnMut(&T) -> bool,
{
    if count == 0 {
        return Err(RelSeqError::invalid_argument(
            "count",
            "must be greater than zero",
        ));
    }
    Ok(split_segments(stream, is_separator, count))
}

fn split_segments<S, T, F>(
    stream: S,
    mut is_separator: F,
    mut remaining: usize,
) -> impl Stream<Item = Result<Vec<T>>>
where
    S: Stream<Item = Result<T>>,
    F: FnMut(&T) -> bool,
{
    try_stream! {
        let mut cursor = Cursor::new(stream, None);
        let mut segment = Vec::new();

        while let Some(item) = cursor.advance().await? {
            if remaining > 0 && is_separator(&item) {
                remaining -= 1;
                yield std::mem::take(&mut segment);
            } else {
                segment.push(item);
            }
        }

        if !segment.is_empty() {
            yield segment;
        }
    }
}

#[cfg(test)]
mod tests {
    use futures::TryStreamExt;

    use super::*;
    use crate::source;

    #[tokio::test]
    async fn partition_even_odd() {
        let (even, odd) = partition(source::from_iter(1..=7), |x| x % 2 == 0)
            .await
            .unwrap();
        assert_eq!(vec![2, 4, 6], even);
        assert_eq!(vec![1, 3, 5, 7], odd);
    }

    #[tokio::test]
    async fn partition_error() {
        let src = source::from_results([Ok(1), Err(RelSeqError::upstream("nope"))]);
        assert!(partition(src, |_| true).await.is_err());
    }

    #[tokio::test]
    async fn split_on_zero() {
        let out: Vec<_> = split(source::from_iter([1, 2, 0, 3, 0, 0, 4, 0]), |x| *x == 0)
            .try_collect()
            .await
            .unwrap();

        assert_eq!(vec![vec![1, 2], vec![3], vec![], vec![4]], out);
    }

    #[tokio::test]
    async fn split_limited() {
        let out: Vec<_> = split_at_most(source::from_iter("a,b,c,d".chars()), |c| *c == ',', 2)
            .unwrap()
            .try_collect()
            .await
            .unwrap();

        assert_eq!(vec![vec!['a'], vec!['b'], vec!['c', ',', 'd']], out);
    }

    #[test]
    fn split_zero_count_rejected() {
        let res = split_at_most(source::from_iter([1]), |_| true, 0);
        match res {
            Err(RelSeqError::InvalidArgument { name, .. }) => assert_eq!("count", name),
            Err(other) => panic!("unexpected error: {other}"),
            Ok(_) => panic!("expected error"),
        }
    }
}
