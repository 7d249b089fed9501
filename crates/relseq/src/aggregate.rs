//! Terminal reductions over a sequence.

use std::fmt::{Display, Write as _};

use futures::Stream;
use relseq_error::{RelSeqError, Result, invalid_operation};

use crate::cursor::Cursor;

/// Apply two accumulators in a single pass, then combine both results.
///
/// Each accumulator is a `(seed, step)` pair.
pub async fn aggregate<S, T, A, B, FA, FB, O, FR>(
    stream: S,
    (seed_a, mut step_a): (A, FA),
    (seed_b, mut step_b): (B, FB),
    result: FR,
) -> Result<O>
where
    S: Stream<Item = Result<T>>,
    FA: FnMut(A, &T) -> A,
    FB: FnMut(B, &T) -> B,
    FR: FnOnce(A, B) -> O,
{
    let mut cursor = Cursor::new(stream, None);
    let mut acc_a = seed_a;
    let mut acc_b = seed_b;

    while let Some(item) = cursor.advance().await? {
        acc_a = step_a(acc_a, &item);
        acc_b = step_b(acc_b, &item);
    }

    Ok(result(acc_a, acc_b))
}

/// Fold a sequence that must contain exactly `N` elements.
///
/// Fails as soon as an element past `N` is observed, without pulling the rest
/// of the sequence.
pub async fn fold_exact<const N: usize, S, T, O, F>(stream: S, folder: F) -> Result<O>
where
    S: Stream<Item = Result<T>>,
    F: FnOnce([T; N]) -> O,
{
    let mut cursor = Cursor::new(stream, None);
    let mut items = Vec::with_capacity(N);

    while let Some(item) = cursor.advance().await? {
        if items.len() == N {
            return Err(invalid_operation!(
                "Sequence contains more than {N} elements"
            ));
        }
        items.push(item);
    }

    let count = items.len();
    let items: [T; N] = items.try_into().map_err(|_| {
        invalid_operation!("Sequence contains {count} elements, expected exactly {N}")
    })?;

    Ok(folder(items))
}

/// Concatenate the display form of every element, separated by `delimiter`.
pub async fn to_delimited_string<S, T>(stream: S, delimiter: &str) -> Result<String>
where
    S: Stream<Item = Result<T>>,
    T: Display,
{
    let mut cursor = Cursor::new(stream, None);
    let mut out = String::new();
    let mut first = true;

    while let Some(item) = cursor.advance().await? {
        if !first {
            out.push_str(delimiter);
        }
        first = false;
        write!(out, "{item}").map_err(|e| RelSeqError::upstream(e.to_string()))?;
    }

    Ok(out)
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;
    use std::sync::atomic::{AtomicUsize, Ordering};

    use futures::StreamExt;

    use super::*;
    use crate::source;

    #[tokio::test]
    async fn min_and_max_single_pass() {
        let (min, max) = aggregate(
            source::from_iter([3, 9, 1, 4]),
            (i32::MAX, |acc: i32, x: &i32| acc.min(*x)),
            (i32::MIN, |acc: i32, x: &i32| acc.max(*x)),
            |min, max| (min, max),
        )
        .await
        .unwrap();

        assert_eq!((1, 9), (min, max));
    }

    #[tokio::test]
    async fn aggregate_empty_returns_seeds() {
        let out = aggregate(
            source::from_iter(Vec::<i32>::new()),
            (0, |acc: i32, x: &i32| acc + x),
            (1, |acc: i32, x: &i32| acc * x),
            |sum, product| sum + product,
        )
        .await
        .unwrap();

        assert_eq!(1, out);
    }

    #[tokio::test]
    async fn fold_exact_three() {
        let out = fold_exact::<3, _, _, _, _>(source::from_iter([1, 2, 3]), |[a, b, c]| {
            a * 100 + b * 10 + c
        })
        .await
        .unwrap();

        assert_eq!(123, out);
    }

    #[tokio::test]
    async fn fold_exact_too_few() {
        let err = fold_exact::<3, _, _, _, _>(source::from_iter([1, 2]), |[a, b, c]| a + b + c)
            .await
            .unwrap_err();

        assert!(matches!(err, RelSeqError::InvalidOperation(_)), "{err}");
    }

    #[tokio::test]
    async fn fold_exact_too_many_stops_early() {
        let pulls = Arc::new(AtomicUsize::new(0));
        let counter = pulls.clone();
        let src = source::from_iter(1..=10).inspect(move |_| {
            counter.fetch_add(1, Ordering::SeqCst);
        });

        let err = fold_exact::<2, _, _, _, _>(src, |[a, b]| a + b)
            .await
            .unwrap_err();

        assert!(matches!(err, RelSeqError::InvalidOperation(_)), "{err}");
        assert_eq!(3, pulls.load(Ordering::SeqCst));
    }

    #[tokio::test]
    async fn delimited() {
        let s = to_delimited_string(source::from_iter([1, 2, 3]), ", ")
            .await
            .unwrap();
        assert_eq!("1, 2, 3", s);

        let s = to_delimited_string(source::from_iter(Vec::<u8>::new()), "|")
            .await
            .unwrap();
        assert_eq!("", s);
    }
}
