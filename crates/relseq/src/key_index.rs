use futures::Stream;
use hashbrown::raw::RawTable;
use relseq_error::Result;
use tracing::trace;

use crate::comparer::KeyEquality;
use crate::cursor::Cursor;
use crate::selector::KeySelector;

/// All elements from one input sharing a key.
#[derive(Debug)]
struct KeyGroup<K> {
    key: K,
    /// Indices into `KeyIndex::rows`, in arrival order.
    rows: Vec<usize>,
}

/// Keyed multi-map built from one fully drained input.
///
/// Building the index materializes the entire input in memory. This O(n)
/// space cost is unavoidable when hash joining two unordered sequences: at
/// least one side has to be buffered before the other can be streamed
/// against it.
///
/// Alongside the groups, every element is kept in its original arrival
/// order so unmatched elements can be emitted afterwards without a second
/// pass over the input.
pub struct KeyIndex<K, T, E> {
    /// Hash table pointing to a group.
    table: RawTable<(u64, usize)>,
    groups: Vec<KeyGroup<K>>,
    /// (group index, element) in arrival order.
    rows: Vec<(usize, T)>,
    equality: E,
}

impl<K, T, E> std::fmt::Debug for KeyIndex<K, T, E> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("KeyIndex")
            .field("groups", &self.groups.len())
            .field("rows", &self.rows.len())
            .finish_non_exhaustive()
    }
}

impl<K, T, E> KeyIndex<K, T, E>
where
    E: KeyEquality<K>,
{
    pub fn new(equality: E) -> Self {
        KeyIndex {
            table: RawTable::new(),
            groups: Vec::new(),
            rows: Vec::new(),
            equality,
        }
    }

    /// Drain the cursor to completion, indexing every element by its key.
    ///
    /// Any error from the sequence or the key selector aborts the build.
    pub async fn build<S, KS>(cursor: &mut Cursor<S>, selector: &KS, equality: E) -> Result<Self>
    where
        S: Stream<Item = Result<T>>,
        KS: KeySelector<T, K>,
    {
        let mut index = Self::new(equality);
        while let Some((key, item)) = cursor.advance_keyed(selector).await? {
            index.insert(key, item);
        }

        trace!(
            rows = index.num_rows(),
            groups = index.num_groups(),
            "built key index"
        );

        Ok(index)
    }

    pub fn insert(&mut self, key: K, item: T) {
        let hash = self.equality.hash_key(&key);
        let row_idx = self.rows.len();

        let group_idx = match self.find_with_hash(hash, &key) {
            Some(group_idx) => {
                self.groups[group_idx].rows.push(row_idx);
                group_idx
            }
            None => {
                let group_idx = self.groups.len();
                self.groups.push(KeyGroup {
                    key,
                    rows: vec![row_idx],
                });
                self.table
                    .insert(hash, (hash, group_idx), |(hash, _)| *hash);
                group_idx
            }
        };

        self.rows.push((group_idx, item));
    }

    /// Find the group for a key, if any element had that key.
    pub fn find_group(&self, key: &K) -> Option<usize> {
        self.find_with_hash(self.equality.hash_key(key), key)
    }

    fn find_with_hash(&self, hash: u64, key: &K) -> Option<usize> {
        self.table
            .get(hash, |(row_hash, group_idx)| {
                *row_hash == hash
                    && self
                        .equality
                        .keys_equal(&self.groups[*group_idx].key, key)
            })
            .map(|(_, group_idx)| *group_idx)
    }

    /// Iterate the elements of a group in arrival order.
    ///
    /// Panics if the group index didn't come from `find_group` on this index.
    pub fn group_rows(&self, group_idx: usize) -> impl Iterator<Item = &T> + '_ {
        self.groups[group_idx]
            .rows
            .iter()
            .map(|&row_idx| &self.rows[row_idx].1)
    }

    pub fn num_rows(&self) -> usize {
        self.rows.len()
    }

    pub fn num_groups(&self) -> usize {
        self.groups.len()
    }

    /// Consume the index, returning (group index, element) pairs in arrival
    /// order.
    pub fn into_rows(self) -> impl Iterator<Item = (usize, T)> {
        self.rows.into_iter()
    }
}

/// Tracks which groups of a key index were matched during probing.
///
/// Matching is all-or-nothing per group: a lookup resolves a key to the whole
/// group, so tracking groups rather than individual rows is sufficient.
#[derive(Debug)]
pub struct MatchTracker {
    matches: Vec<bool>,
}

impl MatchTracker {
    pub fn new(num_groups: usize) -> Self {
        MatchTracker {
            matches: vec![false; num_groups],
        }
    }

    pub fn set_match(&mut self, group_idx: usize) {
        self.matches[group_idx] = true;
    }

    pub fn is_matched(&self, group_idx: usize) -> bool {
        self.matches[group_idx]
    }

    pub fn num_unmatched(&self) -> usize {
        self.matches.iter().filter(|m| !**m).count()
    }
}
