use serde::de::{self, Deserializer, IgnoredAny, MapAccess, SeqAccess, Visitor};
use serde::ser::{SerializeMap, Serializer};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;

/// Pairwise similarity scores, either as a full matrix or keyed by item index.
#[derive(Debug, Clone, PartialEq)]
pub enum SimilarityTable {
    Dense(Vec<Vec<f32>>),
    Sparse(BTreeMap<usize, SparseRow>),
}

#[derive(Debug, Clone, PartialEq)]
pub enum SparseRow {
    /// Positional scores: entry `j` is the similarity to item `j`.
    Scores(Vec<f32>),
    /// Explicit `(candidate, score)` pairs. An empty row decodes as this variant.
    Pairs(Vec<(usize, f32)>),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SimilarityLayout {
    Dense,
    Sparse,
}

impl SimilarityLayout {
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Dense => "dense",
            Self::Sparse => "sparse",
        }
    }
}

impl fmt::Display for SimilarityLayout {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Borrowed view of one row, independent of storage layout.
#[derive(Debug, Clone, Copy)]
pub enum Row<'a> {
    Positional(&'a [f32]),
    Pairs(&'a [(usize, f32)]),
}

impl<'a> Row<'a> {
    #[must_use]
    pub const fn len(&self) -> usize {
        match self {
            Self::Positional(scores) => scores.len(),
            Self::Pairs(pairs) => pairs.len(),
        }
    }

    #[must_use]
    pub const fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Yields `(candidate_index, score)`.
    #[must_use]
    pub fn iter(&self) -> RowIter<'a> {
        match *self {
            Self::Positional(scores) => RowIter::Positional(scores.iter().enumerate()),
            Self::Pairs(pairs) => RowIter::Pairs(pairs.iter()),
        }
    }
}

pub enum RowIter<'a> {
    Positional(std::iter::Enumerate<std::slice::Iter<'a, f32>>),
    Pairs(std::slice::Iter<'a, (usize, f32)>),
}

impl Iterator for RowIter<'_> {
    type Item = (usize, f32);

    fn next(&mut self) -> Option<Self::Item> {
        match self {
            Self::Positional(iter) => iter.next().map(|(idx, score)| (idx, *score)),
            Self::Pairs(iter) => iter.next().copied(),
        }
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        match self {
            Self::Positional(iter) => iter.size_hint(),
            Self::Pairs(iter) => iter.size_hint(),
        }
    }
}

impl SimilarityTable {
    #[must_use]
    pub const fn layout(&self) -> SimilarityLayout {
        match self {
            Self::Dense(_) => SimilarityLayout::Dense,
            Self::Sparse(_) => SimilarityLayout::Sparse,
        }
    }

    /// Number of rows physically present.
    #[must_use]
    pub fn row_count(&self) -> usize {
        match self {
            Self::Dense(rows) => rows.len(),
            Self::Sparse(rows) => rows.len(),
        }
    }

    #[must_use]
    pub fn row_for(&self, index: usize) -> Option<Row<'_>> {
        match self {
            Self::Dense(rows) => rows.get(index).map(|row| Row::Positional(row)),
            Self::Sparse(rows) => rows.get(&index).map(|row| match row {
                SparseRow::Scores(scores) => Row::Positional(scores),
                SparseRow::Pairs(pairs) => Row::Pairs(pairs),
            }),
        }
    }

    pub fn row_indices(&self) -> Box<dyn Iterator<Item = usize> + '_> {
        match self {
            Self::Dense(rows) => Box::new(0..rows.len()),
            Self::Sparse(rows) => Box::new(rows.keys().copied()),
        }
    }
}

// `null` scores (NaN after a dataframe export) are kept as NaN and rank last.
#[derive(Debug, Clone, Copy)]
struct Score(f32);

impl<'de> Deserialize<'de> for Score {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        Ok(Self(Option::<f32>::deserialize(deserializer)?.unwrap_or(f32::NAN)))
    }
}

struct ScoreRow(Vec<f32>);

impl<'de> Deserialize<'de> for ScoreRow {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        struct ScoreRowVisitor;

        impl<'de> Visitor<'de> for ScoreRowVisitor {
            type Value = ScoreRow;

            fn expecting(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                f.write_str("a row of scores")
            }

            fn visit_seq<A: SeqAccess<'de>>(self, mut seq: A) -> Result<Self::Value, A::Error> {
                let mut scores = Vec::with_capacity(seq.size_hint().unwrap_or(0));
                while let Some(Score(score)) = seq.next_element()? {
                    scores.push(score);
                }
                Ok(ScoreRow(scores))
            }
        }

        deserializer.deserialize_seq(ScoreRowVisitor)
    }
}

/// One element of a sparse row: a bare score or a `[candidate, score]` pair.
enum RowEntry {
    Score(f32),
    Pair(usize, f32),
}

impl<'de> Deserialize<'de> for RowEntry {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        struct RowEntryVisitor;

        impl<'de> Visitor<'de> for RowEntryVisitor {
            type Value = RowEntry;

            fn expecting(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                f.write_str("a score or a [candidate_index, score] pair")
            }

            fn visit_f64<E: de::Error>(self, value: f64) -> Result<Self::Value, E> {
                Ok(RowEntry::Score(value as f32))
            }

            fn visit_i64<E: de::Error>(self, value: i64) -> Result<Self::Value, E> {
                Ok(RowEntry::Score(value as f32))
            }

            fn visit_u64<E: de::Error>(self, value: u64) -> Result<Self::Value, E> {
                Ok(RowEntry::Score(value as f32))
            }

            fn visit_unit<E: de::Error>(self) -> Result<Self::Value, E> {
                Ok(RowEntry::Score(f32::NAN))
            }

            fn visit_none<E: de::Error>(self) -> Result<Self::Value, E> {
                Ok(RowEntry::Score(f32::NAN))
            }

            fn visit_seq<A: SeqAccess<'de>>(self, mut seq: A) -> Result<Self::Value, A::Error> {
                let candidate: usize = seq
                    .next_element()?
                    .ok_or_else(|| de::Error::invalid_length(0, &self))?;
                let Score(score) = seq
                    .next_element()?
                    .ok_or_else(|| de::Error::invalid_length(1, &self))?;
                if seq.next_element::<IgnoredAny>()?.is_some() {
                    return Err(de::Error::invalid_length(3, &self));
                }
                Ok(RowEntry::Pair(candidate, score))
            }
        }

        deserializer.deserialize_any(RowEntryVisitor)
    }
}

/// The first element picks the row kind; an empty row is an empty pair list.
impl<'de> Deserialize<'de> for SparseRow {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        struct SparseRowVisitor;

        impl<'de> Visitor<'de> for SparseRowVisitor {
            type Value = SparseRow;

            fn expecting(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                f.write_str("a list of scores or a list of [candidate_index, score] pairs")
            }

            fn visit_seq<A: SeqAccess<'de>>(self, mut seq: A) -> Result<Self::Value, A::Error> {
                let capacity = seq.size_hint().unwrap_or(0);
                match seq.next_element::<RowEntry>()? {
                    None => Ok(SparseRow::Pairs(Vec::new())),
                    Some(RowEntry::Score(first)) => {
                        let mut scores = Vec::with_capacity(capacity.max(1));
                        scores.push(first);
                        while let Some(entry) = seq.next_element::<RowEntry>()? {
                            match entry {
                                RowEntry::Score(score) => scores.push(score),
                                RowEntry::Pair(..) => return Err(mixed_row()),
                            }
                        }
                        Ok(SparseRow::Scores(scores))
                    }
                    Some(RowEntry::Pair(candidate, score)) => {
                        let mut pairs = Vec::with_capacity(capacity.max(1));
                        pairs.push((candidate, score));
                        while let Some(entry) = seq.next_element::<RowEntry>()? {
                            match entry {
                                RowEntry::Pair(candidate, score) => pairs.push((candidate, score)),
                                RowEntry::Score(_) => return Err(mixed_row()),
                            }
                        }
                        Ok(SparseRow::Pairs(pairs))
                    }
                }
            }
        }

        deserializer.deserialize_seq(SparseRowVisitor)
    }
}

fn mixed_row<E: de::Error>() -> E {
    E::custom("similarity row mixes bare scores with [candidate_index, score] pairs")
}

/// Arrays decode as a dense matrix and objects as sparse rows, streaming
/// straight into the final layout.
impl<'de> Deserialize<'de> for SimilarityTable {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        deserializer.deserialize_any(TableVisitor)
    }
}

struct TableVisitor;

impl<'de> Visitor<'de> for TableVisitor {
    type Value = SimilarityTable;

    fn expecting(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("a dense score matrix or an object mapping item index to a score row")
    }

    fn visit_seq<A: SeqAccess<'de>>(self, mut seq: A) -> Result<Self::Value, A::Error> {
        let mut rows = Vec::with_capacity(seq.size_hint().unwrap_or(0));
        while let Some(ScoreRow(row)) = seq.next_element()? {
            rows.push(row);
        }
        Ok(SimilarityTable::Dense(rows))
    }

    fn visit_map<A: MapAccess<'de>>(self, mut map: A) -> Result<Self::Value, A::Error> {
        let mut rows = BTreeMap::new();
        while let Some(key) = map.next_key::<String>()? {
            let index = key.trim().parse::<usize>().map_err(|_| {
                de::Error::custom(format!("similarity row key '{key}' is not an item index"))
            })?;
            let row: SparseRow = map.next_value()?;
            if rows.insert(index, row).is_some() {
                return Err(de::Error::custom(format!(
                    "similarity row {index} appears more than once"
                )));
            }
        }
        Ok(SimilarityTable::Sparse(rows))
    }
}

impl Serialize for SimilarityTable {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        match self {
            Self::Dense(rows) => rows.serialize(serializer),
            Self::Sparse(rows) => {
                let mut map = serializer.serialize_map(Some(rows.len()))?;
                for (index, row) in rows {
                    match row {
                        SparseRow::Scores(scores) => map.serialize_entry(&index.to_string(), scores)?,
                        SparseRow::Pairs(pairs) => map.serialize_entry(&index.to_string(), pairs)?,
                    }
                }
                map.end()
            }
        }
    }
}
