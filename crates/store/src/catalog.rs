use serde::de::value::{MapAccessDeserializer, SeqAccessDeserializer};
use serde::de::{self, Deserializer, MapAccess, SeqAccess, Visitor};
use serde::ser::Serializer;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::collections::hash_map::Entry;
use std::collections::HashMap;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Item {
    pub index: usize,
    pub title: String,
    pub media_ref: String,
}

/// Ordered item list with a title lookup. The first occurrence of a duplicated title wins.
#[derive(Debug, Clone, Default)]
pub struct Catalog {
    items: Vec<Item>,
    by_title: HashMap<String, usize>,
    duplicate_titles: usize,
}

impl Catalog {
    pub fn from_entries<I, T, M>(entries: I) -> Self
    where
        I: IntoIterator<Item = (T, M)>,
        T: Into<String>,
        M: Into<String>,
    {
        let mut catalog = Self::default();
        for (title, media_ref) in entries {
            catalog.push(title.into(), media_ref.into());
        }
        if catalog.duplicate_titles > 0 {
            log::warn!(
                "Catalog has {} duplicate titles; lookups resolve to the first occurrence",
                catalog.duplicate_titles
            );
        }
        catalog
    }

    fn push(&mut self, title: String, media_ref: String) {
        let index = self.items.len();
        match self.by_title.entry(title.clone()) {
            Entry::Occupied(first) => {
                log::debug!(
                    "Duplicate title '{title}' at index {index} (first seen at {})",
                    first.get()
                );
                self.duplicate_titles += 1;
            }
            Entry::Vacant(slot) => {
                slot.insert(index);
            }
        }
        self.items.push(Item {
            index,
            title,
            media_ref,
        });
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.items.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    #[must_use]
    pub fn get(&self, index: usize) -> Option<&Item> {
        self.items.get(index)
    }

    #[must_use]
    pub fn resolve_index(&self, title: &str) -> Option<usize> {
        self.by_title.get(title).copied()
    }

    #[must_use]
    pub fn items(&self) -> &[Item] {
        &self.items
    }

    pub fn titles(&self) -> impl Iterator<Item = &str> {
        self.items.iter().map(|item| item.title.as_str())
    }

    #[must_use]
    pub const fn duplicate_titles(&self) -> usize {
        self.duplicate_titles
    }
}

impl Serialize for Catalog {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_seq(self.items.iter().map(|item| ItemRecord {
            title: item.title.clone(),
            media_ref: item.media_ref.clone(),
        }))
    }
}

#[derive(Debug, Serialize, Deserialize)]
struct ItemRecord {
    title: String,
    #[serde(alias = "poster_path", alias = "poster", alias = "image")]
    media_ref: String,
}

#[derive(Debug, Deserialize)]
struct CatalogColumns {
    title: Vec<String>,
    #[serde(alias = "poster_path", alias = "poster", alias = "image")]
    media_ref: Vec<String>,
}

/// Arrays decode as records and objects as columns, without buffering the input.
impl<'de> Deserialize<'de> for Catalog {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        deserializer.deserialize_any(CatalogVisitor)
    }
}

struct CatalogVisitor;

impl<'de> Visitor<'de> for CatalogVisitor {
    type Value = Catalog;

    fn expecting(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(
            "a list of {title, media_ref} records or a {title: [..], media_ref: [..]} column table",
        )
    }

    fn visit_seq<A: SeqAccess<'de>>(self, seq: A) -> Result<Self::Value, A::Error> {
        let records = Vec::<ItemRecord>::deserialize(SeqAccessDeserializer::new(seq))?;
        Ok(Catalog::from_entries(
            records.into_iter().map(|r| (r.title, r.media_ref)),
        ))
    }

    fn visit_map<A: MapAccess<'de>>(self, map: A) -> Result<Self::Value, A::Error> {
        let columns = CatalogColumns::deserialize(MapAccessDeserializer::new(map))?;
        if columns.title.len() != columns.media_ref.len() {
            return Err(de::Error::custom(format!(
                "catalog columns disagree in length: {} titles vs {} media refs",
                columns.title.len(),
                columns.media_ref.len()
            )));
        }
        Ok(Catalog::from_entries(
            columns.title.into_iter().zip(columns.media_ref),
        ))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn indices_follow_load_order() {
        let catalog = Catalog::from_entries([("A", "a.jpg"), ("B", "b.jpg"), ("C", "c.jpg")]);
        assert_eq!(catalog.len(), 3);
        assert_eq!(catalog.resolve_index("B"), Some(1));
        assert_eq!(catalog.get(2).map(|i| i.title.as_str()), Some("C"));
        assert_eq!(catalog.resolve_index("Z"), None);
        assert_eq!(catalog.titles().collect::<Vec<_>>(), vec!["A", "B", "C"]);
    }

    #[test]
    fn duplicate_titles_resolve_to_first_match() {
        let catalog = Catalog::from_entries([("A", "1"), ("B", "2"), ("A", "3")]);
        assert_eq!(catalog.resolve_index("A"), Some(0));
        assert_eq!(catalog.duplicate_titles(), 1);
        assert_eq!(catalog.len(), 3);
    }

    #[test]
    fn deserializes_records_with_media_aliases() {
        let raw = r#"[
            {"movie_id": 19995, "title": "Avatar", "poster_path": "/a.jpg"},
            {"title": "Spectre", "media_ref": "/s.jpg"}
        ]"#;
        let catalog: Catalog = serde_json::from_str(raw).unwrap();
        assert_eq!(
            catalog.items(),
            &[
                Item {
                    index: 0,
                    title: "Avatar".to_string(),
                    media_ref: "/a.jpg".to_string(),
                },
                Item {
                    index: 1,
                    title: "Spectre".to_string(),
                    media_ref: "/s.jpg".to_string(),
                },
            ]
        );
    }

    #[test]
    fn deserializes_column_tables() {
        let raw = r#"{"title": ["A", "B"], "poster_path": ["a", "b"], "tags": ["x", "y"]}"#;
        let catalog: Catalog = serde_json::from_str(raw).unwrap();
        assert_eq!(catalog.len(), 2);
        assert_eq!(catalog.get(1).unwrap().media_ref, "b");
    }

    #[test]
    fn rejects_ragged_columns_and_missing_fields() {
        let ragged = r#"{"title": ["A", "B"], "poster_path": ["a"]}"#;
        assert!(serde_json::from_str::<Catalog>(ragged)
            .unwrap_err()
            .to_string()
            .contains("disagree in length"));

        let missing = r#"[{"title": "A"}]"#;
        assert!(serde_json::from_str::<Catalog>(missing).is_err());
        assert!(serde_json::from_str::<Catalog>(r#""movies""#).is_err());
    }

    #[test]
    fn serializes_back_to_records() {
        let catalog = Catalog::from_entries([("A", "a"), ("B", "b")]);
        let raw = serde_json::to_string(&catalog).unwrap();
        assert_eq!(
            raw,
            r#"[{"title":"A","media_ref":"a"},{"title":"B","media_ref":"b"}]"#
        );
        let back: Catalog = serde_json::from_str(&raw).unwrap();
        assert_eq!(back.items(), catalog.items());
    }
}
