use serde::{Deserialize, Serialize};

use super::ItemId;

/// A catalog entry as seen by the recommendation engine
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Item {
    pub id: ItemId,
    pub title: String,
    /// Concatenated descriptive text (genres, keywords, tagline, cast, director or synopsis)
    #[serde(default)]
    pub text_features: String,
}

impl Item {
    pub fn new(id: ItemId, title: impl Into<String>, text_features: impl Into<String>) -> Self {
        Self {
            id,
            title: title.into(),
            text_features: text_features.into(),
        }
    }

    /// Builds an item from individual descriptive fields.
    ///
    /// Missing fields are treated as empty strings, so the joined text always has
    /// one separator per field.
    pub fn from_fields<'a, I>(id: ItemId, title: impl Into<String>, fields: I) -> Self
    where
        I: IntoIterator<Item = Option<&'a str>>,
    {
        let text_features = fields
            .into_iter()
            .map(|field| field.unwrap_or_default())
            .collect::<Vec<_>>()
            .join(" ");

        Self::new(id, title, text_features)
    }
}
