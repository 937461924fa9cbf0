use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Field {
    Album,
    Artist,
    Composer,
    Title,
    Track,
    Disc,
}

impl Field {
    pub const ALL: [Field; 6] = [
        Field::Album,
        Field::Artist,
        Field::Composer,
        Field::Title,
        Field::Track,
        Field::Disc,
    ];

    pub fn keyword(self) -> &'static str {
        match self {
            Field::Album => "album",
            Field::Artist => "artist",
            Field::Composer => "composer",
            Field::Title => "title",
            Field::Track => "track",
            Field::Disc => "disc",
        }
    }

    pub fn is_numeric(self) -> bool {
        matches!(self, Field::Track | Field::Disc)
    }
}

impl fmt::Display for Field {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.keyword())
    }
}

/// Tag values of one audio file, keyed by field. Blank values are never stored.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct TrackMetadata {
    fields: BTreeMap<Field, String>,
}

impl TrackMetadata {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with(mut self, field: Field, value: impl Into<String>) -> Self {
        self.set(field, value);
        self
    }

    pub fn set(&mut self, field: Field, value: impl Into<String>) {
        let value = value.into();
        if value.trim().is_empty() {
            self.fields.remove(&field);
        } else {
            self.fields.insert(field, value);
        }
    }

    pub fn get(&self, field: Field) -> Option<&str> {
        self.fields.get(&field).map(String::as_str)
    }

    pub fn is_empty(&self) -> bool {
        self.fields.is_empty()
    }
}
