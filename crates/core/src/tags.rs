use crate::metadata::{Field, TrackMetadata};
use lofty::file::TaggedFileExt;
use lofty::tag::{ItemKey, Tag};
use std::path::{Path, PathBuf};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum MetadataError {
    #[error("cannot read tags from {path}: {reason}")]
    Unreadable { path: PathBuf, reason: String },
}

impl MetadataError {
    pub fn unreadable(path: &Path, reason: impl ToString) -> Self {
        Self::Unreadable {
            path: path.to_path_buf(),
            reason: reason.to_string(),
        }
    }
}

/// Source of per-file tag values.
pub trait TagReader {
    fn read_tags(&self, path: &Path) -> Result<TrackMetadata, MetadataError>;
}

/// Reads ID3v2, Vorbis comments, MP4 atoms and APE tags through `lofty`.
#[derive(Debug, Clone, Copy, Default)]
pub struct LoftyTagReader;

impl TagReader for LoftyTagReader {
    fn read_tags(&self, path: &Path) -> Result<TrackMetadata, MetadataError> {
        let tagged =
            lofty::read_from_path(path).map_err(|e| MetadataError::unreadable(path, e))?;

        let Some(tag) = tagged.primary_tag().or_else(|| tagged.first_tag()) else {
            return Ok(TrackMetadata::new());
        };

        Ok(metadata_from_tag(tag))
    }
}

fn metadata_from_tag(tag: &Tag) -> TrackMetadata {
    let mut meta = TrackMetadata::new();
    for (field, key) in [
        (Field::Album, ItemKey::AlbumTitle),
        (Field::Artist, ItemKey::TrackArtist),
        (Field::Composer, ItemKey::Composer),
        (Field::Title, ItemKey::TrackTitle),
    ] {
        if let Some(value) = tag.get_string(&key) {
            meta.set(field, value.trim());
        }
    }

    if let Some(track) = numbered(tag, ItemKey::TrackNumber, ItemKey::TrackTotal) {
        meta.set(Field::Track, track);
    }
    if let Some(disc) = numbered(tag, ItemKey::DiscNumber, ItemKey::DiscTotal) {
        meta.set(Field::Disc, disc);
    }
    meta
}

// Some formats store "N/total" in one item, others split it in two.
fn numbered(tag: &Tag, number_key: ItemKey, total_key: ItemKey) -> Option<String> {
    let number = tag.get_string(&number_key)?.trim();
    if number.is_empty() {
        return None;
    }
    if number.contains('/') {
        return Some(number.to_string());
    }
    match tag.get_string(&total_key).map(str::trim) {
        Some(total) if !total.is_empty() => Some(format!("{number}/{total}")),
        _ => Some(number.to_string()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use lofty::tag::TagType;
    use std::fs;
    use tempfile::tempdir;

    fn tag_with(items: &[(ItemKey, &str)]) -> Tag {
        let mut tag = Tag::new(TagType::VorbisComments);
        for (key, value) in items {
            tag.insert_text(key.clone(), value.to_string());
        }
        tag
    }

    #[test]
    fn maps_text_items_to_fields() {
        let tag = tag_with(&[
            (ItemKey::TrackArtist, "Sample Artist"),
            (ItemKey::AlbumTitle, " Sample Album "),
            (ItemKey::TrackTitle, "Sample Title"),
            (ItemKey::Composer, "Someone"),
        ]);
        let meta = metadata_from_tag(&tag);
        assert_eq!(meta.get(Field::Artist), Some("Sample Artist"));
        assert_eq!(meta.get(Field::Album), Some("Sample Album"));
        assert_eq!(meta.get(Field::Title), Some("Sample Title"));
        assert_eq!(meta.get(Field::Composer), Some("Someone"));
        assert_eq!(meta.get(Field::Track), None);
    }

    #[test]
    fn joins_split_track_totals() {
        let tag = tag_with(&[
            (ItemKey::TrackNumber, "3"),
            (ItemKey::TrackTotal, "12"),
            (ItemKey::DiscNumber, "1"),
        ]);
        let meta = metadata_from_tag(&tag);
        assert_eq!(meta.get(Field::Track), Some("3/12"));
        assert_eq!(meta.get(Field::Disc), Some("1"));
    }

    #[test]
    fn keeps_combined_track_values() {
        let tag = tag_with(&[(ItemKey::TrackNumber, "04/10"), (ItemKey::TrackTotal, "99")]);
        let meta = metadata_from_tag(&tag);
        assert_eq!(meta.get(Field::Track), Some("04/10"));
    }

    #[test]
    fn non_audio_file_is_unreadable() {
        let temp = tempdir().expect("tempdir");
        let path = temp.path().join("fake.flac");
        fs::write(&path, b"definitely not audio").expect("write fake");

        let err = LoftyTagReader.read_tags(&path).expect_err("must fail");
        assert!(matches!(err, MetadataError::Unreadable { .. }));
        assert!(err.to_string().contains("fake.flac"));
    }
}
