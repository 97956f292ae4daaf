use chrono::NaiveDate;
use exif::{DateTime, Exif, In, Reader, Tag, Value};
use serde::Serialize;
use std::fs::File;
use std::io::{BufRead, BufReader, Seek};
use std::path::Path;
use tracing::trace;

/// Containers the EXIF reader understands.
const EXIF_EXTENSIONS: &[&str] = &["jpg", "jpeg", "tif", "tiff", "png", "webp", "heic", "heif"];

/// Capture-time tags of the primary image, best first.
const TIME_TAGS: [Tag; 3] = [Tag::DateTimeOriginal, Tag::DateTime, Tag::DateTimeDigitized];

/// One primary-image field, rendered for display.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ExifField {
    pub tag: String,
    pub value: String,
}

pub fn has_exif_container(path: &Path) -> bool {
    path.extension()
        .and_then(|e| e.to_str())
        .is_some_and(|ext| EXIF_EXTENSIONS.iter().any(|known| ext.eq_ignore_ascii_case(known)))
}

/// Capture time recorded by the camera, read as UTC.
pub fn exif_millis(path: &Path) -> Option<i64> {
    let exif = read_container(path)?;
    TIME_TAGS
        .iter()
        .find_map(|tag| exif.get_field(*tag, In::PRIMARY))
        .and_then(|field| match &field.value {
            Value::Ascii(values) => values.first().and_then(|raw| ascii_millis(raw)),
            _ => None,
        })
}

/// Every primary-image field of `path`, or `None` when it carries no EXIF.
pub fn read_exif(path: &Path) -> Option<Vec<ExifField>> {
    let exif = read_container(path)?;
    Some(
        exif.fields()
            .filter(|f| f.ifd_num == In::PRIMARY)
            .map(|f| ExifField {
                tag: f.tag.to_string(),
                value: f.display_value().with_unit(&exif).to_string(),
            })
            .collect(),
    )
}

fn read_container(path: &Path) -> Option<Exif> {
    if !has_exif_container(path) {
        return None;
    }
    let file = File::open(path).ok()?;
    match parse(&mut BufReader::new(file)) {
        Ok(exif) => Some(exif),
        Err(err) => {
            trace!("No EXIF in {}: {}", path.display(), err);
            None
        }
    }
}

fn parse<R: BufRead + Seek>(reader: &mut R) -> Result<Exif, exif::Error> {
    Reader::new().read_from_container(reader)
}

/// `YYYY:MM:DD HH:MM:SS` to epoch millis.
fn ascii_millis(raw: &[u8]) -> Option<i64> {
    let dt = DateTime::from_ascii(raw).ok()?;
    let millis = NaiveDate::from_ymd_opt(dt.year.into(), dt.month.into(), dt.day.into())?
        .and_hms_opt(dt.hour.into(), dt.minute.into(), dt.second.into())?
        .and_utc()
        .timestamp_millis();
    (millis > 0).then_some(millis)
}
