//! KMZ container reading.

use std::io::{Read, Seek};
use tracing::debug;
use zip::ZipArchive;

use super::ParseError;

/// Read the inner KML document out of a KMZ archive.
///
/// The first entry ending in `.kml` is the document; other entries (icons,
/// overlays) are ignored.
pub fn read_kml_document<R: Read + Seek>(reader: R) -> Result<String, ParseError> {
    let mut archive = ZipArchive::new(reader).map_err(|e| ParseError::Archive(e.to_string()))?;

    let kml_name = archive
        .file_names()
        .find(|n| n.to_ascii_lowercase().ends_with(".kml"))
        .ok_or(ParseError::MissingDocument)?
        .to_owned();

    debug!("Found KML document in KMZ: {}", kml_name);
    let mut entry = archive
        .by_name(&kml_name)
        .map_err(|e| ParseError::Archive(e.to_string()))?;

    let mut document = String::new();
    entry.read_to_string(&mut document)?;
    Ok(document)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::{Cursor, Write};
    use zip::write::SimpleFileOptions;

    fn zip_with(entries: &[(&str, &str)]) -> Cursor<Vec<u8>> {
        let mut writer = zip::ZipWriter::new(Cursor::new(Vec::new()));
        for (name, body) in entries {
            writer
                .start_file(*name, SimpleFileOptions::default())
                .unwrap();
            writer.write_all(body.as_bytes()).unwrap();
        }
        let mut cursor = writer.finish().unwrap();
        cursor.set_position(0);
        cursor
    }

    #[test]
    fn test_reads_first_kml_entry() {
        let kmz = zip_with(&[("files/icon.png", "png"), ("doc.KML", "<kml/>")]);
        assert_eq!(read_kml_document(kmz).unwrap(), "<kml/>");
    }

    #[test]
    fn test_missing_document() {
        let kmz = zip_with(&[("readme.txt", "hello")]);
        assert!(matches!(
            read_kml_document(kmz),
            Err(ParseError::MissingDocument)
        ));
    }

    #[test]
    fn test_not_a_zip() {
        let err = read_kml_document(Cursor::new(b"<kml></kml>".to_vec())).unwrap_err();
        assert!(matches!(err, ParseError::Archive(_)));
    }
}
