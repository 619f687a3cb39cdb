//! Boundary source file readers.
//!
//! `.shp` files are read with their `.dbf` attribute table; `.geojson` and
//! `.json` files are read as a `FeatureCollection`. Both produce
//! [`RawFeature`]s with untouched attribute values, columns in file order,
//! and source-CRS geometry.
//!
//! `.dbf` text is read byte for byte and decoded here rather than by the
//! `dbase` reader: with the encoding named by a `.cpg` sidecar when there is
//! one, otherwise as UTF-8, falling back to Windows-1252 so that legacy
//! Arabic code page bytes survive for [`crate::encoding::repair_text`].

use std::io::{Read, Seek};
use std::path::Path;

use boundary_map_ingest_models::RawFeature;
use dbase::yore::code_pages::CP1256;
use dbase::{FieldIOError, FieldIterator, FieldValue, NamedValue, ReadableRecord};
use encoding_rs::{Encoding, WINDOWS_1252};
use geo::{Coord, LineString, MultiPolygon, Polygon};
use shapefile::{PolygonRing, Shape};

use crate::IngestError;

/// Code page the `.dbf` is opened with. It maps all 256 byte values to
/// distinct characters, so [`DbfText`] can get the original bytes back.
const RAW_PAGE: CP1256 = CP1256;

/// Reads every feature from `path`, choosing the reader by extension.
///
/// # Errors
///
/// Returns [`IngestError::UnsupportedFormat`] for unknown extensions, or
/// the reader's error if the file can't be parsed.
pub fn read_features(path: &Path) -> Result<Vec<RawFeature>, IngestError> {
    let extension = path
        .extension()
        .and_then(|e| e.to_str())
        .map(str::to_ascii_lowercase);

    match extension.as_deref() {
        Some("shp") => read_shapefile(path),
        Some("geojson" | "json") => {
            let text = std::fs::read_to_string(path)?;
            read_geojson_str(&text)
        }
        _ => Err(IngestError::UnsupportedFormat {
            path: path.display().to_string(),
        }),
    }
}

/// A `.dbf` row with its columns in file order.
struct OrderedRecord(Vec<(String, FieldValue)>);

impl ReadableRecord for OrderedRecord {
    fn read_using<Source, MemoSource>(
        field_iterator: &mut FieldIterator<Source, MemoSource>,
    ) -> Result<Self, FieldIOError>
    where
        Source: Read + Seek,
        MemoSource: Read + Seek,
    {
        let mut fields = Vec::new();
        for result in field_iterator {
            let NamedValue { name, value } = result?;
            fields.push((name.to_owned(), value));
        }
        Ok(Self(fields))
    }
}

/// Decodes `.dbf` character fields.
#[derive(Debug, Clone, Copy, Default)]
struct DbfText {
    /// Encoding named by the `.cpg` sidecar.
    declared: Option<&'static Encoding>,
}

impl DbfText {
    fn for_shapefile(path: &Path) -> Self {
        let cpg_path = path.with_extension("cpg");
        let declared = std::fs::read_to_string(&cpg_path)
            .ok()
            .and_then(|label| match encoding_for_label(&label) {
                Some(encoding) => {
                    log::debug!("{} declares {}", cpg_path.display(), encoding.name());
                    Some(encoding)
                }
                None => {
                    log::warn!(
                        "Ignoring unknown code page {:?} in {}",
                        label.trim(),
                        cpg_path.display()
                    );
                    None
                }
            });
        Self { declared }
    }

    /// Turns a value read through [`RAW_PAGE`] back into bytes and decodes
    /// those.
    fn decode(self, raw: &str) -> String {
        match dbase::Encoding::encode(&RAW_PAGE, raw) {
            Ok(bytes) => self.decode_bytes(&bytes),
            Err(_) => raw.to_string(),
        }
    }

    fn decode_bytes(self, bytes: &[u8]) -> String {
        if let Some(encoding) = self.declared {
            return encoding.decode_without_bom_handling(bytes).0.into_owned();
        }
        match std::str::from_utf8(bytes) {
            Ok(text) => text.to_string(),
            Err(_) => WINDOWS_1252.decode_without_bom_handling(bytes).0.into_owned(),
        }
    }
}

/// Resolves a `.cpg` label such as `UTF-8`, `cp1256`, `1256`, or
/// `ANSI 1256`.
fn encoding_for_label(label: &str) -> Option<&'static Encoding> {
    let label = label.trim();
    let label = label.strip_prefix("ANSI").map_or(label, str::trim_start);
    if label.is_empty() {
        return None;
    }
    Encoding::for_label(label.as_bytes()).or_else(|| {
        label
            .parse::<u16>()
            .ok()
            .and_then(|page| Encoding::for_label(format!("windows-{page}").as_bytes()))
    })
}

/// Reads a shapefile and its attribute table.
///
/// Null and non-polygon shapes yield a feature with no geometry so the
/// caller can count them.
///
/// # Errors
///
/// Returns [`IngestError::Shapefile`] if the file can't be opened or a
/// record can't be decoded.
pub fn read_shapefile(path: &Path) -> Result<Vec<RawFeature>, IngestError> {
    let dbf_path = path.with_extension("dbf");
    if !dbf_path.exists() {
        return Err(shapefile::Error::MissingDbf.into());
    }
    let shape_reader = shapefile::ShapeReader::from_path(path)?;
    let dbase_reader = dbase::Reader::from_path_with_encoding(&dbf_path, RAW_PAGE)
        .map_err(shapefile::Error::from)?;
    let mut reader = shapefile::Reader::new(shape_reader, dbase_reader);
    let text = DbfText::for_shapefile(path);

    let mut features = Vec::new();
    for (index, result) in reader
        .iter_shapes_and_records_as::<Shape, OrderedRecord>()
        .enumerate()
    {
        let (shape, record) = result?;
        let geometry = match shape {
            Shape::Polygon(polygon) => {
                rings_to_geometry(polygon.rings(), |p| Coord { x: p.x, y: p.y })
            }
            Shape::PolygonM(polygon) => {
                rings_to_geometry(polygon.rings(), |p| Coord { x: p.x, y: p.y })
            }
            Shape::PolygonZ(polygon) => {
                rings_to_geometry(polygon.rings(), |p| Coord { x: p.x, y: p.y })
            }
            _ => {
                log::debug!("Feature {index} is not a polygon shape");
                None
            }
        };

        features.push(RawFeature {
            index,
            properties: record_to_properties(record, text),
            geometry,
        });
    }

    log::info!("Read {} features from {}", features.len(), path.display());

    Ok(features)
}

/// Groups classified rings into polygons: each outer ring starts a polygon
/// and the inner rings that follow are its holes.
fn rings_to_geometry<P>(
    rings: &[PolygonRing<P>],
    to_coord: impl Fn(&P) -> Coord<f64>,
) -> Option<geo::Geometry<f64>> {
    let mut polygons: Vec<(LineString<f64>, Vec<LineString<f64>>)> = Vec::new();

    for ring in rings {
        let line: LineString<f64> = ring.points().iter().map(&to_coord).collect();
        match ring {
            PolygonRing::Outer(_) => polygons.push((line, Vec::new())),
            PolygonRing::Inner(_) => match polygons.last_mut() {
                Some((_, holes)) => holes.push(line),
                None => polygons.push((line, Vec::new())),
            },
        }
    }

    let mut polygons: Vec<Polygon<f64>> = polygons
        .into_iter()
        .map(|(exterior, holes)| Polygon::new(exterior, holes))
        .collect();

    match polygons.len() {
        0 => None,
        1 => polygons.pop().map(geo::Geometry::Polygon),
        _ => Some(geo::Geometry::MultiPolygon(MultiPolygon(polygons))),
    }
}

fn record_to_properties(
    record: OrderedRecord,
    text: DbfText,
) -> serde_json::Map<String, serde_json::Value> {
    record
        .0
        .into_iter()
        .map(|(name, value)| {
            let value = match value {
                FieldValue::Character(Some(raw)) => FieldValue::Character(Some(text.decode(&raw))),
                FieldValue::Memo(raw) => FieldValue::Memo(text.decode(&raw)),
                other => other,
            };
            (name, field_to_json(value))
        })
        .collect()
}

fn field_to_json(value: FieldValue) -> serde_json::Value {
    use serde_json::Value;

    match value {
        FieldValue::Character(Some(s)) | FieldValue::Memo(s) => Value::String(s),
        FieldValue::Numeric(Some(n)) | FieldValue::Double(n) | FieldValue::Currency(n) => {
            serde_json::Number::from_f64(n).map_or(Value::Null, Value::Number)
        }
        FieldValue::Float(Some(n)) => {
            serde_json::Number::from_f64(f64::from(n)).map_or(Value::Null, Value::Number)
        }
        FieldValue::Integer(n) => Value::from(n),
        FieldValue::Logical(Some(b)) => Value::Bool(b),
        FieldValue::Date(Some(date)) => Value::String(format!(
            "{:04}-{:02}-{:02}",
            date.year(),
            date.month(),
            date.day()
        )),
        FieldValue::Character(None)
        | FieldValue::Numeric(None)
        | FieldValue::Float(None)
        | FieldValue::Logical(None)
        | FieldValue::Date(None) => Value::Null,
        other => Value::String(format!("{other:?}")),
    }
}

/// Parses a `GeoJSON` `FeatureCollection` (or a lone `Feature`).
///
/// # Errors
///
/// Returns [`IngestError::GeoJson`] if the text isn't `GeoJSON`, or
/// [`IngestError::UnsupportedFormat`] if it's a bare geometry.
pub fn read_geojson_str(text: &str) -> Result<Vec<RawFeature>, IngestError> {
    let features = match text.parse::<geojson::GeoJson>()? {
        geojson::GeoJson::FeatureCollection(collection) => collection.features,
        geojson::GeoJson::Feature(feature) => vec![feature],
        geojson::GeoJson::Geometry(_) => {
            return Err(IngestError::UnsupportedFormat {
                path: "bare GeoJSON geometry (expected Feature or FeatureCollection)".to_string(),
            });
        }
    };

    Ok(features
        .into_iter()
        .enumerate()
        .map(|(index, feature)| {
            let geometry = feature.geometry.and_then(|g| {
                geo::Geometry::<f64>::try_from(g)
                    .map_err(|e| log::debug!("Feature {index} has unreadable geometry: {e}"))
                    .ok()
            });
            RawFeature {
                index,
                properties: feature.properties.unwrap_or_default(),
                geometry,
            }
        })
        .collect())
}

#[cfg(test)]
pub(crate) mod fixtures {
    use std::path::{Path, PathBuf};

    use dbase::FieldValue;
    use shapefile::{Point, PolygonRing};

    /// An axis-aligned square as a shapefile polygon.
    pub(crate) fn square(x: f64, y: f64, size: f64) -> shapefile::Polygon {
        shapefile::Polygon::new(PolygonRing::Outer(vec![
            Point::new(x, y),
            Point::new(x, y + size),
            Point::new(x + size, y + size),
            Point::new(x + size, y),
            Point::new(x, y),
        ]))
    }

    /// Fresh, empty scratch directory for one test.
    pub(crate) fn scratch_dir(name: &str) -> PathBuf {
        let dir = std::env::temp_dir().join(format!("boundary_map_{name}_{}", std::process::id()));
        let _ = std::fs::remove_dir_all(&dir);
        std::fs::create_dir_all(&dir).unwrap();
        dir
    }

    /// Writes `<name>.shp`, `.shx`, and `.dbf` into `dir` with one polygon
    /// per row. Character columns are stored in `encoding`.
    pub(crate) fn write_shapefile<E: dbase::Encoding + 'static>(
        dir: &Path,
        name: &str,
        encoding: E,
        columns: &[&str],
        rows: &[(Vec<&str>, shapefile::Polygon)],
    ) -> PathBuf {
        let mut builder = dbase::TableWriterBuilder::with_encoding(encoding);
        for column in columns {
            builder = builder.add_character_field((*column).try_into().unwrap(), 50);
        }

        let path = dir.join(format!("{name}.shp"));
        let mut writer = shapefile::Writer::from_path(&path, builder).unwrap();
        for (values, polygon) in rows {
            let mut record = dbase::Record::default();
            for (column, value) in columns.iter().zip(values) {
                record.insert(
                    (*column).to_string(),
                    FieldValue::Character(Some((*value).to_string())),
                );
            }
            writer.write_shape_and_record(polygon, &record).unwrap();
        }
        drop(writer);

        path
    }
}

#[cfg(test)]
mod tests {
    use super::fixtures::{scratch_dir, square, write_shapefile};
    use super::*;
    use crate::encoding::{TextRepair, repair_text};
    use encoding_rs::{UTF_8, WINDOWS_1256};
    use geo::BoundingRect;
    use shapefile::Point;

    #[test]
    fn reads_shapefile_columns_in_file_order() {
        let dir = scratch_dir("shp_columns");
        let path = write_shapefile(
            &dir,
            "provinces",
            dbase::UnicodeLossy,
            &["OSTAN_FA", "OSTAN_EN", "CODE"],
            &[
                (vec!["تهران", "Tehran", "23"], square(51.0, 35.0, 1.0)),
                (vec!["گیلان", "Gilan", "01"], square(48.5, 36.5, 2.0)),
            ],
        );

        let features = read_features(&path).unwrap();
        let _ = std::fs::remove_dir_all(&dir);

        assert_eq!(features.len(), 2);
        let columns: Vec<&str> = features[0].properties.keys().map(String::as_str).collect();
        assert_eq!(columns, ["OSTAN_FA", "OSTAN_EN", "CODE"]);
        assert_eq!(features[0].properties["OSTAN_FA"], "تهران");
        assert_eq!(features[1].properties["OSTAN_EN"], "Gilan");
        assert_eq!(features[1].index, 1);

        let Some(geo::Geometry::Polygon(polygon)) = &features[0].geometry else {
            panic!("expected a polygon, got {:?}", features[0].geometry);
        };
        let rect = polygon.bounding_rect().unwrap();
        assert_eq!((rect.min().x, rect.min().y), (51.0, 35.0));
        assert_eq!((rect.max().x, rect.max().y), (52.0, 36.0));
    }

    #[test]
    fn legacy_code_page_bytes_survive_reading() {
        let dir = scratch_dir("shp_cp1256");
        let path = write_shapefile(
            &dir,
            "provinces",
            RAW_PAGE,
            &["OSTAN_FA"],
            &[(vec!["تهران"], square(51.0, 35.0, 1.0))],
        );

        let features = read_shapefile(&path).unwrap();
        let _ = std::fs::remove_dir_all(&dir);

        let value = features[0].properties["OSTAN_FA"].as_str().unwrap();
        assert!(!value.contains('\u{FFFD}'), "{value:?}");
        assert_eq!(repair_text(value), TextRepair::Corrected("تهران".to_string()));
    }

    #[test]
    fn cpg_sidecar_names_the_encoding() {
        let dir = scratch_dir("shp_cpg");
        let path = write_shapefile(
            &dir,
            "provinces",
            RAW_PAGE,
            &["OSTAN_FA"],
            &[(vec!["تهران"], square(51.0, 35.0, 1.0))],
        );
        std::fs::write(path.with_extension("cpg"), "1256\n").unwrap();

        let features = read_shapefile(&path).unwrap();
        let _ = std::fs::remove_dir_all(&dir);

        assert_eq!(features[0].properties["OSTAN_FA"], "تهران");
    }

    #[test]
    fn missing_dbf_is_a_shapefile_error() {
        let dir = scratch_dir("shp_no_dbf");
        let path = write_shapefile(
            &dir,
            "provinces",
            dbase::UnicodeLossy,
            &["OSTAN_EN"],
            &[(vec!["Tehran"], square(51.0, 35.0, 1.0))],
        );
        std::fs::remove_file(path.with_extension("dbf")).unwrap();

        let result = read_features(&path);
        let _ = std::fs::remove_dir_all(&dir);

        assert!(matches!(result, Err(IngestError::Shapefile(_))));
    }

    #[test]
    fn cpg_labels_resolve() {
        assert_eq!(encoding_for_label("UTF-8\r\n"), Some(UTF_8));
        assert_eq!(encoding_for_label("1256"), Some(WINDOWS_1256));
        assert_eq!(encoding_for_label("ANSI 1256"), Some(WINDOWS_1256));
        assert_eq!(encoding_for_label("cp1256"), Some(WINDOWS_1256));
        assert_eq!(encoding_for_label("  "), None);
        assert_eq!(encoding_for_label("klingon"), None);
    }

    #[test]
    fn undeclared_bytes_are_utf8_or_latin() {
        let text = DbfText::default();
        assert_eq!(text.decode_bytes("رشت".as_bytes()), "رشت");
        assert_eq!(text.decode_bytes(b"Rasht"), "Rasht");

        let (legacy, _, _) = WINDOWS_1256.encode("رشت");
        let decoded = text.decode_bytes(&legacy);
        assert_eq!(decoded, WINDOWS_1252.decode_without_bom_handling(&legacy).0);
        assert_eq!(repair_text(&decoded).into_text(&decoded), "رشت");

        let declared = DbfText {
            declared: Some(WINDOWS_1256),
        };
        assert_eq!(declared.decode_bytes(&legacy), "رشت");
    }

    #[test]
    fn rings_group_holes_under_preceding_outer() {
        let square = |x: f64, y: f64, s: f64| {
            vec![
                Point::new(x, y),
                Point::new(x, y + s),
                Point::new(x + s, y + s),
                Point::new(x + s, y),
                Point::new(x, y),
            ]
        };
        let rings = vec![
            PolygonRing::Outer(square(0.0, 0.0, 10.0)),
            PolygonRing::Inner(square(2.0, 2.0, 1.0)),
            PolygonRing::Outer(square(20.0, 20.0, 5.0)),
        ];

        let Some(geo::Geometry::MultiPolygon(mp)) =
            rings_to_geometry(&rings, |p| Coord { x: p.x, y: p.y })
        else {
            panic!("expected a multipolygon");
        };
        assert_eq!(mp.0.len(), 2);
        assert_eq!(mp.0[0].interiors().len(), 1);
        assert!(mp.0[1].interiors().is_empty());
    }

    #[test]
    fn single_outer_ring_is_a_polygon() {
        let rings = vec![PolygonRing::Outer(vec![
            Point::new(51.0, 35.0),
            Point::new(51.0, 36.0),
            Point::new(52.0, 36.0),
            Point::new(51.0, 35.0),
        ])];
        assert!(matches!(
            rings_to_geometry(&rings, |p| Coord { x: p.x, y: p.y }),
            Some(geo::Geometry::Polygon(_))
        ));
        let empty: Vec<PolygonRing<Point>> = Vec::new();
        assert!(rings_to_geometry(&empty, |p| Coord { x: p.x, y: p.y }).is_none());
    }

    #[test]
    fn dbase_values_become_json() {
        assert_eq!(
            field_to_json(FieldValue::Character(Some("Tehran".to_string()))),
            serde_json::json!("Tehran")
        );
        assert_eq!(field_to_json(FieldValue::Numeric(Some(23.0))), serde_json::json!(23.0));
        assert_eq!(field_to_json(FieldValue::Integer(7)), serde_json::json!(7));
        assert_eq!(field_to_json(FieldValue::Logical(Some(true))), serde_json::json!(true));
        assert_eq!(field_to_json(FieldValue::Character(None)), serde_json::Value::Null);
    }

    #[test]
    fn reads_feature_collection() {
        let text = r#"{
            "type": "FeatureCollection",
            "features": [
                {
                    "type": "Feature",
                    "properties": {"NAME": "Tehran", "NAME_FA": "تهران"},
                    "geometry": {
                        "type": "Polygon",
                        "coordinates": [[[51, 35], [52, 35], [52, 36], [51, 36], [51, 35]]]
                    }
                },
                {
                    "type": "Feature",
                    "properties": {"NAME": "Nowhere"},
                    "geometry": null
                }
            ]
        }"#;

        let features = read_geojson_str(text).unwrap();
        assert_eq!(features.len(), 2);
        assert_eq!(features[0].properties["NAME_FA"], "تهران");
        assert!(matches!(features[0].geometry, Some(geo::Geometry::Polygon(_))));
        assert_eq!(features[1].index, 1);
        assert!(features[1].geometry.is_none());
    }

    #[test]
    fn rejects_bare_geometry_and_unknown_extension() {
        let bare = r#"{"type": "Point", "coordinates": [51, 35]}"#;
        assert!(matches!(
            read_geojson_str(bare),
            Err(IngestError::UnsupportedFormat { .. })
        ));
        assert!(matches!(
            read_features(Path::new("boundaries.kml")),
            Err(IngestError::UnsupportedFormat { .. })
        ));
    }
}
