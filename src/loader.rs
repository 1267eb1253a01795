//! Readers for inputs produced by other tools
//!
//! Part color maps and saved attributions are JSON; segmentation maps are
//! any image format the `image` crate decodes.

use crate::attribution::{BoundingBox, PrototypeEvidence};
use crate::error::{AttributionError, Result};
use crate::segmentation::{PartColor, PartColorMap, Preprocessor, SegmentationMap};
use image::RgbImage;
use ndarray::Array2;
use serde::de::DeserializeOwned;
use serde::Deserialize;
use std::path::Path;

#[derive(Debug, Deserialize)]
struct PartColorEntry {
    color: PartColor,
    part: String,
}

#[derive(Debug, Deserialize)]
struct EvidenceFile {
    img_size: usize,
    prototypes: Vec<EvidenceEntry>,
}

#[derive(Debug, Deserialize)]
struct EvidenceEntry {
    bbox: BoundingBox,
    activation_pattern: Vec<Vec<f32>>,
    activation: f32,
    connection_weight: f32,
}

fn read_json<T: DeserializeOwned>(path: &Path) -> Result<T> {
    let text = std::fs::read_to_string(path).map_err(|source| AttributionError::Io {
        path: path.to_path_buf(),
        source,
    })?;
    serde_json::from_str(&text).map_err(|source| AttributionError::Json {
        path: path.to_path_buf(),
        source,
    })
}

/// Read `[{"color": [r, g, b], "part": "beak"}, ...]`, keeping file order
pub fn load_part_colors(path: impl AsRef<Path>) -> Result<PartColorMap> {
    let entries: Vec<PartColorEntry> = read_json(path.as_ref())?;
    PartColorMap::from_pairs(entries.into_iter().map(|e| (e.color, e.part)))
}

/// Read a dense attribution grid stored as a JSON array of rows
pub fn load_dense_grid(path: impl AsRef<Path>) -> Result<Array2<f32>> {
    let rows: Vec<Vec<f32>> = read_json(path.as_ref())?;
    rows_to_array(rows, "attribution rows")
}

/// Read saved prototype evidence together with its native grid size
pub fn load_evidence(path: impl AsRef<Path>) -> Result<(usize, Vec<PrototypeEvidence>)> {
    let file: EvidenceFile = read_json(path.as_ref())?;
    let evidence = file
        .prototypes
        .into_iter()
        .map(|entry| -> Result<PrototypeEvidence> {
            Ok(PrototypeEvidence {
                bbox: entry.bbox,
                activation_pattern: rows_to_array(entry.activation_pattern, "activation pattern")?,
                activation: entry.activation,
                connection_weight: entry.connection_weight,
            })
        })
        .collect::<Result<Vec<_>>>()?;
    Ok((file.img_size, evidence))
}

/// Decode a segmentation render, resizing it onto `size` when given
pub fn load_segmentation(path: impl AsRef<Path>, size: Option<(u32, u32)>) -> Result<SegmentationMap> {
    let path = path.as_ref();
    let render: RgbImage = image::open(path)
        .map_err(|source| AttributionError::Image {
            path: path.to_path_buf(),
            source,
        })?
        .to_rgb8();

    Ok(match size {
        Some((width, height)) => Preprocessor::new(width, height).segmentation(&render),
        None => SegmentationMap::from_rgb_image(&render),
    })
}

fn rows_to_array(rows: Vec<Vec<f32>>, context: &'static str) -> Result<Array2<f32>> {
    let height = rows.len();
    let width = rows.first().map_or(0, Vec::len);
    if let Some(row) = rows.iter().find(|row| row.len() != width) {
        return Err(AttributionError::shape(context, &[height, width], &[height, row.len()]));
    }
    let flat: Vec<f32> = rows.into_iter().flatten().collect();
    Array2::from_shape_vec((height, width), flat)
        .map_err(|_| AttributionError::shape(context, &[height, width], &[height * width]))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use tempfile::NamedTempFile;

    fn json_file(contents: &str) -> NamedTempFile {
        let mut file = NamedTempFile::new().unwrap();
        file.write_all(contents.as_bytes()).unwrap();
        file
    }

    #[test]
    fn part_colors_keep_file_order() {
        let file = json_file(
            r#"[{"color": [0, 255, 0], "part": "wing01"},
                {"color": [255, 0, 0], "part": "beak"}]"#,
        );
        let colors = load_part_colors(file.path()).unwrap();
        let labels: Vec<&str> = colors.iter().map(|(_, label)| label).collect();
        assert_eq!(labels, vec!["wing01", "beak"]);
        assert_eq!(colors.get(&PartColor::new(255, 0, 0)), Some("beak"));
    }

    #[test]
    fn duplicate_colors_in_file_are_rejected() {
        let file = json_file(
            r#"[{"color": [1, 2, 3], "part": "a"}, {"color": [1, 2, 3], "part": "b"}]"#,
        );
        assert!(matches!(
            load_part_colors(file.path()),
            Err(AttributionError::InvalidPartMap(_))
        ));
    }

    #[test]
    fn dense_grid_must_be_rectangular() {
        let good = json_file("[[1.0, 2.0], [3.0, 4.0], [5.0, 6.0]]");
        assert_eq!(load_dense_grid(good.path()).unwrap().dim(), (3, 2));

        let ragged = json_file("[[1.0, 2.0], [3.0]]");
        assert!(load_dense_grid(ragged.path()).unwrap_err().is_contract_violation());
    }

    #[test]
    fn evidence_file_is_parsed_in_order() {
        let file = json_file(
            r#"{"img_size": 2, "prototypes": [
                {"bbox": {"y_min": 0, "y_max": 1, "x_min": 0, "x_max": 0},
                 "activation_pattern": [[1.0, 0.0], [0.0, 0.0]],
                 "activation": 3.5, "connection_weight": 1.2},
                {"bbox": {"y_min": 1, "y_max": 1, "x_min": 1, "x_max": 1},
                 "activation_pattern": [[0.0, 0.0], [0.0, 1.0]],
                 "activation": 2.0, "connection_weight": 0.4}
            ]}"#,
        );
        let (img_size, evidence) = load_evidence(file.path()).unwrap();
        assert_eq!(img_size, 2);
        assert_eq!(evidence.len(), 2);
        assert_eq!(evidence[0].bbox, BoundingBox::new(0, 1, 0, 0));
        assert_eq!(evidence[1].activation, 2.0);
    }

    #[test]
    fn missing_file_reports_path() {
        let err = load_part_colors("/nonexistent/parts.json").unwrap_err();
        assert!(err.to_string().contains("/nonexistent/parts.json"));
    }

    #[test]
    fn segmentation_png_round_trip() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("part_map.png");
        RgbImage::from_pixel(5, 3, image::Rgb([204, 204, 210]))
            .save(&path)
            .unwrap();

        let map = load_segmentation(&path, None).unwrap();
        assert_eq!(map.dims(), (3, 5));
        let resized = load_segmentation(&path, Some((10, 6))).unwrap();
        assert_eq!(resized.dims(), (6, 10));
    }
}
