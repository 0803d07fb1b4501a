use crate::error::DatasetError;
use crate::table::CALIBRATION_HEADER;
use pelletcam_core::{CalibrationObservation, ImageCoordinate};
use std::fs;
use std::io;
use std::path::Path;

/// Read every observation from the calibration table at `path`, in file order.
///
/// A missing table reads as an empty history.
pub fn read_calibration(path: &Path) -> Result<Vec<CalibrationObservation>, DatasetError> {
    let raw = match fs::read_to_string(path) {
        Ok(raw) => raw,
        Err(e) if e.kind() == io::ErrorKind::NotFound => {
            log::debug!("no calibration table at {}", path.display());
            return Ok(Vec::new());
        }
        Err(e) => return Err(e.into()),
    };

    let mut lines = raw.lines().enumerate();
    match lines.next() {
        None => return Ok(Vec::new()),
        Some((_, header)) if header.trim() == CALIBRATION_HEADER => {}
        Some((_, header)) => {
            return Err(DatasetError::HeaderMismatch {
                path: path.to_path_buf(),
                found: header.to_string(),
            })
        }
    }

    let mut out = Vec::new();
    for (idx, line) in lines {
        if line.trim().is_empty() {
            continue;
        }
        let malformed = |reason: String| DatasetError::MalformedRow {
            path: path.to_path_buf(),
            line: idx + 1,
            reason,
        };

        let fields: Vec<&str> = line.split(',').collect();
        let [image_path, x, y] = fields.as_slice() else {
            return Err(malformed(format!("expected 3 fields, found {}", fields.len())));
        };
        let parse = |name: &str, v: &str| {
            v.trim()
                .parse::<f64>()
                .map_err(|e| malformed(format!("{name} {v:?}: {e}")))
        };
        let point = ImageCoordinate::new(parse("x", *x)?, parse("y", *y)?);
        out.push(CalibrationObservation::new(*image_path, point));
    }

    log::debug!(
        "read {} calibration observation(s) from {}",
        out.len(),
        path.display()
    );
    Ok(out)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn integer_and_float_coordinates_are_accepted() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("reference_data.csv");
        fs::write(
            &path,
            "Image_Path, Clicked_X, Clicked_Y\na.jpg,10,20\n\nb.jpg,30.5, 40\n",
        )
        .unwrap();

        let obs = read_calibration(&path).unwrap();
        assert_eq!(obs.len(), 2);
        assert_eq!(obs[0].point, ImageCoordinate::new(10.0, 20.0));
        assert_eq!(obs[1].point, ImageCoordinate::new(30.5, 40.0));
        assert_eq!(obs[1].image_path, Path::new("b.jpg"));
    }

    #[test]
    fn missing_table_is_empty_history() {
        let dir = tempfile::tempdir().unwrap();
        let obs = read_calibration(&dir.path().join("nope.csv")).unwrap();
        assert!(obs.is_empty());
    }

    #[test]
    fn path_with_comma_surfaces_as_malformed_row() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("reference_data.csv");
        fs::write(&path, "Image_Path, Clicked_X, Clicked_Y\nmy,pics/a.jpg,1,2\n").unwrap();

        match read_calibration(&path) {
            Err(DatasetError::MalformedRow { line, .. }) => assert_eq!(line, 2),
            other => panic!("expected malformed row, got {other:?}"),
        }
    }

    #[test]
    fn results_table_is_not_a_calibration_table() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("results.csv");
        fs::write(&path, format!("{}\n", crate::RESULTS_HEADER)).unwrap();
        assert!(matches!(
            read_calibration(&path),
            Err(DatasetError::HeaderMismatch { .. })
        ));
    }
}
