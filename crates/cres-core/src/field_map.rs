//! Measured field-map loader.
//!
//! Reads a line-oriented table of x,y,z,Bx,By,Bz samples, delimited by
//! commas or spaces, with `%`-prefixed header lines skipped. Files
//! ending in `.gz` are decompressed on the fly. Coordinates and field
//! values are scaled into SI (metres, tesla) at load time so nothing
//! downstream ever sees file units.

use std::fs::File;
use std::io::{BufRead, BufReader, Read};
use std::path::{Path, PathBuf};

use flate2::read::GzDecoder;

use cres_types::error::{TrackError, TrackResult};
use cres_types::state::MeasuredFieldPoint;

/// Marker character opening a header line in the exported table.
const HEADER_MARKER: char = '%';

/// Configured reader for one field-map file.
pub struct FieldMapLoader {
    path: PathBuf,
    length_scale_m: f64,
    field_scale_t: f64,
}

impl FieldMapLoader {
    pub fn new(
        path: impl AsRef<Path>,
        length_scale_m: f64,
        field_scale_t: f64,
    ) -> TrackResult<Self> {
        if !length_scale_m.is_finite() || length_scale_m <= 0.0 {
            return Err(TrackError::ConfigError(format!(
                "field map length_scale_m must be finite and > 0, got {length_scale_m}"
            )));
        }
        if !field_scale_t.is_finite() || field_scale_t <= 0.0 {
            return Err(TrackError::ConfigError(format!(
                "field map field_scale_t must be finite and > 0, got {field_scale_t}"
            )));
        }
        Ok(FieldMapLoader {
            path: path.as_ref().to_path_buf(),
            length_scale_m,
            field_scale_t,
        })
    }

    /// One-time load. An unopenable file or a table with zero data
    /// rows is a fatal configuration error.
    pub fn load(&self) -> TrackResult<Vec<MeasuredFieldPoint>> {
        let file = File::open(&self.path).map_err(|e| {
            TrackError::ConfigError(format!(
                "cannot open field map '{}': {e}",
                self.path.display()
            ))
        })?;

        let is_gzip = self
            .path
            .extension()
            .is_some_and(|ext| ext.eq_ignore_ascii_case("gz"));
        let reader: Box<dyn Read> = if is_gzip {
            Box::new(GzDecoder::new(file))
        } else {
            Box::new(file)
        };

        let mut points = Vec::new();
        for (index, line) in BufReader::new(reader).lines().enumerate() {
            let line = line?;
            let trimmed = line.trim();
            if trimmed.is_empty() || trimmed.starts_with(HEADER_MARKER) {
                continue;
            }
            points.push(self.parse_line(trimmed, index + 1)?);
        }

        if points.is_empty() {
            return Err(TrackError::ConfigError(format!(
                "field map '{}' contains no data points",
                self.path.display()
            )));
        }
        Ok(points)
    }

    fn parse_line(&self, line: &str, line_no: usize) -> TrackResult<MeasuredFieldPoint> {
        let mut values = [0.0f64; 6];
        let mut count = 0;
        for token in line.split([',', ' ', '\t']).filter(|t| !t.is_empty()) {
            if count == 6 {
                return Err(TrackError::ConfigError(format!(
                    "field map '{}' line {line_no}: expected 6 columns, found more",
                    self.path.display()
                )));
            }
            values[count] = token.parse::<f64>().map_err(|_| {
                TrackError::ConfigError(format!(
                    "field map '{}' line {line_no}: cannot parse '{token}' as a number",
                    self.path.display()
                ))
            })?;
            count += 1;
        }
        if count != 6 {
            return Err(TrackError::ConfigError(format!(
                "field map '{}' line {line_no}: expected 6 columns, found {count}",
                self.path.display()
            )));
        }
        if values.iter().any(|v| !v.is_finite()) {
            return Err(TrackError::ConfigError(format!(
                "field map '{}' line {line_no}: non-finite sample value",
                self.path.display()
            )));
        }

        Ok(MeasuredFieldPoint {
            position_m: [
                values[0] * self.length_scale_m,
                values[1] * self.length_scale_m,
                values[2] * self.length_scale_m,
            ],
            field_t: [
                values[3] * self.field_scale_t,
                values[4] * self.field_scale_t,
                values[5] * self.field_scale_t,
            ],
        })
    }
}
