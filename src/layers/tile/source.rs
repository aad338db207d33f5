use crate::core::geo::TileCoord;
use crate::{Error, Result};
use serde::{Deserialize, Serialize};
use std::str::FromStr;

/// The imaging source a tile layer shows.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ImageSource {
    pub observatory: String,
    pub instrument: String,
    pub detector: String,
    pub measurement: String,
}

impl ImageSource {
    pub fn new(observatory: &str, instrument: &str, detector: &str, measurement: &str) -> Self {
        Self {
            observatory: observatory.to_string(),
            instrument: instrument.to_string(),
            detector: detector.to_string(),
            measurement: measurement.to_string(),
        }
    }

    /// Human readable label, e.g. `EIT 171`.
    pub fn label(&self) -> String {
        if self.detector == self.instrument {
            format!("{} {}", self.instrument, self.measurement)
        } else {
            format!("{} {} {}", self.instrument, self.detector, self.measurement)
        }
    }
}

impl std::fmt::Display for ImageSource {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "{},{},{},{}",
            self.observatory, self.instrument, self.detector, self.measurement
        )
    }
}

impl FromStr for ImageSource {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        let parts: Vec<&str> = s.split(',').map(str::trim).collect();
        match parts.as_slice() {
            [observatory, instrument, detector, measurement]
                if parts.iter().all(|part| !part.is_empty()) =>
            {
                Ok(Self::new(observatory, instrument, detector, measurement))
            }
            _ => Err(Error::ParseError(format!("not an image source: {:?}", s))),
        }
    }
}

/// Produces tile URLs for a resolved image.
pub trait TileSource: Send + Sync {
    fn tile_url(&self, coord: TileCoord, zoom_level: i32, image_id: &str) -> String;
}

/// The `getTile` action of a tile-delivery endpoint.
#[derive(Debug, Clone)]
pub struct HelioviewerTileSource {
    endpoint: String,
    tile_size: u32,
}

impl HelioviewerTileSource {
    pub fn new(endpoint: impl Into<String>, tile_size: u32) -> Self {
        Self {
            endpoint: endpoint.into(),
            tile_size,
        }
    }
}

impl TileSource for HelioviewerTileSource {
    fn tile_url(&self, coord: TileCoord, zoom_level: i32, image_id: &str) -> String {
        format!(
            "{}?action=getTile&x={}&y={}&zoom={}&imageId={}&ts={}",
            self.endpoint, coord.x, coord.y, zoom_level, image_id, self.tile_size
        )
    }
}

/// URL of the closest-in-time image lookup for `source` at `timestamp`
/// (Unix seconds). Query values are percent-encoded.
pub fn closest_image_url(api_endpoint: &str, source: &ImageSource, timestamp: i64) -> Result<String> {
    let timestamp = timestamp.to_string();
    let url = reqwest::Url::parse_with_params(
        api_endpoint,
        &[
            ("action", "getClosestImage"),
            ("observatory", source.observatory.as_str()),
            ("instrument", source.instrument.as_str()),
            ("detector", source.detector.as_str()),
            ("measurement", source.measurement.as_str()),
            ("timestamp", timestamp.as_str()),
        ],
    )
    .map_err(|e| Error::ParseError(format!("invalid api endpoint {:?}: {}", api_endpoint, e)))?;
    Ok(url.into())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_tile_url() {
        let source = HelioviewerTileSource::new("http://localhost/tiles", 512);
        assert_eq!(
            source.tile_url(TileCoord::new(-1, 0), 11, "42"),
            "http://localhost/tiles?action=getTile&x=-1&y=0&zoom=11&imageId=42&ts=512"
        );
    }

    #[test]
    fn test_closest_image_url() {
        let source = ImageSource::new("SOHO", "EIT", "EIT", "171");
        assert_eq!(
            closest_image_url("http://localhost/api", &source, 1_262_304_000).unwrap(),
            "http://localhost/api?action=getClosestImage&observatory=SOHO&instrument=EIT\
             &detector=EIT&measurement=171&timestamp=1262304000"
        );
    }

    #[test]
    fn test_closest_image_url_encodes_values() {
        let source = ImageSource::new("SOHO", "LASCO", "C2", "white light&more");
        let url = closest_image_url("http://localhost/api", &source, 0).unwrap();
        assert!(url.ends_with("&measurement=white+light%26more&timestamp=0"), "{}", url);

        assert!(closest_image_url("not a url", &source, 0).is_err());
    }

    #[test]
    fn test_source_parsing() {
        let source: ImageSource = "SDO, AIA, AIA, 304".parse().unwrap();
        assert_eq!(source, ImageSource::new("SDO", "AIA", "AIA", "304"));
        assert_eq!(source.to_string(), "SDO,AIA,AIA,304");
        assert_eq!(source.label(), "AIA 304");
        assert_eq!(ImageSource::new("SOHO", "LASCO", "C2", "white-light").label(), "LASCO C2 white-light");

        assert!("SDO,AIA,304".parse::<ImageSource>().is_err());
        assert!("SDO,,AIA,304".parse::<ImageSource>().is_err());
    }
}
