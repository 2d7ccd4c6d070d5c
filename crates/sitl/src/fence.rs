//! Fence containment library.
//!
//! Implements the polygon/circle containment math the core consumes
//! through the `FenceContainment` trait, plus the fence file loader.
//!
//! # File format
//!
//! One shape per block, `#` starts a comment:
//!
//! ```text
//! circle 47.397 8.545 200
//! polygon
//! 47.397 8.545
//! 47.398 8.545
//! 47.398 8.546
//! end
//! ```

use std::fs;
use std::io;
use std::path::Path;

use strato_core::geo;
use strato_core::geofence::FenceContainment;

#[derive(Debug, Clone)]
enum Shape {
    Circle {
        lat: f64,
        lon: f64,
        radius_m: f64,
    },
    Polygon {
        vertices: Vec<(f64, f64)>,
    },
}

/// Inclusion fence built from circles and polygons.
///
/// A point is inside when at least one shape contains it (or no shape is
/// loaded at all).
#[derive(Debug, Clone, Default)]
pub struct SimpleFence {
    shapes: Vec<Shape>,
    /// Maximum altitude AMSL, `None` = unlimited.
    max_alt: Option<f32>,
}

impl SimpleFence {
    pub fn new() -> Self {
        Self::default()
    }

    /// A circular inclusion fence.
    pub fn circle(lat: f64, lon: f64, radius_m: f64) -> Self {
        Self {
            shapes: vec![Shape::Circle { lat, lon, radius_m }],
            max_alt: None,
        }
    }

    /// A polygon inclusion fence from vertices `(lat, lon)`.
    pub fn polygon(vertices: Vec<(f64, f64)>) -> Self {
        Self {
            shapes: vec![Shape::Polygon { vertices }],
            max_alt: None,
        }
    }

    pub fn with_max_altitude(mut self, alt: f32) -> Self {
        self.max_alt = Some(alt);
        self
    }

    /// Load shapes from a fence file.
    pub fn load_from_file(path: &Path) -> io::Result<Self> {
        let content = fs::read_to_string(path)?;
        let mut fence = Self::new();
        let mut polygon: Option<Vec<(f64, f64)>> = None;

        for line in content.lines() {
            let line = line.trim();
            if line.is_empty() || line.starts_with('#') {
                continue;
            }
            let fields: Vec<&str> = line.split_whitespace().collect();

            match (polygon.as_mut(), fields[0]) {
                (None, "circle") if fields.len() == 4 => {
                    let parse = |s: &str| {
                        s.parse::<f64>()
                            .map_err(|e| io::Error::new(io::ErrorKind::InvalidData, e))
                    };
                    fence.shapes.push(Shape::Circle {
                        lat: parse(fields[1])?,
                        lon: parse(fields[2])?,
                        radius_m: parse(fields[3])?,
                    });
                }
                (None, "polygon") => {
                    polygon = Some(Vec::new());
                }
                (Some(vertices), "end") => {
                    if vertices.len() >= 3 {
                        fence.shapes.push(Shape::Polygon {
                            vertices: polygon.take().unwrap(),
                        });
                    } else {
                        return Err(io::Error::new(
                            io::ErrorKind::InvalidData,
                            "polygon needs at least 3 vertices",
                        ));
                    }
                }
                (Some(vertices), _) if fields.len() == 2 => {
                    let lat = fields[0]
                        .parse::<f64>()
                        .map_err(|e| io::Error::new(io::ErrorKind::InvalidData, e))?;
                    let lon = fields[1]
                        .parse::<f64>()
                        .map_err(|e| io::Error::new(io::ErrorKind::InvalidData, e))?;
                    vertices.push((lat, lon));
                }
                _ => {
                    return Err(io::Error::new(
                        io::ErrorKind::InvalidData,
                        format!("unrecognized fence line: {line}"),
                    ));
                }
            }
        }

        if polygon.is_some() {
            return Err(io::Error::new(
                io::ErrorKind::InvalidData,
                "unterminated polygon block",
            ));
        }

        Ok(fence)
    }

    pub fn shape_count(&self) -> usize {
        self.shapes.len()
    }
}

/// Ray-casting point-in-polygon on lat/lon treated as planar coordinates
/// (fences are small compared to the Earth).
fn point_in_polygon(lat: f64, lon: f64, vertices: &[(f64, f64)]) -> bool {
    let mut inside = false;
    let mut j = vertices.len() - 1;
    for i in 0..vertices.len() {
        let (lat_i, lon_i) = vertices[i];
        let (lat_j, lon_j) = vertices[j];
        if ((lon_i > lon) != (lon_j > lon))
            && (lat < (lat_j - lat_i) * (lon - lon_i) / (lon_j - lon_i) + lat_i)
        {
            inside = !inside;
        }
        j = i;
    }
    inside
}

impl FenceContainment for SimpleFence {
    fn has_fence(&self) -> bool {
        !self.shapes.is_empty() || self.max_alt.is_some()
    }

    fn inside(&self, lat: f64, lon: f64, alt: f32) -> bool {
        if let Some(max_alt) = self.max_alt {
            if alt > max_alt {
                return false;
            }
        }
        if self.shapes.is_empty() {
            return true;
        }
        self.shapes.iter().any(|shape| match shape {
            Shape::Circle {
                lat: clat,
                lon: clon,
                radius_m,
            } => geo::distance(lat, lon, *clat, *clon) < *radius_m,
            Shape::Polygon { vertices } => point_in_polygon(lat, lon, vertices),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_fence_allows_everything() {
        let fence = SimpleFence::new();
        assert!(!fence.has_fence());
        assert!(fence.inside(47.0, 8.0, 500.0));
    }

    #[test]
    fn circle_containment() {
        let fence = SimpleFence::circle(47.0, 8.0, 150.0);
        assert!(fence.inside(47.0, 8.0, 500.0));
        // ~111 m north: inside
        assert!(fence.inside(47.001, 8.0, 500.0));
        // ~222 m north: outside
        assert!(!fence.inside(47.002, 8.0, 500.0));
    }

    #[test]
    fn polygon_containment() {
        let fence = SimpleFence::polygon(vec![
            (47.000, 8.000),
            (47.010, 8.000),
            (47.010, 8.010),
            (47.000, 8.010),
        ]);
        assert!(fence.inside(47.005, 8.005, 500.0));
        assert!(!fence.inside(47.015, 8.005, 500.0));
        assert!(!fence.inside(47.005, 8.015, 500.0));
    }

    #[test]
    fn max_altitude() {
        let fence = SimpleFence::circle(47.0, 8.0, 1000.0).with_max_altitude(600.0);
        assert!(fence.inside(47.0, 8.0, 500.0));
        assert!(!fence.inside(47.0, 8.0, 650.0));
    }

    #[test]
    fn file_loader() {
        let dir = std::env::temp_dir().join("strato_fence_test");
        std::fs::create_dir_all(&dir).unwrap();
        let path = dir.join("fence.txt");
        std::fs::write(
            &path,
            "# test fence\ncircle 47.0 8.0 100\npolygon\n47.0 8.0\n47.01 8.0\n47.01 8.01\nend\n",
        )
        .unwrap();

        let fence = SimpleFence::load_from_file(&path).unwrap();
        assert_eq!(fence.shape_count(), 2);
        assert!(fence.inside(47.0, 8.0, 500.0));
    }

    #[test]
    fn file_loader_rejects_garbage() {
        let dir = std::env::temp_dir().join("strato_fence_test_bad");
        std::fs::create_dir_all(&dir).unwrap();
        let path = dir.join("fence.txt");
        std::fs::write(&path, "triangle 1 2 3\n").unwrap();
        assert!(SimpleFence::load_from_file(&path).is_err());
    }
}
