//! SVG dumps of filled regions for visual inspection.

use std::fs;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicUsize, Ordering};

use octofill_math::{scale, Point2};

use crate::fill::FillObserver;
use crate::path::{ExPolygon, Polyline};

/// Length removed from both ends of every drawn segment (mm), so that
/// touching segments stay distinguishable.
pub const SHRINK_LENGTH: f64 = 0.4;

/// Render `region` and `polylines` as a standalone SVG document.
///
/// Coordinates are in millimetres with Y pointing up.
pub fn render_svg(region: &ExPolygon, polylines: &[Polyline]) -> String {
    let points: Vec<Point2> = region
        .boundaries()
        .flat_map(|p| p.points.iter())
        .chain(polylines.iter().flat_map(|p| p.points.iter()))
        .map(|p| p.to_point2())
        .collect();

    let (mut min, mut max) = (Point2::new(0.0, 0.0), Point2::new(0.0, 0.0));
    if let Some(first) = points.first() {
        min = *first;
        max = *first;
        for p in &points {
            min = min.inf(p);
            max = max.sup(p);
        }
    }
    let margin = 1.0;
    let (width, height) = (max.x - min.x + 2.0 * margin, max.y - min.y + 2.0 * margin);

    let mut svg = format!(
        r#"<svg xmlns="http://www.w3.org/2000/svg" width="{width:.3}mm" height="{height:.3}mm" viewBox="0 0 {width:.4} {height:.4}">
  <g transform="translate({:.4},{:.4}) scale(1,-1)">
"#,
        margin - min.x,
        margin + max.y,
    );

    for polygon in region.boundaries() {
        let mut path = String::new();
        for (i, p) in polygon.points.iter().map(|p| p.to_point2()).enumerate() {
            let cmd = if i == 0 { "M" } else { " L" };
            path.push_str(&format!("{cmd} {:.4} {:.4}", p.x, p.y));
        }
        path.push_str(" Z");
        svg.push_str(&format!(
            "    <path d=\"{path}\" fill=\"none\" stroke=\"#2d5986\" stroke-width=\"0.1\"/>\n"
        ));
    }

    let shrink = scale(SHRINK_LENGTH) as f64;
    for line in polylines.iter().flat_map(|p| p.lines()) {
        let length = line.length();
        if length <= 2.0 * shrink {
            continue;
        }
        let (a, b) = (line.a.to_point2(), line.b.to_point2());
        let t = shrink / length;
        let from = a + (b - a) * t;
        let to = b - (b - a) * t;
        svg.push_str(&format!(
            "    <line x1=\"{:.4}\" y1=\"{:.4}\" x2=\"{:.4}\" y2=\"{:.4}\" stroke=\"#d94a4a\" stroke-width=\"0.1\"/>\n",
            from.x, from.y, to.x, to.y
        ));
    }

    svg.push_str("  </g>\n</svg>\n");
    svg
}

/// Observer writing every fill to `adaptive-fill-<n>.svg` in a directory.
#[derive(Debug)]
pub struct SvgDump {
    dir: PathBuf,
    counter: AtomicUsize,
}

impl SvgDump {
    /// Dump into `dir`, created on first write.
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self {
            dir: dir.into(),
            counter: AtomicUsize::new(0),
        }
    }

    /// Output directory.
    pub fn dir(&self) -> &Path {
        &self.dir
    }

    /// Number of dumps attempted so far.
    pub fn count(&self) -> usize {
        self.counter.load(Ordering::Relaxed)
    }

    fn write(&self, path: &Path, contents: &str) -> std::io::Result<()> {
        fs::create_dir_all(&self.dir)?;
        fs::write(path, contents)
    }
}

impl FillObserver for SvgDump {
    fn on_fill(&self, z: f64, region: &ExPolygon, polylines: &[Polyline]) {
        let n = self.counter.fetch_add(1, Ordering::Relaxed);
        let path = self.dir.join(format!("adaptive-fill-{n}.svg"));
        if let Err(err) = self.write(&path, &render_svg(region, polylines)) {
            tracing::warn!(path = %path.display(), z, %err, "failed to write fill dump");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use octofill_math::Point;

    use crate::path::Polygon;

    fn region() -> ExPolygon {
        ExPolygon::new(
            Polygon::new_scale(&[(0.0, 0.0), (10.0, 0.0), (10.0, 10.0), (0.0, 10.0)]),
            Vec::new(),
        )
    }

    #[test]
    fn test_render_shrinks_lines() {
        let lines = vec![
            Polyline::new(vec![Point::new_scale(1.0, 5.0), Point::new_scale(9.0, 5.0)]),
            // Too short to survive shrinking.
            Polyline::new(vec![Point::new_scale(1.0, 1.0), Point::new_scale(1.5, 1.0)]),
        ];
        let svg = render_svg(&region(), &lines);
        assert!(svg.starts_with("<svg"));
        assert_eq!(svg.matches("<path").count(), 1);
        assert_eq!(svg.matches("<line").count(), 1);
        assert!(svg.contains("x1=\"1.4000\""));
        assert!(svg.contains("x2=\"8.6000\""));
    }

    #[test]
    fn test_dump_writes_numbered_files() {
        let dir = std::env::temp_dir().join(format!("octofill-svg-{}", std::process::id()));
        let dump = SvgDump::new(&dir);
        dump.on_fill(0.2, &region(), &[]);
        dump.on_fill(0.4, &region(), &[]);
        assert_eq!(dump.count(), 2);
        assert!(dir.join("adaptive-fill-0.svg").is_file());
        assert!(dir.join("adaptive-fill-1.svg").is_file());
        let _ = fs::remove_dir_all(&dir);
    }

    #[test]
    fn test_dump_failure_is_not_fatal() {
        let file = std::env::temp_dir().join(format!("octofill-svg-file-{}", std::process::id()));
        fs::write(&file, "").unwrap();
        // A regular file cannot hold dumps.
        let dump = SvgDump::new(&file);
        dump.on_fill(0.2, &region(), &[]);
        assert_eq!(dump.count(), 1);
        let _ = fs::remove_file(&file);
    }
}
