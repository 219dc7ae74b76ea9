use crate::error::SimError;
use anyhow::Context;
use helpers::general::wrap_degrees;
use serde::{Deserialize, Serialize};
use std::f64::consts::PI;
use std::fs::OpenOptions;
use std::path::{Path, PathBuf};

/// Point in track coordinates (m).
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Waypoint {
    pub x: f64,
    pub y: f64,
}

impl Waypoint {
    pub fn new(x: f64, y: f64) -> Waypoint {
        Waypoint { x, y }
    }

    pub fn distance(&self, other: &Waypoint) -> f64 {
        ((other.x - self.x).powi(2) + (other.y - self.y).powi(2)).sqrt()
    }

    pub fn is_finite(&self) -> bool {
        self.x.is_finite() && self.y.is_finite()
    }
}

/// Row of a centreline file.
/// * `x_m`, `y_m` - (m) Centreline coordinates
/// * `w_tr_left_m`, `w_tr_right_m` - (m) Track width left and right of the centreline
#[derive(Debug, Deserialize, Clone)]
pub struct CsvTrackEl {
    pub x_m: f64,
    pub y_m: f64,
    pub w_tr_left_m: f64,
    pub w_tr_right_m: f64,
}

/// Immutable closed-loop track. The racing line runs from waypoint 0 through all waypoints and
/// back to waypoint 0; waypoint 0 is the start/finish line.
///
/// * `id` - Track identifier as used in race configurations
/// * `width` - (m) Total track width
/// * `length` - (m) Length of the racing line
#[derive(Debug, Clone)]
pub struct Track {
    pub id: String,
    pub width: f64,
    pub length: f64,
    waypoints: Vec<Waypoint>,
    s_cum: Vec<f64>,
    curvature: Vec<f64>,
}

impl Track {
    pub fn new(id: &str, waypoints: Vec<Waypoint>, width: f64) -> Result<Track, SimError> {
        let n = waypoints.len();

        if n < 3 {
            return Err(SimError::config(format!(
                "Track {} needs at least 3 waypoints, got {}!",
                id, n
            )));
        }
        if !(width.is_finite() && width > 0.0) {
            return Err(SimError::config(format!(
                "Track {} has an invalid width of {}m!",
                id, width
            )));
        }
        if let Some(idx) = waypoints.iter().position(|wp| !wp.is_finite()) {
            return Err(SimError::config(format!(
                "Track {} has a non-finite waypoint at index {}!",
                id, idx
            )));
        }

        // segment lengths, including the closing segment back to the start
        let mut seg_len = vec![0.0; n];
        for i in 0..n {
            seg_len[i] = waypoints[i].distance(&waypoints[(i + 1) % n]);
            if seg_len[i] <= f64::EPSILON {
                return Err(SimError::config(format!(
                    "Track {} has duplicate consecutive waypoints at index {}!",
                    id, i
                )));
            }
        }

        let mut s_cum = vec![0.0; n + 1];
        for i in 0..n {
            s_cum[i + 1] = s_cum[i] + seg_len[i];
        }
        let length = s_cum[n];

        // discrete curvature: turning angle at a waypoint per metre of adjacent track
        let mut curvature = vec![0.0; n];
        for i in 0..n {
            let prev = &waypoints[(i + n - 1) % n];
            let cur = &waypoints[i];
            let next = &waypoints[(i + 1) % n];

            let prev_dx = cur.x - prev.x;
            let prev_dy = cur.y - prev.y;
            let next_dx = next.x - cur.x;
            let next_dy = next.y - cur.y;

            let norm_prev = seg_len[(i + n - 1) % n];
            let norm_next = seg_len[i];

            let dot = prev_dx * next_dx + prev_dy * next_dy;
            let cos_theta = (dot / (norm_prev * norm_next)).clamp(-1.0, 1.0);
            let theta = cos_theta.acos();

            let ds = (norm_prev + norm_next) / 2.0;
            curvature[i] = theta / ds;
        }

        Ok(Track {
            id: id.to_owned(),
            width,
            length,
            waypoints,
            s_cum,
            curvature,
        })
    }

    /// from_csv reads a centreline file; the track width is the mean total width of all rows.
    pub fn from_csv(id: &str, trackfile_path: &Path) -> anyhow::Result<Track> {
        let fh = OpenOptions::new()
            .read(true)
            .open(trackfile_path)
            .context(format!(
                "Failed to open track file {}!",
                trackfile_path.display()
            ))?;

        let mut csv_reader = csv::Reader::from_reader(&fh);
        let mut csv_track_cl: Vec<CsvTrackEl> = vec![];

        for result in csv_reader.deserialize() {
            let csv_track_el: CsvTrackEl = result.context(format!(
                "Failed to parse track file {}!",
                trackfile_path.display()
            ))?;
            csv_track_cl.push(csv_track_el);
        }

        if csv_track_cl.is_empty() {
            anyhow::bail!("Track file {} is empty!", trackfile_path.display());
        }

        let width = csv_track_cl
            .iter()
            .map(|el| el.w_tr_left_m + el.w_tr_right_m)
            .sum::<f64>()
            / csv_track_cl.len() as f64;

        let waypoints = csv_track_cl
            .iter()
            .map(|el| Waypoint::new(el.x_m, el.y_m))
            .collect();

        Ok(Track::new(id, waypoints, width)?)
    }

    fn segment(&self, i: usize) -> (Waypoint, Waypoint, f64) {
        let n = self.waypoints.len();
        (
            self.waypoints[i],
            self.waypoints[(i + 1) % n],
            self.s_cum[i + 1] - self.s_cum[i],
        )
    }

    /// Segment index and position within the segment ([0, 1]) for a lap fraction.
    fn locate(&self, fraction: f64) -> (usize, f64) {
        let n = self.waypoints.len();
        let s = fraction.rem_euclid(1.0) * self.length;
        let idx = (self.s_cum.partition_point(|&c| c <= s) - 1).min(n - 1);
        let (_, _, len) = self.segment(idx);
        (idx, ((s - self.s_cum[idx]) / len).clamp(0.0, 1.0))
    }

    /// progress_at projects a position onto the nearest segment of the racing line and returns
    /// the lap fraction in [0, 1). Equidistant segments resolve to the lowest index, a point on
    /// the seam maps to 0.
    pub fn progress_at(&self, position: &Waypoint) -> f64 {
        let mut best_idx = 0;
        let mut best_t = 0.0;
        let mut best_d2 = f64::INFINITY;

        for i in 0..self.waypoints.len() {
            let (a, b, len) = self.segment(i);
            let dx = b.x - a.x;
            let dy = b.y - a.y;
            let t = (((position.x - a.x) * dx + (position.y - a.y) * dy) / (len * len))
                .clamp(0.0, 1.0);
            let px = a.x + t * dx;
            let py = a.y + t * dy;
            let d2 = (position.x - px).powi(2) + (position.y - py).powi(2);

            if d2 < best_d2 {
                best_d2 = d2;
                best_idx = i;
                best_t = t;
            }
        }

        let (_, _, len) = self.segment(best_idx);
        let frac = (self.s_cum[best_idx] + best_t * len) / self.length;

        if (0.0..1.0).contains(&frac) {
            frac
        } else {
            0.0
        }
    }

    /// lap_completed is true when the fraction wrapped forward past the start/finish line. A
    /// backward step across the seam (new slightly above prev after wrapping) is not a lap.
    pub fn lap_completed(&self, prev_fraction: f64, new_fraction: f64) -> bool {
        new_fraction < prev_fraction && prev_fraction - new_fraction > 0.5
    }

    /// point_at returns the centreline position and the tangent heading (deg in [0, 360)) at a
    /// lap fraction. Fractions outside [0, 1) are wrapped.
    pub fn point_at(&self, fraction: f64) -> (Waypoint, f64) {
        let (idx, t) = self.locate(fraction);
        let (a, b, _) = self.segment(idx);
        let dx = b.x - a.x;
        let dy = b.y - a.y;

        (
            Waypoint::new(a.x + t * dx, a.y + t * dy),
            wrap_degrees(dy.atan2(dx).to_degrees()),
        )
    }

    /// offset_point returns the position `lateral` metres left of the centreline (negative:
    /// right) at a lap fraction, together with the tangent heading.
    pub fn offset_point(&self, fraction: f64, lateral: f64) -> (Waypoint, f64) {
        let (p, heading) = self.point_at(fraction);
        let h = heading.to_radians();
        (
            Waypoint::new(p.x - lateral * h.sin(), p.y + lateral * h.cos()),
            heading,
        )
    }

    /// curvature_at returns the curvature (rad/m) at a lap fraction, linearly blended between the
    /// two waypoints of the surrounding segment.
    pub fn curvature_at(&self, fraction: f64) -> f64 {
        let n = self.waypoints.len();
        let (idx, t) = self.locate(fraction);
        self.curvature[idx] * (1.0 - t) + self.curvature[(idx + 1) % n] * t
    }

    pub fn distance_to_centerline(&self, position: &Waypoint) -> f64 {
        let (p, _) = self.point_at(self.progress_at(position));
        p.distance(position)
    }

    // ---------------------------------------------------------------------------------------------
    // BUILT-IN TRACKS -----------------------------------------------------------------------------
    // ---------------------------------------------------------------------------------------------

    pub const BUILTIN_IDS: [&'static str; 3] = ["monaco", "oval", "square"];

    /// builtin returns one of the tracks compiled into the engine.
    pub fn builtin(id: &str) -> Option<Track> {
        let (waypoints, width) = match id {
            "monaco" => (
                vec![
                    Waypoint::new(250.0, 250.0),
                    Waypoint::new(1000.0, 200.0),
                    Waypoint::new(1250.0, 375.0),
                    Waypoint::new(1300.0, 750.0),
                    Waypoint::new(1000.0, 1000.0),
                    Waypoint::new(250.0, 1050.0),
                    Waypoint::new(125.0, 625.0),
                ],
                12.0,
            ),
            "oval" => {
                let no_points = 24;
                let waypoints = (0..no_points)
                    .map(|i| {
                        let phi = 2.0 * PI * i as f64 / no_points as f64;
                        Waypoint::new(300.0 * phi.cos(), 150.0 * phi.sin())
                    })
                    .collect();
                (waypoints, 15.0)
            }
            "square" => (
                vec![
                    Waypoint::new(0.0, 0.0),
                    Waypoint::new(100.0, 0.0),
                    Waypoint::new(100.0, 100.0),
                    Waypoint::new(0.0, 100.0),
                ],
                10.0,
            ),
            _ => return None,
        };

        Track::new(id, waypoints, width).ok()
    }
}

/// TrackCatalog resolves track ids at race start: the built-in tracks first, then
/// `<tracks_dir>/<id>.csv`.
#[derive(Debug, Clone, Default)]
pub struct TrackCatalog {
    tracks_dir: Option<PathBuf>,
}

/// Track ids name a file inside the tracks directory, so only plain names are accepted.
fn is_valid_track_id(id: &str) -> bool {
    !id.is_empty()
        && id
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || c == '_' || c == '-')
}

impl TrackCatalog {
    pub fn new() -> TrackCatalog {
        TrackCatalog::default()
    }

    pub fn with_tracks_dir(tracks_dir: &Path) -> TrackCatalog {
        TrackCatalog {
            tracks_dir: Some(tracks_dir.to_path_buf()),
        }
    }

    pub fn load(&self, id: &str) -> Result<Track, SimError> {
        if !is_valid_track_id(id) {
            return Err(SimError::config(format!(
                "Invalid track id {:?}, only letters, digits, '_' and '-' are allowed!",
                id
            )));
        }
        if let Some(track) = Track::builtin(id) {
            return Ok(track);
        }
        if let Some(dir) = &self.tracks_dir {
            let mut trackfile_path = dir.to_path_buf();
            trackfile_path.push(id);
            trackfile_path.set_extension("csv");

            if trackfile_path.is_file() {
                return Track::from_csv(id, &trackfile_path).map_err(|e| {
                    log::warn!("Could not load track {}: {:#}", id, e);
                    SimError::config(format!("Track {} could not be read!", id))
                });
            }
        }
        Err(SimError::config(format!("Unknown track id {}!", id)))
    }
}
