// SPDX-License-Identifier: MIT OR Apache-2.0
//! Animation curves: keyed float values interpolated over frames.

use plexus_graph::{FingerprintHasher, GraphError, Result};
use serde::{Deserialize, Serialize};

/// Frames closer than this address the same key
pub const KEY_TOLERANCE: f32 = 0.001;

/// Interpolation from a key to the next one
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
pub enum Interpolation {
    /// Hold this key's value until the next key
    Constant,
    /// Jump to the next key's value right after this key
    ConstantNext,
    /// Straight line to the next key
    #[default]
    Linear,
    /// Cubic bezier shaped by the key tangents
    Bezier,
    /// Hermite spline with Catmull-Rom slopes
    Smooth,
}

impl Interpolation {
    fn tag(self) -> u8 {
        match self {
            Self::Constant => 0,
            Self::ConstantNext => 1,
            Self::Linear => 2,
            Self::Bezier => 3,
            Self::Smooth => 4,
        }
    }
}

/// A key on a curve
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Key {
    /// Frame of the key
    pub frame: f32,
    /// Value at the key
    pub value: f32,
    /// Interpolation to the next key
    pub interpolation: Interpolation,
    /// Incoming bezier handle as `[frame, value]` offset from the key
    pub in_tangent: Option<[f32; 2]>,
    /// Outgoing bezier handle as `[frame, value]` offset from the key
    pub out_tangent: Option<[f32; 2]>,
}

impl Key {
    /// Create a linear key
    pub fn new(frame: f32, value: f32) -> Self {
        Self {
            frame,
            value,
            interpolation: Interpolation::Linear,
            in_tangent: None,
            out_tangent: None,
        }
    }

    /// Set interpolation mode
    pub fn with_interpolation(mut self, interpolation: Interpolation) -> Self {
        self.interpolation = interpolation;
        self
    }

    /// Set tangents for bezier interpolation
    pub fn with_tangents(mut self, in_tangent: [f32; 2], out_tangent: [f32; 2]) -> Self {
        self.in_tangent = Some(in_tangent);
        self.out_tangent = Some(out_tangent);
        self
    }

    fn hash_into(&self, hasher: &mut FingerprintHasher) {
        hasher
            .append_f32(self.frame)
            .append_f32(self.value)
            .append_tag(self.interpolation.tag());
        for tangent in [self.in_tangent, self.out_tangent] {
            match tangent {
                Some(tangent) => hasher.append_bool(true).append_f32s(&tangent),
                None => hasher.append_bool(false),
            };
        }
    }
}

/// Interpolation utilities
pub(crate) struct Interpolate;

impl Interpolate {
    pub(crate) fn lerp(a: f32, b: f32, t: f32) -> f32 {
        a + (b - a) * t
    }

    pub(crate) fn bezier(p0: f32, p1: f32, p2: f32, p3: f32, t: f32) -> f32 {
        let mt = 1.0 - t;
        p0 * mt * mt * mt + 3.0 * p1 * mt * mt * t + 3.0 * p2 * mt * t * t + p3 * t * t * t
    }

    pub(crate) fn hermite(p0: f32, m0: f32, p1: f32, m1: f32, t: f32) -> f32 {
        let t2 = t * t;
        let t3 = t2 * t;

        let h00 = 2.0 * t3 - 3.0 * t2 + 1.0;
        let h10 = t3 - 2.0 * t2 + t;
        let h01 = -2.0 * t3 + 3.0 * t2;
        let h11 = t3 - t2;

        h00 * p0 + h10 * m0 + h01 * p1 + h11 * m1
    }
}

/// Keys sorted by frame
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Curve {
    keys: Vec<Key>,
}

impl Curve {
    /// Create an empty curve
    pub fn new() -> Self {
        Self::default()
    }

    /// Keys in frame order
    pub fn keys(&self) -> &[Key] {
        &self.keys
    }

    /// Number of keys
    pub fn len(&self) -> usize {
        self.keys.len()
    }

    /// Whether the curve has no keys
    pub fn is_empty(&self) -> bool {
        self.keys.is_empty()
    }

    /// Insert a key, replacing and returning any key at the same frame
    pub fn add_key(&mut self, key: Key) -> Option<Key> {
        if let Some(existing) = self.keys.iter_mut().find(|k| (k.frame - key.frame).abs() < KEY_TOLERANCE) {
            return Some(std::mem::replace(existing, key));
        }
        let index = self.keys.partition_point(|k| k.frame < key.frame);
        self.keys.insert(index, key);
        None
    }

    /// Remove the key at `frame`
    pub fn remove_key(&mut self, frame: f32) -> Option<Key> {
        let index = self.keys.iter().position(|k| (k.frame - frame).abs() < KEY_TOLERANCE)?;
        Some(self.keys.remove(index))
    }

    /// Key at `frame`, if any
    pub fn key_at(&self, frame: f32) -> Option<&Key> {
        self.keys.iter().find(|k| (k.frame - frame).abs() < KEY_TOLERANCE)
    }

    /// Last key strictly before `frame`
    pub fn previous_key(&self, frame: f32) -> Option<&Key> {
        self.keys.iter().rev().find(|k| k.frame < frame - KEY_TOLERANCE)
    }

    /// First key strictly after `frame`
    pub fn next_key(&self, frame: f32) -> Option<&Key> {
        self.keys.iter().find(|k| k.frame > frame + KEY_TOLERANCE)
    }

    /// Key nearest to `frame`
    pub fn closest_key(&self, frame: f32) -> Option<&Key> {
        self.keys
            .iter()
            .min_by(|a, b| (a.frame - frame).abs().total_cmp(&(b.frame - frame).abs()))
    }

    /// Value at `frame`. Frames outside the keyed range hold the first or
    /// last value; a NaN frame holds the first value and an empty curve is 0.
    pub fn evaluate(&self, frame: f32) -> f32 {
        let (Some(first), Some(last)) = (self.keys.first(), self.keys.last()) else {
            return 0.0;
        };
        if frame.is_nan() || frame <= first.frame {
            return first.value;
        }
        if frame >= last.frame {
            return last.value;
        }

        let index = self.keys.partition_point(|k| k.frame <= frame);
        let (Some(a), Some(b)) = (index.checked_sub(1).and_then(|i| self.keys.get(i)), self.keys.get(index)) else {
            return first.value;
        };
        let span = b.frame - a.frame;
        if span < KEY_TOLERANCE {
            return b.value;
        }
        let t = (frame - a.frame) / span;

        match a.interpolation {
            Interpolation::Constant => a.value,
            Interpolation::ConstantNext if frame <= a.frame => a.value,
            Interpolation::ConstantNext => b.value,
            Interpolation::Linear => Interpolate::lerp(a.value, b.value, t),
            Interpolation::Bezier => Self::bezier(a, b, frame),
            Interpolation::Smooth => {
                let before = self.keys.get(index.wrapping_sub(2)).unwrap_or(a);
                let after = self.keys.get(index + 1).unwrap_or(b);
                let m0 = Self::slope(before, b) * span;
                let m1 = Self::slope(a, after) * span;
                Interpolate::hermite(a.value, m0, b.value, m1, t)
            }
        }
    }

    fn slope(from: &Key, to: &Key) -> f32 {
        let span = to.frame - from.frame;
        if span.abs() < KEY_TOLERANCE {
            0.0
        } else {
            (to.value - from.value) / span
        }
    }

    /// Bezier segment from `a` to `b`, solved for the parameter whose frame
    /// is `frame`. Handle frames are clamped into the segment so frame is
    /// monotonic in the parameter.
    fn bezier(a: &Key, b: &Key, frame: f32) -> f32 {
        let span = b.frame - a.frame;
        let third = [span / 3.0, (b.value - a.value) / 3.0];
        let out = a.out_tangent.unwrap_or(third);
        let incoming = b.in_tangent.unwrap_or([-third[0], -third[1]]);

        let x = [
            a.frame,
            (a.frame + out[0]).clamp(a.frame, b.frame),
            (b.frame + incoming[0]).clamp(a.frame, b.frame),
            b.frame,
        ];
        let y = [a.value, a.value + out[1], b.value + incoming[1], b.value];

        let (mut lo, mut hi) = (0.0_f32, 1.0_f32);
        for _ in 0..32 {
            let mid = 0.5 * (lo + hi);
            if Interpolate::bezier(x[0], x[1], x[2], x[3], mid) < frame {
                lo = mid;
            } else {
                hi = mid;
            }
        }
        Interpolate::bezier(y[0], y[1], y[2], y[3], 0.5 * (lo + hi))
    }

    /// Append the keys to a fingerprint
    pub fn hash_into(&self, hasher: &mut FingerprintHasher) {
        hasher.append_u64(self.keys.len() as u64);
        for key in &self.keys {
            key.hash_into(hasher);
        }
    }

    /// Serialize to a RON string
    pub fn to_ron(&self) -> Result<String> {
        ron::ser::to_string_pretty(self, ron::ser::PrettyConfig::default())
            .map_err(|e| GraphError::custom(format!("Failed to serialize curve: {e}")))
    }

    /// Parse from a RON string, sorting the keys by frame
    pub fn from_ron(content: &str) -> Result<Self> {
        let mut curve: Self =
            ron::from_str(content).map_err(|e| GraphError::custom(format!("Failed to parse curve: {e}")))?;
        curve.keys.sort_by(|a, b| a.frame.total_cmp(&b.frame));
        Ok(curve)
    }
}

impl FromIterator<Key> for Curve {
    fn from_iter<I: IntoIterator<Item = Key>>(iter: I) -> Self {
        let mut curve = Self::new();
        for key in iter {
            curve.add_key(key);
        }
        curve
    }
}
