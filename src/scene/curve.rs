//! Sampled transform curves.
//!
//! The animation exporter never reads source keyframes directly; it asks for
//! the curve's valid time interval and for the composed local TRS at
//! arbitrary times, then resamples at a fixed rate. These types provide
//! exactly that interface over a plain keyframe list.

use glam::{Quat, Vec3};
use serde::{Deserialize, Serialize};

/// Values that can be interpolated between two keys.
pub trait Interpolate: Copy {
    fn interpolate(a: Self, b: Self, t: f32) -> Self;
}

impl Interpolate for Vec3 {
    fn interpolate(a: Self, b: Self, t: f32) -> Self {
        a.lerp(b, t)
    }
}

impl Interpolate for Quat {
    fn interpolate(a: Self, b: Self, t: f32) -> Self {
        a.slerp(b, t)
    }
}

/// A curve as a list of `(time, value)` keys sorted by time.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SampledCurve<T> {
    pub keys: Vec<(f32, T)>,
}

impl<T: Interpolate> SampledCurve<T> {
    /// The curve's valid `(start, end)` interval, if it has any keys.
    pub fn span(&self) -> Option<(f32, f32)> {
        let first = self.keys.first()?;
        let last = self.keys.last()?;
        Some((first.0, last.0))
    }

    /// Evaluate at `time`, clamping outside the key range.
    pub fn evaluate(&self, time: f32) -> Option<T> {
        let (first, last) = (self.keys.first()?, self.keys.last()?);
        if time <= first.0 {
            return Some(first.1);
        }
        if time >= last.0 {
            return Some(last.1);
        }
        // keys are sorted; find the segment containing `time`
        let next = self.keys.iter().position(|(t, _)| *t > time)?;
        let (t0, v0) = self.keys[next - 1];
        let (t1, v1) = self.keys[next];
        let dt = t1 - t0;
        if dt <= f32::EPSILON {
            return Some(v0);
        }
        Some(T::interpolate(v0, v1, (time - t0) / dt))
    }
}

/// The per-channel transform curves of one node.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct TransformCurves {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub translation: Option<SampledCurve<Vec3>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub rotation: Option<SampledCurve<Quat>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub scale: Option<SampledCurve<Vec3>>,
}

impl TransformCurves {
    /// Whether any channel has a source curve.
    pub fn has_any(&self) -> bool {
        self.translation.is_some() || self.rotation.is_some() || self.scale.is_some()
    }

    /// Union time span across the available channel curves.
    pub fn span(&self) -> Option<(f32, f32)> {
        let spans = [
            self.translation.as_ref().and_then(SampledCurve::span),
            self.rotation.as_ref().and_then(SampledCurve::span),
            self.scale.as_ref().and_then(SampledCurve::span),
        ];
        let mut union: Option<(f32, f32)> = None;
        for (start, end) in spans.into_iter().flatten() {
            union = Some(match union {
                Some((s, e)) => (s.min(start), e.max(end)),
                None => (start, end),
            });
        }
        union
    }

    /// Composed local TRS at `time`; channels without a curve fall back to
    /// the node's rest decomposition.
    pub fn evaluate(&self, time: f32, rest: (Vec3, Quat, Vec3)) -> (Vec3, Quat, Vec3) {
        let (rest_t, rest_r, rest_s) = rest;
        let t = self
            .translation
            .as_ref()
            .and_then(|c| c.evaluate(time))
            .unwrap_or(rest_t);
        let r = self
            .rotation
            .as_ref()
            .and_then(|c| c.evaluate(time))
            .unwrap_or(rest_r);
        let s = self
            .scale
            .as_ref()
            .and_then(|c| c.evaluate(time))
            .unwrap_or(rest_s);
        (t, r, s)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn evaluate_interpolates_and_clamps() {
        let curve = SampledCurve {
            keys: vec![(0.0, Vec3::ZERO), (2.0, Vec3::new(2.0, 0.0, 0.0))],
        };
        assert_eq!(curve.evaluate(-1.0), Some(Vec3::ZERO));
        assert_eq!(curve.evaluate(1.0), Some(Vec3::new(1.0, 0.0, 0.0)));
        assert_eq!(curve.evaluate(5.0), Some(Vec3::new(2.0, 0.0, 0.0)));
    }

    #[test]
    fn span_is_union_across_channels() {
        let curves = TransformCurves {
            translation: Some(SampledCurve {
                keys: vec![(1.0, Vec3::ZERO), (3.0, Vec3::ONE)],
            }),
            rotation: None,
            scale: Some(SampledCurve {
                keys: vec![(0.5, Vec3::ONE), (2.0, Vec3::ONE)],
            }),
        };
        assert_eq!(curves.span(), Some((0.5, 3.0)));
    }

    #[test]
    fn missing_channels_fall_back_to_rest() {
        let curves = TransformCurves {
            translation: Some(SampledCurve {
                keys: vec![(0.0, Vec3::X), (1.0, Vec3::X)],
            }),
            rotation: None,
            scale: None,
        };
        let rest = (Vec3::ZERO, Quat::IDENTITY, Vec3::splat(2.0));
        let (t, r, s) = curves.evaluate(0.5, rest);
        assert_eq!(t, Vec3::X);
        assert_eq!(r, Quat::IDENTITY);
        assert_eq!(s, Vec3::splat(2.0));
    }
}
