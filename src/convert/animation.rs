//! Animation resampling and keyframe compression.
//!
//! Each animated node's composed local transform is sampled at a fixed rate
//! over the intersection of the requested window and the node's own curve
//! span, then runs of samples that lie exactly on a linear (or spherical
//! linear, for rotations) interpolation between their neighbors are dropped.
//! The simplifier is a greedy single pass over consecutive sample triples,
//! not a global optimum.

use glam::{Quat, Vec3};

use crate::scene::curve::{Interpolate, TransformCurves};

/// Windows shorter than this emit no animation.
pub const MIN_DURATION: f32 = 1e-5;

/// Per-component tolerance for the midpoint fit test.
pub const FIT_EPSILON: f32 = 1e-6;

/// Animated node path, matching the glTF channel target paths.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ChannelPath {
    Translation,
    Rotation,
    Scale,
}

impl ChannelPath {
    pub fn name(self) -> &'static str {
        match self {
            Self::Translation => "translation",
            Self::Rotation => "rotation",
            Self::Scale => "scale",
        }
    }
}

/// One compressed channel: keyframe times plus flattened values
/// (3 components per key for vectors, 4 for quaternions).
#[derive(Debug, Clone)]
pub struct CompressedChannel {
    pub path: ChannelPath,
    pub times: Vec<f32>,
    pub values: Vec<f32>,
}

trait FitLinear: Interpolate {
    fn near(a: Self, b: Self) -> bool;
    fn flatten(values: &[Self], out: &mut Vec<f32>);
}

impl FitLinear for Vec3 {
    fn near(a: Self, b: Self) -> bool {
        (a - b).abs().max_element() <= FIT_EPSILON
    }

    fn flatten(values: &[Self], out: &mut Vec<f32>) {
        for v in values {
            out.extend(v.to_array());
        }
    }
}

impl FitLinear for Quat {
    fn near(a: Self, b: Self) -> bool {
        (a.x - b.x).abs() <= FIT_EPSILON
            && (a.y - b.y).abs() <= FIT_EPSILON
            && (a.z - b.z).abs() <= FIT_EPSILON
            && (a.w - b.w).abs() <= FIT_EPSILON
    }

    fn flatten(values: &[Self], out: &mut Vec<f32>) {
        for q in values {
            out.extend(q.to_array());
        }
    }
}

/// Drop interior samples that are the interpolation midpoint of their
/// immediate neighbors. The first and last samples are always kept.
fn fit_linear<T: FitLinear>(times: &[f32], values: &[T]) -> (Vec<f32>, Vec<T>) {
    debug_assert_eq!(times.len(), values.len());
    if times.len() <= 2 {
        return (times.to_vec(), values.to_vec());
    }

    let mut kept_times = vec![times[0]];
    let mut kept_values = vec![values[0]];
    for i in 1..times.len() - 1 {
        let midpoint = T::interpolate(values[i - 1], values[i + 1], 0.5);
        if !T::near(values[i], midpoint) {
            kept_times.push(times[i]);
            kept_values.push(values[i]);
        }
    }
    kept_times.push(times[times.len() - 1]);
    kept_values.push(values[values.len() - 1]);
    (kept_times, kept_values)
}

fn channel<T: FitLinear>(path: ChannelPath, times: &[f32], values: &[T]) -> CompressedChannel {
    let (times, values) = fit_linear(times, values);
    let mut flat = Vec::with_capacity(values.len() * 4);
    T::flatten(&values, &mut flat);
    CompressedChannel {
        path,
        times,
        values: flat,
    }
}

/// Resample and compress one node's transform curves.
///
/// Returns `None` when the node has no source curves or the effective window
/// (requested window intersected with the union curve span) is degenerate.
/// Channels without a source curve contribute nothing even though their rest
/// value participates in evaluation.
pub fn compress_node(
    curves: &TransformCurves,
    rest: (Vec3, Quat, Vec3),
    sample_rate: f32,
    window_start: f32,
    window_duration: f32,
) -> Option<Vec<CompressedChannel>> {
    if !curves.has_any() || sample_rate <= 0.0 {
        return None;
    }
    let (span_start, span_end) = curves.span()?;

    let start = span_start.max(window_start);
    let end = span_end.min(window_start + window_duration);
    let duration = end - start;
    if duration <= MIN_DURATION {
        return None;
    }

    // one extra frame so the window end itself is sampled; the last time
    // clamps back onto the end when the rate does not divide the duration
    let frames = (duration / sample_rate).ceil() as usize + 1;

    let mut times = Vec::with_capacity(frames);
    let mut translations = Vec::with_capacity(frames);
    let mut rotations = Vec::with_capacity(frames);
    let mut scales = Vec::with_capacity(frames);
    for i in 0..frames {
        let time = (start + sample_rate * i as f32).min(end);
        let (t, r, s) = curves.evaluate(time, rest);
        times.push(time);
        translations.push(t);
        rotations.push(r);
        scales.push(s);
    }

    let mut channels = Vec::with_capacity(3);
    if curves.translation.is_some() {
        channels.push(channel(ChannelPath::Translation, &times, &translations));
    }
    if curves.rotation.is_some() {
        channels.push(channel(ChannelPath::Rotation, &times, &rotations));
    }
    if curves.scale.is_some() {
        channels.push(channel(ChannelPath::Scale, &times, &scales));
    }
    Some(channels)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::scene::curve::SampledCurve;

    const REST: (Vec3, Quat, Vec3) = (Vec3::ZERO, Quat::IDENTITY, Vec3::ONE);

    fn translation_curve(keys: Vec<(f32, Vec3)>) -> TransformCurves {
        TransformCurves {
            translation: Some(SampledCurve { keys }),
            rotation: None,
            scale: None,
        }
    }

    #[test]
    fn no_curves_emit_nothing() {
        assert!(compress_node(&TransformCurves::default(), REST, 0.05, 0.0, 10.0).is_none());
    }

    #[test]
    fn empty_window_intersection_emits_nothing() {
        let curves = translation_curve(vec![(0.0, Vec3::ZERO), (1.0, Vec3::X)]);
        // window starts after the curve ends
        assert!(compress_node(&curves, REST, 0.05, 5.0, 10.0).is_none());
    }

    #[test]
    fn perfectly_linear_curve_compresses_to_two_samples() {
        let curves = translation_curve(vec![(0.0, Vec3::ZERO), (4.0, Vec3::new(4.0, 0.0, 0.0))]);
        let channels = compress_node(&curves, REST, 1.0, 0.0, 1000.0).unwrap();

        assert_eq!(channels.len(), 1);
        let channel = &channels[0];
        assert_eq!(channel.path, ChannelPath::Translation);
        assert_eq!(channel.times, vec![0.0, 4.0]);
        assert_eq!(channel.values, vec![0.0, 0.0, 0.0, 4.0, 0.0, 0.0]);
    }

    #[test]
    fn single_discontinuity_keeps_three_samples() {
        // linear with a slope change at t=2: samples 0,1,2,6,10
        let curves = translation_curve(vec![
            (0.0, Vec3::ZERO),
            (2.0, Vec3::new(2.0, 0.0, 0.0)),
            (4.0, Vec3::new(10.0, 0.0, 0.0)),
        ]);
        let channels = compress_node(&curves, REST, 1.0, 0.0, 1000.0).unwrap();

        let channel = &channels[0];
        assert_eq!(channel.times, vec![0.0, 2.0, 4.0]);
        assert_eq!(
            channel.values,
            vec![0.0, 0.0, 0.0, 2.0, 0.0, 0.0, 10.0, 0.0, 0.0]
        );
    }

    #[test]
    fn sampling_emits_one_frame_past_the_open_range() {
        // duration 2 at rate 1 yields 3 raw frames (0, 1, 2), one more than
        // the open range, so the window end itself is a keyframe; the curve
        // bends at every sample to defeat the midpoint fit
        let curves = translation_curve(vec![
            (0.0, Vec3::ZERO),
            (1.0, Vec3::new(1.0, 0.0, 0.0)),
            (2.0, Vec3::new(4.0, 0.0, 0.0)),
        ]);
        let channels = compress_node(&curves, REST, 1.0, 0.0, 1000.0).unwrap();

        let channel = &channels[0];
        assert_eq!(channel.times, vec![0.0, 1.0, 2.0]);
        assert_eq!(
            channel.values,
            vec![0.0, 0.0, 0.0, 1.0, 0.0, 0.0, 4.0, 0.0, 0.0]
        );
    }

    #[test]
    fn sample_times_clamp_to_the_window_end() {
        let curves = translation_curve(vec![(0.0, Vec3::ZERO), (2.5, Vec3::X)]);
        let channels = compress_node(&curves, REST, 1.0, 0.0, 1000.0).unwrap();
        let channel = &channels[0];
        // raw samples at 0, 1, 2, and the last clamps from 3 back to 2.5
        assert!(channel.times.iter().all(|&t| t <= 2.5));
        assert_eq!(channel.times.first(), Some(&0.0));
        assert_eq!(channel.times.last(), Some(&2.5));
    }

    #[test]
    fn only_channels_with_source_curves_are_emitted() {
        let curves = TransformCurves {
            translation: Some(SampledCurve {
                keys: vec![(0.0, Vec3::ZERO), (2.0, Vec3::new(0.0, 4.0, 0.0))],
            }),
            rotation: Some(SampledCurve {
                keys: vec![
                    (0.0, Quat::IDENTITY),
                    (2.0, Quat::from_rotation_y(1.0)),
                ],
            }),
            scale: None,
        };
        let channels = compress_node(&curves, REST, 0.5, 0.0, 1000.0).unwrap();
        let paths: Vec<ChannelPath> = channels.iter().map(|c| c.path).collect();
        assert_eq!(paths, vec![ChannelPath::Translation, ChannelPath::Rotation]);
    }

    #[test]
    fn constant_rotation_collapses_to_endpoints() {
        let q = Quat::from_rotation_z(0.3);
        let curves = TransformCurves {
            translation: None,
            rotation: Some(SampledCurve {
                keys: vec![(0.0, q), (5.0, q)],
            }),
            scale: None,
        };
        let channels = compress_node(&curves, REST, 0.5, 0.0, 1000.0).unwrap();
        assert_eq!(channels[0].times.len(), 2);
    }
}
