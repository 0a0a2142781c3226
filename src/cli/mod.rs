//! scene2gltf CLI - converts scene dumps into glTF 2.0 assets

use std::fs;
use std::path::PathBuf;
use std::str::FromStr;

use anyhow::Context;
use clap::{Parser, ValueEnum};

use crate::convert::{ConvertOptions, convert_scene_to_file};
use crate::scene::Scene;

/// Output sections that can be skipped.
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum ExcludeArg {
    /// Scene hierarchy: meshes, skins, materials, cameras
    Scene,
    /// Animations
    Animation,
}

/// Animation window given as `start,duration` in seconds.
#[derive(Debug, Clone, Copy)]
pub struct TimeRangeArg {
    pub start: f32,
    pub duration: f32,
}

impl FromStr for TimeRangeArg {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let (start, duration) = s
            .split_once(',')
            .ok_or_else(|| format!("invalid time range '{s}', expected 'start,duration'"))?;
        let parse = |part: &str, what: &str| {
            part.trim()
                .parse::<f32>()
                .map_err(|_| format!("invalid {what} '{part}' in time range"))
        };
        Ok(Self {
            start: parse(start, "start")?,
            duration: parse(duration, "duration")?,
        })
    }
}

#[derive(Parser)]
#[command(name = "scene2gltf")]
#[command(about = "Convert scene dumps to glTF 2.0 (.gltf + .bin, or .glb)", long_about = None)]
#[command(version)]
struct Cli {
    /// Input scene file (JSON scene dump)
    source: PathBuf,

    /// Output path; defaults to the input name with a .gltf or .glb extension
    #[arg(short, long)]
    output: Option<PathBuf>,

    /// Skip parts of the output (repeatable)
    #[arg(short, long, value_enum)]
    exclude: Vec<ExcludeArg>,

    /// Animation window as 'start,duration' in seconds
    #[arg(short, long)]
    timerange: Option<TimeRangeArg>,

    /// Animation sampling rate in frames per second
    #[arg(short, long, default_value_t = 20.0)]
    framerate: f32,

    /// Evaluate static transforms at this time instead of the rest pose
    #[arg(short, long)]
    pose: Option<f32>,

    /// Quantize float vertex attributes to 16-bit
    #[arg(short, long)]
    quantize: bool,

    /// Write a single binary GLB container with embedded images
    #[arg(short, long)]
    binary: bool,

    /// Pretty-print the JSON document (ignored with --binary)
    #[arg(long)]
    beautify: bool,

    /// Renormalize joint weights after capping influences at 4
    #[arg(long)]
    normalize_weights: bool,
}

impl Cli {
    fn options(&self) -> ConvertOptions {
        let mut options = ConvertOptions {
            exclude_scene: self.exclude.contains(&ExcludeArg::Scene),
            exclude_animation: self.exclude.contains(&ExcludeArg::Animation),
            pose_time: self.pose,
            quantize: self.quantize,
            binary: self.binary,
            beautify: self.beautify,
            normalize_weights: self.normalize_weights,
            ..ConvertOptions::default()
        };
        if self.framerate > 0.0 {
            options.sample_rate = 1.0 / self.framerate;
        }
        if let Some(range) = self.timerange {
            options.start_time = range.start;
            options.duration = range.duration;
        }
        options
    }

    fn output_path(&self) -> PathBuf {
        match &self.output {
            Some(path) => path.clone(),
            None => self
                .source
                .with_extension(if self.binary { "glb" } else { "gltf" }),
        }
    }
}

/// Run the scene2gltf CLI
pub fn run_cli() -> anyhow::Result<()> {
    // Setup logging
    tracing_subscriber::fmt::init();

    let cli = Cli::parse();

    let json = fs::read_to_string(&cli.source)
        .with_context(|| format!("reading scene file {}", cli.source.display()))?;
    let mut scene: Scene = serde_json::from_str(&json)
        .with_context(|| format!("parsing scene file {}", cli.source.display()))?;
    if scene.base_dir.is_none() {
        scene.base_dir = cli.source.parent().map(PathBuf::from);
    }

    let output = cli.output_path();
    convert_scene_to_file(&scene, &cli.options(), &output)
        .with_context(|| format!("writing {}", output.display()))?;

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn time_range_parses_start_and_duration() {
        let range: TimeRangeArg = "0.5, 12".parse().unwrap();
        assert_eq!(range.start, 0.5);
        assert_eq!(range.duration, 12.0);
    }

    #[test]
    fn malformed_time_range_is_rejected() {
        assert!("12".parse::<TimeRangeArg>().is_err());
        assert!("a,b".parse::<TimeRangeArg>().is_err());
    }
}
