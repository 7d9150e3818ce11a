//! Media probing via `ffprobe`.
//!
//! The stages only need a handful of facts about a video: its exact frame
//! rate (frame reassembly must reproduce it), its dimensions and duration.

pub mod ffprobe;

use std::fmt;
use std::str::FromStr;

pub use self::ffprobe::probe_video;

/// An exact frame rate `num/den`, always reduced.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct FrameRate {
    num: u32,
    den: u32,
}

impl FrameRate {
    /// Build a reduced rate. `None` if either part is zero.
    pub fn new(num: u32, den: u32) -> Option<Self> {
        Self::from_u64(u64::from(num), u64::from(den))
    }

    fn from_u64(num: u64, den: u64) -> Option<Self> {
        if num == 0 || den == 0 {
            return None;
        }
        let g = gcd(num, den);
        Some(Self {
            num: u32::try_from(num / g).ok()?,
            den: u32::try_from(den / g).ok()?,
        })
    }

    pub fn num(&self) -> u32 {
        self.num
    }

    pub fn den(&self) -> u32 {
        self.den
    }

    pub fn as_f64(&self) -> f64 {
        f64::from(self.num) / f64::from(self.den)
    }

    /// This rate multiplied by `mul / div`, e.g. by `output_frames /
    /// input_frames` after interpolation.
    pub fn scaled(&self, mul: u64, div: u64) -> Option<Self> {
        let num = u64::from(self.num).checked_mul(mul)?;
        let den = u64::from(self.den).checked_mul(div)?;
        let g = gcd(num, den).max(1);
        Self::from_u64(num / g, den / g)
    }
}

impl fmt::Display for FrameRate {
    /// Formatted the way ffmpeg's `-framerate` accepts it.
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.den == 1 {
            write!(f, "{}", self.num)
        } else {
            write!(f, "{}/{}", self.num, self.den)
        }
    }
}

impl FromStr for FrameRate {
    type Err = rf_core::Error;

    /// Accepts `30000/1001`, `30` and `29.97` (decimals kept to 1/1000).
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let invalid = || rf_core::Error::Probe(format!("invalid frame rate: {s:?}"));
        let s = s.trim();

        if let Some((num, den)) = s.split_once('/') {
            let num: u32 = num.trim().parse().map_err(|_| invalid())?;
            let den: u32 = den.trim().parse().map_err(|_| invalid())?;
            return Self::new(num, den).ok_or_else(invalid);
        }

        if let Ok(whole) = s.parse::<u32>() {
            return Self::new(whole, 1).ok_or_else(invalid);
        }

        let value: f64 = s.parse().map_err(|_| invalid())?;
        if !value.is_finite() || value <= 0.0 {
            return Err(invalid());
        }
        let millis = (value * 1000.0).round() as u64;
        Self::from_u64(millis, 1000).ok_or_else(invalid)
    }
}

/// Facts about the primary video stream of a file.
#[derive(Debug, Clone, PartialEq)]
pub struct VideoInfo {
    pub width: u32,
    pub height: u32,
    pub frame_rate: Option<FrameRate>,
    /// Container duration in seconds.
    pub duration: Option<f64>,
    pub has_audio: bool,
}

fn gcd(mut a: u64, mut b: u64) -> u64 {
    while b != 0 {
        (a, b) = (b, a % b);
    }
    a
}
