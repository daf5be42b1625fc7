//! Encoding profiles for the remediation ladder.
//!
//! Every scale filter produces even width and height, which libx264 with
//! yuv420p requires.

use crate::conversion::EncodeMode;

/// Target size of a transcode.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ScaleBound {
    /// Keep the source size, only round down to even
    Native,
    /// Fit into an `n`-line box: short side at most `n`, long side at most
    /// `n * 16 / 9`, oriented like the source. Never upscales.
    Lines(u32),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ProfileMode {
    Remux,
    Scale { bound: ScaleBound, crf: u8 },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct EncodeProfile {
    pub name: &'static str,
    /// Appended to the input stem for the output file name
    pub suffix: &'static str,
    pub mode: ProfileMode,
}

impl EncodeProfile {
    const fn scale(name: &'static str, suffix: &'static str, bound: ScaleBound, crf: u8) -> Self {
        Self {
            name,
            suffix,
            mode: ProfileMode::Scale { bound, crf },
        }
    }

    /// Concrete encoder instruction for a source of the given size.
    pub fn encode_mode(&self, source: Option<(u32, u32)>) -> EncodeMode {
        match self.mode {
            ProfileMode::Remux => EncodeMode::Remux,
            ProfileMode::Scale { bound, crf } => EncodeMode::Transcode {
                filter: scale_filter(bound, source),
                crf,
            },
        }
    }
}

/// Profiles for a non-square sample aspect ratio, cheapest first.
pub fn aspect_profiles() -> [EncodeProfile; 4] {
    [
        EncodeProfile {
            name: "remux",
            suffix: "_sar",
            mode: ProfileMode::Remux,
        },
        EncodeProfile::scale("norm", "_norm", ScaleBound::Native, 23),
        EncodeProfile::scale("norm720", "_norm720", ScaleBound::Lines(720), 28),
        EncodeProfile::scale("norm540", "_norm540", ScaleBound::Lines(540), 30),
    ]
}

/// Profiles for a file that stayed above the size ceiling.
pub fn shrink_profiles() -> [EncodeProfile; 3] {
    [
        EncodeProfile::scale("fit", "_fit", ScaleBound::Native, 26),
        EncodeProfile::scale("fit720", "_fit720", ScaleBound::Lines(720), 28),
        EncodeProfile::scale("fit540", "_fit540", ScaleBound::Lines(540), 30),
    ]
}

fn floor_even(v: u64) -> u32 {
    let even = (v & !1).max(2);
    u32::try_from(even).unwrap_or(u32::MAX & !1)
}

/// Output size for `width`x`height` under `bound`, both sides even.
pub fn even_dimensions(width: u32, height: u32, bound: ScaleBound) -> (u32, u32) {
    let (w, h) = (u64::from(width.max(1)), u64::from(height.max(1)));

    let ScaleBound::Lines(lines) = bound else {
        return (floor_even(w), floor_even(h));
    };

    let short = u64::from(lines);
    let long = short * 16 / 9;
    let (box_w, box_h) = if w >= h { (long, short) } else { (short, long) };

    if w <= box_w && h <= box_h {
        return (floor_even(w), floor_even(h));
    }

    // Compare w/h against box_w/box_h without floats
    if w * box_h > h * box_w {
        (floor_even(box_w), floor_even(h * box_w / w))
    } else {
        (floor_even(w * box_h / h), floor_even(box_h))
    }
}

/// ffmpeg `-vf` graph for a bound. Without known source dimensions the
/// graph falls back to expressions evaluated by ffmpeg.
pub fn scale_filter(bound: ScaleBound, source: Option<(u32, u32)>) -> String {
    match (source, bound) {
        (Some((w, h)), bound) => {
            let (w, h) = even_dimensions(w, h, bound);
            format!("setsar=1,scale={}:{}", w, h)
        }
        (None, ScaleBound::Native) => "setsar=1,scale=trunc(iw/2)*2:trunc(ih/2)*2".to_string(),
        (None, ScaleBound::Lines(lines)) => format!("setsar=1,scale=-2:'min({},trunc(ih/2)*2)'", lines),
    }
}
