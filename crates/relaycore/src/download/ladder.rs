//! yt-dlp format ladder.
//!
//! Entries go from "best file that fits" down to progressively lower
//! resolution caps. The engine tries them in order and stops at the first
//! file under the size ceiling.

/// One rung of the ladder.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FormatStep {
    pub label: &'static str,
    /// yt-dlp `-f` expression
    pub selector: String,
}

/// Resolution caps below the unconstrained first attempt
const HEIGHT_CAPS: &[(&str, u32)] = &[("1080p", 1080), ("720p", 720), ("540p", 540)];

/// Builds the ladder for a given size ceiling in bytes.
pub fn format_ladder(max_file_size: u64) -> Vec<FormatStep> {
    let best = format!(
        "best[ext=mp4][filesize<={max}]/best[ext=mp4][filesize_approx<={max}]/\
         best[filesize<={max}]/best[filesize_approx<={max}]/best[ext=mp4]",
        max = max_file_size
    );

    std::iter::once(FormatStep {
        label: "best",
        selector: best,
    })
    .chain(HEIGHT_CAPS.iter().map(|&(label, height)| FormatStep {
        label,
        selector: format!("best[height<={h}][ext=mp4]/best[height<={h}]", h = height),
    }))
    .collect()
}
