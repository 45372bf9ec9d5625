use std::path::PathBuf;
use std::str::FromStr;

use anyhow::{Context, bail};

/// Frames produced by `testsrc` when no count is given.
pub const DEFAULT_TEST_FRAMES: u64 = 300;

/**
    One command line input.
*/
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum InputArg {
    /// Synthetic moving gradient. `size` falls back to `--width`/`--height`.
    TestPattern {
        size: Option<(u32, u32)>,
        frames: u64,
    },
    /// Media file decoded through FFmpeg.
    File(PathBuf),
}

impl FromStr for InputArg {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let mut parts = s.split(':');
        if parts.next() != Some("testsrc") {
            if s.is_empty() {
                bail!("empty input");
            }
            return Ok(Self::File(PathBuf::from(s)));
        }

        let size = match parts.next() {
            None | Some("") => None,
            Some(size) => Some(parse_size(size)?),
        };
        let frames = match parts.next() {
            None => DEFAULT_TEST_FRAMES,
            Some(n) => n
                .parse()
                .with_context(|| format!("invalid frame count {n:?} in {s:?}"))?,
        };
        if parts.next().is_some() {
            bail!("expected testsrc[:WxH[:frames]], got {s:?}");
        }
        Ok(Self::TestPattern { size, frames })
    }
}

fn parse_size(s: &str) -> anyhow::Result<(u32, u32)> {
    let Some((w, h)) = s.split_once('x') else {
        bail!("expected WIDTHxHEIGHT, got {s:?}");
    };
    let width: u32 = w.parse().with_context(|| format!("invalid width {w:?}"))?;
    let height: u32 = h.parse().with_context(|| format!("invalid height {h:?}"))?;
    if width == 0 || height == 0 {
        bail!("size must be non-zero, got {s:?}");
    }
    Ok((width, height))
}
