//! CTC Viterbi forced alignment.
//!
//! Finds the most likely monotonic assignment of frames to a known target
//! token sequence. The target is expanded with optional blanks:
//! `[blank, t0, blank, t1, ..., tS-1, blank]`, and each frame either stays in
//! its state, advances one state, or skips a blank between two different
//! tokens. Word order is never searched; only timing is discovered.

use crate::acoustic::LogProbMatrix;
use crate::error::AlignError;
use crate::types::AlignmentEntry;

/// Score of an unreachable state. Finite so arithmetic never yields NaN.
const UNREACHABLE: f32 = -1.0e30;

/// Anything at or below this is treated as unreachable.
const REACHABLE_FLOOR: f32 = UNREACHABLE / 2.0;

/// Backpointer steps.
const STAY: u8 = 0;
const ADVANCE: u8 = 1;
const SKIP: u8 = 2;

/// Result of a successful forced alignment.
#[derive(Debug, Clone)]
pub struct CtcAlignment {
    /// One entry per target token, in frame order
    pub entries: Vec<AlignmentEntry>,
    /// Log-probability of the best path
    pub score: f32,
    pub frames: usize,
}

impl CtcAlignment {
    /// Mean per-frame log-probability of the path.
    pub fn mean_frame_score(&self) -> f32 {
        if self.frames == 0 {
            return 0.0;
        }
        self.score / self.frames as f32
    }
}

#[inline]
fn emission(row: &[f32], id: usize) -> f32 {
    let v = row[id];
    if v.is_finite() { v.max(UNREACHABLE) } else { UNREACHABLE }
}

/// Smallest frame count accepted for `tokens` targets.
///
/// Each token needs a frame and adjacent tokens need a blank frame between
/// them to stay distinguishable.
pub fn min_frames(tokens: usize) -> usize {
    (2 * tokens).saturating_sub(1)
}

/// Align `targets` (vocabulary ids) to the frames of `log_probs`.
///
/// Returns exactly `targets.len()` non-overlapping entries in frame order,
/// or a recoverable error when no finite-score path exists.
pub fn forced_align(
    log_probs: &LogProbMatrix,
    targets: &[usize],
    blank_id: usize,
) -> Result<CtcAlignment, AlignError> {
    let t_len = log_probs.frames();
    let s_count = targets.len();
    if s_count == 0 {
        return Err(AlignError::EmptyLyrics);
    }
    let classes = log_probs.classes();
    if blank_id >= classes {
        return Err(AlignError::Frontend(format!(
            "blank id {} outside the {}-class emission matrix",
            blank_id, classes
        )));
    }
    if let Some(&bad) = targets.iter().find(|&&id| id >= classes) {
        return Err(AlignError::Frontend(format!(
            "token id {} outside the {}-class emission matrix",
            bad, classes
        )));
    }
    if t_len == 0 || t_len < min_frames(s_count) {
        return Err(AlignError::Infeasible {
            tokens: s_count,
            frames: t_len,
        });
    }

    let mut expanded = Vec::with_capacity(2 * s_count + 1);
    expanded.push(blank_id);
    for &tok in targets {
        expanded.push(tok);
        expanded.push(blank_id);
    }
    let l_len = expanded.len();

    let mut prev = vec![UNREACHABLE; l_len];
    let mut curr = vec![UNREACHABLE; l_len];
    let mut bp = vec![STAY; t_len * l_len];

    let row0 = log_probs.row(0);
    prev[0] = emission(row0, expanded[0]);
    prev[1] = emission(row0, expanded[1]);

    for t in 1..t_len {
        let row = log_probs.row(t);
        let bp_row = &mut bp[t * l_len..(t + 1) * l_len];
        for s in 0..l_len {
            let mut best = prev[s];
            let mut step = STAY;
            if s >= 1 && prev[s - 1] > best {
                best = prev[s - 1];
                step = ADVANCE;
            }
            if s >= 2 && expanded[s] != expanded[s - 2] && prev[s - 2] > best {
                best = prev[s - 2];
                step = SKIP;
            }
            let score = best + emission(row, expanded[s]);
            curr[s] = if score > REACHABLE_FLOOR { score } else { UNREACHABLE };
            bp_row[s] = step;
        }
        std::mem::swap(&mut prev, &mut curr);
    }

    let mut s = if prev[l_len - 1] >= prev[l_len - 2] {
        l_len - 1
    } else {
        l_len - 2
    };
    let score = prev[s];
    if score <= REACHABLE_FLOOR {
        return Err(AlignError::NoPath {
            tokens: s_count,
            frames: t_len,
        });
    }

    let mut path = vec![0usize; t_len];
    path[t_len - 1] = s;
    for t in (1..t_len).rev() {
        s = match bp[t * l_len + s] {
            ADVANCE => s - 1,
            SKIP => s - 2,
            _ => s,
        };
        path[t - 1] = s;
    }

    let entries = extract_token_runs(&path);
    if entries.len() != s_count {
        return Err(AlignError::NoPath {
            tokens: s_count,
            frames: t_len,
        });
    }

    log::debug!(
        "CTC alignment: {} tokens over {} frames, score {:.2}",
        s_count,
        t_len,
        score
    );

    Ok(CtcAlignment {
        entries,
        score,
        frames: t_len,
    })
}

/// Collapse a per-frame state path into runs of non-blank states.
///
/// Odd expanded states are tokens; state `s` is target `s / 2`.
fn extract_token_runs(path: &[usize]) -> Vec<AlignmentEntry> {
    let mut entries = Vec::new();
    let mut open: Option<(usize, usize)> = None;

    for (t, &s) in path.iter().enumerate() {
        let is_token = s % 2 == 1;
        match open {
            Some((state, _)) if is_token && state == s => {}
            Some((state, start)) => {
                entries.push(AlignmentEntry {
                    token_index: state / 2,
                    start_frame: start,
                    end_frame: t - 1,
                });
                open = if is_token { Some((s, t)) } else { None };
            }
            None if is_token => open = Some((s, t)),
            None => {}
        }
    }
    if let Some((state, start)) = open {
        entries.push(AlignmentEntry {
            token_index: state / 2,
            start_frame: start,
            end_frame: path.len() - 1,
        });
    }
    entries
}
