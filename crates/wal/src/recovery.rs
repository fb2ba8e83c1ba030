//! Recovery: replaying everything after `current_commit_num` against a
//! caller-supplied `apply` callback.

use std::error::Error as StdError;

use crate::actor::SegmentPair;
use crate::error::{Result, WalError};

/// Replay every request with `request_num > commit_num`, in increasing
/// order, across every retained segment, invoking `apply(request_num,
/// body)` for each.
///
/// A fresh WAL (no segments at all) is a no-op. Coverage is located by
/// `min_req_num = commit_num + 1` rather than `commit_num` itself:
/// `commit_num` is commonly 0 (nothing committed yet), and since every
/// checkpoint record's `req_start` is at least 1, a lookup keyed on 0
/// would never be covered by any record even though `request_num`s 1..N
/// sit right there waiting to be replayed. Keying on `commit_num + 1`
/// finds the record actually holding the first request due for replay.
/// If no checkpoint covers `min_req_num`, the retained segments start
/// strictly after it (data below it is gone) and recovery cannot find a
/// starting point, which fails. An `apply` error stops the scan for the
/// remaining entries of the segment being replayed and propagates.
pub(crate) fn run(
    segments: &[SegmentPair],
    commit_num: u32,
    apply: &mut dyn FnMut(u32, Vec<u8>) -> std::result::Result<(), Box<dyn StdError + Send + Sync>>,
) -> Result<()> {
    if segments.is_empty() {
        return Ok(());
    }

    // No request number can exceed u32::MAX, so a commit watermark
    // already at the top of the range has nothing left to replay.
    let Some(min_req_num) = commit_num.checked_add(1) else {
        return Ok(());
    };

    let start_idx = segments
        .iter()
        .position(|pair| pair.checkpoint.offset_for(min_req_num).is_some());
    let Some(start_idx) = start_idx else {
        return Err(WalError::RecoveryStartNotFound { commit_num });
    };

    let mut start_offset = segments[start_idx]
        .checkpoint
        .offset_for(min_req_num)
        .expect("checked by position() above");

    for pair in &segments[start_idx..] {
        let replay = pair.log.replay(start_offset, min_req_num)?;
        for entry in replay {
            let (request_num, body) = entry?;
            apply(request_num, body).map_err(WalError::Apply)?;
        }
        start_offset = -1;
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::checkpoint::{CheckpointFile, CheckpointRecord};
    use crate::segment::LogSegment;
    use tempfile::tempdir;

    fn make_pair(dir: &std::path::Path, suffix: i32, entries: &[(u32, &str)]) -> SegmentPair {
        let mut log = LogSegment::open(dir.join(format!("log.{suffix}")), suffix).unwrap();
        for (req_num, body) in entries {
            log.append(*req_num, body.as_bytes()).unwrap();
        }
        let mut checkpoint =
            CheckpointFile::open(dir.join(format!("checkpoint.{suffix}")), suffix).unwrap();
        if let (Some((first, _)), Some((last, _))) = (entries.first(), entries.last()) {
            checkpoint
                .append(CheckpointRecord {
                    req_start: *first,
                    req_end: *last,
                    first_offset: 0,
                    last_offset: log.offset() as i64,
                })
                .unwrap();
        }
        SegmentPair { log, checkpoint }
    }

    #[test]
    fn fresh_wal_with_no_segments_is_a_no_op() {
        let seen: Vec<u32> = Vec::new();
        let mut apply = |_: u32, _: Vec<u8>| Ok(());
        assert!(run(&[], 0, &mut apply).is_ok());
        assert!(seen.is_empty());
    }

    #[test]
    fn replays_everything_above_commit_num_in_order() {
        let dir = tempdir().unwrap();
        let entries: Vec<(u32, &str)> = (1..=5).map(|i| (i, "body")).collect();
        let pair = make_pair(dir.path(), 1, &entries);

        let mut seen = Vec::new();
        let mut apply = |req_num: u32, _: Vec<u8>| {
            seen.push(req_num);
            Ok(())
        };
        run(std::slice::from_ref(&pair), 2, &mut apply).unwrap();
        assert_eq!(seen, vec![3, 4, 5]);
    }

    #[test]
    fn continues_across_segment_boundary() {
        let dir = tempdir().unwrap();
        let first = make_pair(dir.path(), 1, &[(1, "a"), (2, "b")]);
        let second = make_pair(dir.path(), 2, &[(3, "c"), (4, "d")]);

        let mut seen = Vec::new();
        let mut apply = |req_num: u32, _: Vec<u8>| {
            seen.push(req_num);
            Ok(())
        };
        run(&[first, second], 0, &mut apply).unwrap();
        assert_eq!(seen, vec![1, 2, 3, 4]);
    }

    #[test]
    fn zero_commit_num_replays_from_the_very_first_entry() {
        let dir = tempdir().unwrap();
        let entries: Vec<(u32, &str)> = (1..=10).map(|i| (i, "body")).collect();
        let pair = make_pair(dir.path(), 1, &entries);

        let mut seen = Vec::new();
        let mut apply = |req_num: u32, _: Vec<u8>| {
            seen.push(req_num);
            Ok(())
        };
        run(std::slice::from_ref(&pair), 0, &mut apply).unwrap();
        assert_eq!(seen, (1..=10).collect::<Vec<_>>());
    }

    #[test]
    fn missing_coverage_is_an_error() {
        let dir = tempdir().unwrap();
        let pair = make_pair(dir.path(), 1, &[(5, "a"), (6, "b")]);

        let mut apply = |_: u32, _: Vec<u8>| Ok(());
        let err = run(std::slice::from_ref(&pair), 0, &mut apply).unwrap_err();
        assert!(matches!(err, WalError::RecoveryStartNotFound { commit_num: 0 }));
    }

    #[test]
    fn apply_error_stops_replay() {
        let dir = tempdir().unwrap();
        let entries: Vec<(u32, &str)> = (1..=5).map(|i| (i, "body")).collect();
        let pair = make_pair(dir.path(), 1, &entries);

        let mut seen = Vec::new();
        let mut apply = |req_num: u32, _: Vec<u8>| {
            seen.push(req_num);
            if req_num == 2 {
                return Err(Box::<dyn StdError + Send + Sync>::from("boom"));
            }
            Ok(())
        };
        let err = run(std::slice::from_ref(&pair), 0, &mut apply).unwrap_err();
        assert!(matches!(err, WalError::Apply(_)));
        assert_eq!(seen, vec![1, 2]);
    }
}
