//! Storage consistency between a new clause and live enclosing scopes.
//!
//! Only two relations are decided here: the request fits inside storage
//! that is already established, or it shares nothing with it. Anything in
//! between is handed to the runtime unchanged, which rejects the mapping
//! if it cannot honor it.

use std::fmt;

use miette::SourceSpan;

use crate::identity::DataRange;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum EscapeReason {
    /// The request straddles the boundary of established storage.
    PartialOverlap,
    /// Bounds are not constant, so coverage cannot be decided.
    UnknownBounds,
}

impl fmt::Display for EscapeReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            EscapeReason::PartialOverlap => f.write_str("partially overlaps established storage"),
            EscapeReason::UnknownBounds => f.write_str("has bounds only known at run time"),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SubarrayVerdict {
    /// Nothing established yet for this identity.
    Fresh,
    Contained,
    Disjoint,
    ForwardToRuntime(EscapeReason),
}

/// A request forwarded to the runtime without a static verdict.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RuntimeEscape {
    pub operand: String,
    pub requested: DataRange,
    pub established: Vec<DataRange>,
    pub reason: EscapeReason,
    pub span: SourceSpan,
}

impl fmt::Display for RuntimeEscape {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "`{}` {}", self.operand, self.reason)
    }
}

fn relate(request: DataRange, established: DataRange) -> SubarrayVerdict {
    match (request, established) {
        (_, DataRange::Whole) => SubarrayVerdict::Contained,
        (DataRange::Unbounded, _) | (_, DataRange::Unbounded) => {
            SubarrayVerdict::ForwardToRuntime(EscapeReason::UnknownBounds)
        }
        (DataRange::Whole, DataRange::Bounded { .. }) => {
            SubarrayVerdict::ForwardToRuntime(EscapeReason::PartialOverlap)
        }
        (DataRange::Bounded { start, len }, DataRange::Bounded { start: est_start, len: est_len }) => {
            let end = start.saturating_add(len);
            let est_end = est_start.saturating_add(est_len);
            if start >= est_start && end <= est_end {
                SubarrayVerdict::Contained
            } else if end <= est_start || start >= est_end {
                SubarrayVerdict::Disjoint
            } else {
                SubarrayVerdict::ForwardToRuntime(EscapeReason::PartialOverlap)
            }
        }
    }
}

/// Rewrites a bounded range covering every element as `Whole`.
fn normalize(range: DataRange, extent: Option<u64>) -> DataRange {
    match (range, extent) {
        (DataRange::Bounded { start: 0, len }, Some(extent)) if len as u64 == extent && len >= 0 => DataRange::Whole,
        _ => range,
    }
}

/// Classifies a request against every live range of the same identity.
///
/// `extent` is the element count of the underlying array when known.
pub fn classify(
    request: DataRange,
    established: impl IntoIterator<Item = DataRange>,
    extent: Option<u64>,
) -> SubarrayVerdict {
    let request = normalize(request, extent);
    let mut verdict = SubarrayVerdict::Fresh;
    for range in established {
        let relation = relate(request, normalize(range, extent));
        verdict = match (verdict, relation) {
            (_, SubarrayVerdict::Contained) | (SubarrayVerdict::Contained, _) => return SubarrayVerdict::Contained,
            (SubarrayVerdict::ForwardToRuntime(EscapeReason::PartialOverlap), _) => verdict,
            (_, SubarrayVerdict::ForwardToRuntime(_)) => relation,
            (SubarrayVerdict::ForwardToRuntime(_), _) => verdict,
            _ => SubarrayVerdict::Disjoint,
        };
    }
    verdict
}

#[cfg(test)]
mod tests {
    use super::*;

    fn b(start: i64, len: i64) -> DataRange {
        DataRange::Bounded { start, len }
    }

    #[test]
    fn contained_requests() {
        // all, same[3:6], beg[2:5], mid[1:8], end[0:5] vs their inner ranges.
        assert_eq!(classify(b(0, 10), [DataRange::Whole], Some(10)), SubarrayVerdict::Contained);
        assert_eq!(classify(b(3, 6), [b(3, 6)], Some(10)), SubarrayVerdict::Contained);
        assert_eq!(classify(b(2, 2), [b(2, 5)], Some(10)), SubarrayVerdict::Contained);
        assert_eq!(classify(b(3, 3), [b(1, 8)], Some(10)), SubarrayVerdict::Contained);
        assert_eq!(classify(b(4, 1), [b(0, 5)], Some(10)), SubarrayVerdict::Contained);
    }

    #[test]
    fn disjoint_requests() {
        assert_eq!(classify(b(2, 2), [b(0, 2)], Some(4)), SubarrayVerdict::Disjoint);
        assert_eq!(classify(b(0, 1), [b(3, 1), b(1, 1)], Some(4)), SubarrayVerdict::Disjoint);
    }

    #[test]
    fn overlaps_go_to_runtime() {
        let partial = SubarrayVerdict::ForwardToRuntime(EscapeReason::PartialOverlap);
        // Overlapping the start, overlapping the end, whole over a part.
        assert_eq!(classify(b(0, 2), [b(1, 2)], Some(5)), partial);
        assert_eq!(classify(b(2, 2), [b(1, 2)], Some(5)), partial);
        assert_eq!(classify(DataRange::Whole, [b(1, 2)], Some(5)), partial);
        // Concatenation of two live ranges is not one storage block.
        assert_eq!(classify(b(0, 4), [b(2, 2), b(0, 2)], Some(4)), partial);
    }

    #[test]
    fn unknown_bounds_go_to_runtime() {
        assert_eq!(
            classify(DataRange::Unbounded, [b(0, 2)], None),
            SubarrayVerdict::ForwardToRuntime(EscapeReason::UnknownBounds)
        );
        assert_eq!(classify(DataRange::Unbounded, [DataRange::Whole], None), SubarrayVerdict::Contained);
    }

    #[test]
    fn nothing_established() {
        assert_eq!(classify(b(0, 2), std::iter::empty(), Some(4)), SubarrayVerdict::Fresh);
    }

    #[test]
    fn whole_matches_full_section() {
        assert_eq!(classify(DataRange::Whole, [b(0, 4)], Some(4)), SubarrayVerdict::Contained);
        assert_eq!(
            classify(DataRange::Whole, [b(0, 4)], None),
            SubarrayVerdict::ForwardToRuntime(EscapeReason::PartialOverlap)
        );
    }
}
