//! Audit output for definition chronologies.

use std::fmt::Write as _;
use std::sync::atomic::{AtomicUsize, Ordering};

use crate::logic::InternalExpression;
use crate::version::{ChronologyId, StampedVersion};

/// Largest definition graph observed so far.
#[derive(Debug, Default)]
pub struct GraphSizeWatermark(AtomicUsize);

impl GraphSizeWatermark {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record a graph of `node_count` nodes. True when it is strictly larger
    /// than every graph seen before.
    pub fn observe(&self, node_count: usize) -> bool {
        self.0.fetch_max(node_count, Ordering::AcqRel) < node_count
    }

    pub fn current(&self) -> usize {
        self.0.load(Ordering::Acquire)
    }
}

/// Render every version of every chronology, with both diff directions
/// between consecutive versions.
///
/// `(i->j)` maps node `i` of the newer version to node `j` of the older one;
/// `(i<-j)` maps node `i` of the older version to node `j` of the newer one.
///
/// ```text
/// Revisions of Heart disease (2 version(s))
/// chronology 1
///   version 0 [active t:1 a:nid:1 m:nid:2 p:nid:3]
///     DEFINITION_ROOT[3] ->[2]
///     ...
///   diff 0 -> 1
///     newer->older: (0->0)(1->1)
///     older<-newer: (0<-0)(1<-1)
/// ```
pub fn revision_report(
    label: &str,
    chronologies: &[(ChronologyId, Vec<StampedVersion<InternalExpression>>)],
) -> String {
    let total: usize = chronologies.iter().map(|(_, v)| v.len()).sum();
    let mut out = String::new();
    let _ = writeln!(out, "Revisions of {label} ({total} version(s))");

    for (id, versions) in chronologies {
        let _ = writeln!(out, "chronology {id}");
        for (n, version) in versions.iter().enumerate() {
            let _ = writeln!(out, "  version {n} {}", version.stamp);
            for line in version.value.render().lines() {
                let _ = writeln!(out, "    {line}");
            }
        }
        for (n, pair) in versions.windows(2).enumerate() {
            let (before, after) = (&pair[0].value, &pair[1].value);
            let to_older = after.maximal_common_subgraph(before);
            let to_newer = before.maximal_common_subgraph(after);
            let _ = writeln!(out, "  diff {n} -> {}", n + 1);
            let _ = writeln!(out, "    newer->older: {}", to_older.render_forward());
            let _ = writeln!(out, "    older<-newer: {}", to_newer.render_backward());
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::id::Nid;
    use crate::logic::ExpressionBuilder;
    use crate::stamp::{Stamp, Status};

    fn stamp(time: i64) -> Stamp {
        Stamp {
            status: Status::Active,
            time,
            author: Nid(1),
            module: Nid(2),
            path: Nid(3),
        }
    }

    fn definition(parents: &[i32]) -> InternalExpression {
        let mut b = ExpressionBuilder::new();
        let concepts: Vec<_> = parents.iter().map(|p| b.concept(Nid(*p))).collect();
        let and = b.and(concepts);
        let set = b.necessary_set(vec![and]);
        b.definition(vec![set]).unwrap()
    }

    #[test]
    fn watermark_reports_only_new_maxima() {
        let w = GraphSizeWatermark::new();
        assert!(w.observe(3));
        assert!(!w.observe(3));
        assert!(!w.observe(2));
        assert!(w.observe(10));
        assert_eq!(w.current(), 10);
    }

    #[test]
    fn report_lists_versions_and_both_diff_directions() {
        let versions = vec![
            StampedVersion {
                stamp: stamp(1),
                value: definition(&[-5]),
            },
            StampedVersion {
                stamp: stamp(2),
                value: definition(&[-5, -6]),
            },
        ];
        let report = revision_report("Heart disease", &[(1, versions)]);

        assert!(report.starts_with("Revisions of Heart disease (2 version(s))\n"));
        assert!(report.contains("chronology 1\n"));
        assert!(report.contains("  version 0 [active t:1"));
        assert!(report.contains("  version 1 [active t:2"));
        assert!(report.contains("  diff 0 -> 1\n"));
        // The added conjunct (node 1 of the newer version) has no partner.
        assert!(report.contains("    newer->older: (0->0)(2->1)(3->2)(4->3)\n"));
        assert!(report.contains("    older<-newer: (0<-0)(1<-2)(2<-3)(3<-4)\n"));
    }

    #[test]
    fn single_version_has_no_diff() {
        let versions = vec![StampedVersion {
            stamp: stamp(1),
            value: definition(&[-5]),
        }];
        let report = revision_report("X", &[(7, versions)]);
        assert!(!report.contains("diff"));
    }
}
