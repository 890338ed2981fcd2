//! Stamps and coordinates: who changed what, when, where, and which changes a
//! view can see.

use std::collections::BTreeSet;

use serde::{Deserialize, Serialize};

use crate::id::Nid;

/// Lifecycle status carried by a stamp.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum Status {
    Active,
    Inactive,
}

impl std::fmt::Display for Status {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Status::Active => write!(f, "active"),
            Status::Inactive => write!(f, "inactive"),
        }
    }
}

/// Immutable marker of one version of a versioned record.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Stamp {
    pub status: Status,
    /// Commit time, milliseconds since the UNIX epoch.
    pub time: i64,
    pub author: Nid,
    pub module: Nid,
    pub path: Nid,
}

impl std::fmt::Display for Stamp {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "[{} t:{} a:{} m:{} p:{}]",
            self.status, self.time, self.author, self.module, self.path
        )
    }
}

/// Which flavor of taxonomy or definition a view asks for.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum PremiseType {
    /// As directly asserted by authors.
    Stated,
    /// As computed by the reasoner.
    Inferred,
}

impl std::fmt::Display for PremiseType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            PremiseType::Stated => write!(f, "stated"),
            PremiseType::Inferred => write!(f, "inferred"),
        }
    }
}

/// A view over versioned records: the point in time and on which path to
/// look, which modules and statuses to accept, and how to break ties.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StampCoordinate {
    /// Versions committed after this time are invisible.
    pub time: i64,
    pub path: Nid,
    /// Accepted modules. Empty accepts every module.
    pub modules: BTreeSet<Nid>,
    pub allowed_states: BTreeSet<Status>,
    /// Earlier modules take precedence when concurrent versions conflict.
    /// Versions from modules not listed rank after all listed ones.
    pub module_precedence: Vec<Nid>,
}

impl StampCoordinate {
    /// The latest versions on `path`, active or not.
    pub fn latest(path: Nid) -> Self {
        Self {
            time: i64::MAX,
            path,
            modules: BTreeSet::new(),
            allowed_states: [Status::Active, Status::Inactive].into_iter().collect(),
            module_precedence: Vec::new(),
        }
    }

    /// The latest active versions on `path`.
    pub fn latest_active(path: Nid) -> Self {
        Self {
            allowed_states: [Status::Active].into_iter().collect(),
            ..Self::latest(path)
        }
    }

    pub fn at_time(mut self, time: i64) -> Self {
        self.time = time;
        self
    }

    pub fn with_modules(mut self, modules: impl IntoIterator<Item = Nid>) -> Self {
        self.modules = modules.into_iter().collect();
        self
    }

    pub fn with_module_precedence(mut self, precedence: Vec<Nid>) -> Self {
        self.module_precedence = precedence;
        self
    }

    /// Whether a version with `stamp` exists from this view's vantage point.
    /// Status is not considered; see [`StampCoordinate::allows_status`].
    pub fn is_visible(&self, stamp: &Stamp) -> bool {
        stamp.path == self.path
            && stamp.time <= self.time
            && (self.modules.is_empty() || self.modules.contains(&stamp.module))
    }

    pub fn allows_status(&self, status: Status) -> bool {
        self.allowed_states.contains(&status)
    }

    /// Precedence rank of a module; lower wins.
    pub fn module_rank(&self, module: Nid) -> usize {
        self.module_precedence
            .iter()
            .position(|m| *m == module)
            .unwrap_or(self.module_precedence.len())
    }
}

/// Where the stated and inferred definitions live.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct LogicCoordinate {
    pub stated_assemblage: Nid,
    pub inferred_assemblage: Nid,
}

impl LogicCoordinate {
    pub fn assemblage(&self, premise: PremiseType) -> Nid {
        match premise {
            PremiseType::Stated => self.stated_assemblage,
            PremiseType::Inferred => self.inferred_assemblage,
        }
    }
}

/// Who is editing, in which module, on which path.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct EditCoordinate {
    pub author: Nid,
    pub module: Nid,
    pub path: Nid,
}

impl EditCoordinate {
    /// Stamp for a change made now through this coordinate.
    pub fn stamp(&self, status: Status, time: i64) -> Stamp {
        Stamp {
            status,
            time,
            author: self.author,
            module: self.module,
            path: self.path,
        }
    }
}

/// Milliseconds since the UNIX epoch.
pub fn now_millis() -> i64 {
    std::time::SystemTime::now()
        .duration_since(std::time::UNIX_EPOCH)
        .unwrap_or_default()
        .as_millis() as i64
}

#[cfg(test)]
mod tests {
    use super::*;

    fn stamp(time: i64, module: i32) -> Stamp {
        Stamp {
            status: Status::Active,
            time,
            author: Nid(1),
            module: Nid(module),
            path: Nid(100),
        }
    }

    #[test]
    fn visibility_respects_time_path_and_modules() {
        let view = StampCoordinate::latest(Nid(100)).at_time(50);
        assert!(view.is_visible(&stamp(50, 7)));
        assert!(!view.is_visible(&stamp(51, 7)));

        let other_path = Stamp {
            path: Nid(101),
            ..stamp(10, 7)
        };
        assert!(!view.is_visible(&other_path));

        let restricted = view.with_modules([Nid(8)]);
        assert!(!restricted.is_visible(&stamp(10, 7)));
        assert!(restricted.is_visible(&stamp(10, 8)));
    }

    #[test]
    fn active_only_rejects_inactive() {
        let view = StampCoordinate::latest_active(Nid(100));
        assert!(view.allows_status(Status::Active));
        assert!(!view.allows_status(Status::Inactive));
        assert!(StampCoordinate::latest(Nid(100)).allows_status(Status::Inactive));
    }

    #[test]
    fn module_rank_orders_listed_before_unlisted() {
        let view =
            StampCoordinate::latest(Nid(100)).with_module_precedence(vec![Nid(9), Nid(8)]);
        assert_eq!(view.module_rank(Nid(9)), 0);
        assert_eq!(view.module_rank(Nid(8)), 1);
        assert_eq!(view.module_rank(Nid(7)), 2);
    }

    #[test]
    fn edit_coordinate_stamps() {
        let edit = EditCoordinate {
            author: Nid(1),
            module: Nid(2),
            path: Nid(3),
        };
        let s = edit.stamp(Status::Active, 42);
        assert_eq!(s.module, Nid(2));
        assert_eq!(s.time, 42);
    }
}
