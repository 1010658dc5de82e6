use std::collections::HashMap;

use crate::flag::Flag;
use crate::segment::Segment;

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum DataKind {
    Flag,
    Segment,
}

impl DataKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            DataKind::Flag => "flags",
            DataKind::Segment => "segments",
        }
    }
}

/// A versioned item of either kind, as stored by [`ff_store`]. Tombstones are
/// represented by the item's own `deleted` bit, not by the absence of a
/// variant, so `get` can still report the version of a deleted item.
#[derive(Clone, Debug)]
pub enum Item {
    Flag(Flag),
    Segment(Segment),
}

impl Item {
    pub fn key(&self) -> &str {
        match self {
            Item::Flag(f) => &f.key,
            Item::Segment(s) => &s.key,
        }
    }

    pub fn version(&self) -> u64 {
        match self {
            Item::Flag(f) => f.version,
            Item::Segment(s) => s.version,
        }
    }

    pub fn is_deleted(&self) -> bool {
        match self {
            Item::Flag(f) => f.deleted,
            Item::Segment(s) => s.deleted,
        }
    }

    pub fn as_flag(&self) -> Option<&Flag> {
        match self {
            Item::Flag(f) => Some(f),
            _ => None,
        }
    }

    pub fn as_segment(&self) -> Option<&Segment> {
        match self {
            Item::Segment(s) => Some(s),
            _ => None,
        }
    }

    pub fn kind(&self) -> DataKind {
        match self {
            Item::Flag(_) => DataKind::Flag,
            Item::Segment(_) => DataKind::Segment,
        }
    }
}

impl From<Flag> for Item {
    fn from(f: Flag) -> Self {
        Item::Flag(f)
    }
}

impl From<Segment> for Item {
    fn from(s: Segment) -> Self {
        Item::Segment(s)
    }
}

/// A full snapshot of all flags and segments, as delivered by `put`
/// (streaming) or a polling response.
#[derive(Clone, Debug, Default)]
pub struct AllData {
    pub flags: HashMap<String, Flag>,
    pub segments: HashMap<String, Segment>,
}

impl AllData {
    pub fn new(flags: HashMap<String, Flag>, segments: HashMap<String, Segment>) -> AllData {
        AllData { flags, segments }
    }
}
