use std::collections::HashMap;

use ff_model::{AllData, DataKind, Flag, Item, Segment};
use serde::Deserialize;

use crate::error::SourceError;

#[derive(Deserialize)]
pub struct PutPayload {
    #[allow(dead_code)]
    pub path: String,
    pub data: PutData,
}

#[derive(Deserialize)]
pub struct PutData {
    #[serde(default)]
    pub flags: HashMap<String, Flag>,
    #[serde(default)]
    pub segments: HashMap<String, Segment>,
}

impl From<PutData> for AllData {
    fn from(data: PutData) -> AllData {
        AllData::new(data.flags, data.segments)
    }
}

#[derive(Deserialize)]
pub struct PatchPayload {
    pub path: String,
    pub data: serde_json::Value,
}

#[derive(Deserialize)]
pub struct DeletePayload {
    pub path: String,
    pub version: u64,
}

/// Splits a `/flags/<key>` or `/segments/<key>` path into its kind and key.
pub fn parse_path(path: &str) -> Result<(DataKind, &str), SourceError> {
    let rest = path.strip_prefix('/').unwrap_or(path);
    if let Some(key) = rest.strip_prefix("flags/") {
        Ok((DataKind::Flag, key))
    } else if let Some(key) = rest.strip_prefix("segments/") {
        Ok((DataKind::Segment, key))
    } else {
        Err(SourceError::MalformedPayload(format!("unrecognized path: {path}")))
    }
}

pub fn patch_to_item(kind: DataKind, data: serde_json::Value) -> Result<Item, SourceError> {
    match kind {
        DataKind::Flag => {
            let flag: Flag = serde_json::from_value(data).map_err(|e| SourceError::MalformedPayload(e.to_string()))?;
            Ok(Item::Flag(flag))
        }
        DataKind::Segment => {
            let segment: Segment =
                serde_json::from_value(data).map_err(|e| SourceError::MalformedPayload(e.to_string()))?;
            Ok(Item::Segment(segment))
        }
    }
}

pub fn delete_to_item(kind: DataKind, key: &str, version: u64) -> Item {
    match kind {
        DataKind::Flag => Item::Flag(Flag::tombstone(key, version)),
        DataKind::Segment => Item::Segment(Segment::tombstone(key, version)),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_flag_path() {
        let (kind, key) = parse_path("/flags/my-flag").unwrap();
        assert_eq!(kind, DataKind::Flag);
        assert_eq!(key, "my-flag");
    }

    #[test]
    fn parses_segment_path() {
        let (kind, key) = parse_path("/segments/beta-users").unwrap();
        assert_eq!(kind, DataKind::Segment);
        assert_eq!(key, "beta-users");
    }

    #[test]
    fn rejects_unrecognized_path() {
        assert!(parse_path("/unknown/x").is_err());
    }
}
