// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! Class identifiers.
//!
//! A class is a positive integer. `0` is reserved by list endpoints to mean
//! "no class filter" and is never accepted as a real class.

use std::fmt;

use serde::{Deserialize, Serialize};

use super::InvalidTarget;

/// A validated, non-zero class number.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(try_from = "i64", into = "u32")]
pub struct ClassId(u32);

impl ClassId {
    /// Validate a class number used as a create/update target.
    pub fn new(value: i64) -> Result<Self, InvalidTarget> {
        match u32::try_from(value) {
            Ok(0) => Err(InvalidTarget::new("class 0 is not a valid class")),
            Ok(v) => Ok(Self(v)),
            Err(_) => Err(InvalidTarget::new(format!("class {value} is out of range"))),
        }
    }

    /// Interpret a list-endpoint class filter. Absent or `0` means all classes.
    pub fn filter(value: Option<i64>) -> Result<Option<Self>, InvalidTarget> {
        match value {
            None | Some(0) => Ok(None),
            Some(v) => Self::new(v).map(Some),
        }
    }

    pub fn get(self) -> u32 {
        self.0
    }
}

impl TryFrom<i64> for ClassId {
    type Error = InvalidTarget;

    fn try_from(value: i64) -> Result<Self, Self::Error> {
        Self::new(value)
    }
}

impl From<ClassId> for u32 {
    fn from(class: ClassId) -> Self {
        class.0
    }
}

impl fmt::Display for ClassId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn zero_is_rejected_as_target() {
        assert!(ClassId::new(0).is_err());
        assert!(ClassId::new(-3).is_err());
        assert_eq!(ClassId::new(10).unwrap().get(), 10);
    }

    #[test]
    fn zero_or_absent_filter_means_all_classes() {
        assert_eq!(ClassId::filter(None).unwrap(), None);
        assert_eq!(ClassId::filter(Some(0)).unwrap(), None);
        assert_eq!(ClassId::filter(Some(7)).unwrap(), Some(ClassId::new(7).unwrap()));
        assert!(ClassId::filter(Some(-1)).is_err());
    }

    #[test]
    fn deserialization_rejects_zero() {
        let ok: ClassId = serde_json::from_str("11").unwrap();
        assert_eq!(ok.get(), 11);
        assert!(serde_json::from_str::<ClassId>("0").is_err());
        assert_eq!(serde_json::to_string(&ok).unwrap(), "11");
    }
}
