use std::fmt;
use std::ops::{BitAnd, BitOr, BitOrAssign};
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::TypeError;

/// Selects which optional metadata a listing or lookup must populate.
///
/// Hydrating metadata costs work per entry (decoding the stored record,
/// hashing the value). A field whose flag is absent is left at its zero
/// value and is never computed.
#[derive(Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct MetaFlags(u32);

impl MetaFlags {
    pub const NONE: Self = Self(0);
    pub const SIZE: Self = Self(1 << 0);
    pub const MODIFIED: Self = Self(1 << 1);
    pub const CHECKSUM: Self = Self(1 << 2);
    pub const CUSTOM: Self = Self(1 << 3);
    pub const ALL: Self = Self(Self::SIZE.0 | Self::MODIFIED.0 | Self::CHECKSUM.0 | Self::CUSTOM.0);

    const NAMED: [(&'static str, Self); 4] = [
        ("size", Self::SIZE),
        ("modified", Self::MODIFIED),
        ("checksum", Self::CHECKSUM),
        ("custom", Self::CUSTOM),
    ];

    /// Build from raw bits, dropping bits that name no flag.
    pub const fn from_bits_truncate(bits: u32) -> Self {
        Self(bits & Self::ALL.0)
    }

    pub const fn bits(self) -> u32 {
        self.0
    }

    /// Returns `true` if every flag in `other` is set.
    pub const fn contains(self, other: Self) -> bool {
        self.0 & other.0 == other.0
    }

    pub const fn is_none(self) -> bool {
        self.0 == 0
    }
}

impl BitOr for MetaFlags {
    type Output = Self;

    fn bitor(self, rhs: Self) -> Self {
        Self(self.0 | rhs.0)
    }
}

impl BitOrAssign for MetaFlags {
    fn bitor_assign(&mut self, rhs: Self) {
        self.0 |= rhs.0;
    }
}

impl BitAnd for MetaFlags {
    type Output = Self;

    fn bitand(self, rhs: Self) -> Self {
        Self(self.0 & rhs.0)
    }
}

impl fmt::Display for MetaFlags {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.is_none() {
            return f.write_str("none");
        }
        let mut first = true;
        for (name, flag) in Self::NAMED {
            if self.contains(flag) {
                if !first {
                    f.write_str("|")?;
                }
                f.write_str(name)?;
                first = false;
            }
        }
        Ok(())
    }
}

impl fmt::Debug for MetaFlags {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "MetaFlags({self})")
    }
}

/// Parses `size,modified`, `size|checksum`, `all`, or `none`.
impl FromStr for MetaFlags {
    type Err = TypeError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let mut flags = Self::NONE;
        for name in s.split([',', '|']).map(str::trim).filter(|n| !n.is_empty()) {
            let name = name.to_ascii_lowercase();
            flags |= match name.as_str() {
                "none" => Self::NONE,
                "all" => Self::ALL,
                _ => Self::NAMED
                    .iter()
                    .find(|(n, _)| *n == name)
                    .map(|(_, f)| *f)
                    .ok_or_else(|| TypeError::UnknownFlag(name.clone()))?,
            };
        }
        Ok(flags)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn none_is_not_all() {
        assert_ne!(MetaFlags::NONE, MetaFlags::ALL);
        assert!(MetaFlags::NONE.is_none());
        assert!(!MetaFlags::ALL.is_none());
    }

    #[test]
    fn all_contains_every_flag() {
        for (_, flag) in MetaFlags::NAMED {
            assert!(MetaFlags::ALL.contains(flag));
        }
    }

    #[test]
    fn combine_and_test() {
        let f = MetaFlags::SIZE | MetaFlags::MODIFIED;
        assert!(f.contains(MetaFlags::SIZE));
        assert!(f.contains(MetaFlags::MODIFIED));
        assert!(!f.contains(MetaFlags::CHECKSUM));
        assert_eq!(f & MetaFlags::SIZE, MetaFlags::SIZE);
    }

    #[test]
    fn display_lists_names() {
        assert_eq!(MetaFlags::NONE.to_string(), "none");
        assert_eq!((MetaFlags::SIZE | MetaFlags::CUSTOM).to_string(), "size|custom");
    }

    #[test]
    fn parse_names() {
        assert_eq!("size,modified".parse::<MetaFlags>().unwrap(), MetaFlags::SIZE | MetaFlags::MODIFIED);
        assert_eq!("Checksum|size".parse::<MetaFlags>().unwrap(), MetaFlags::SIZE | MetaFlags::CHECKSUM);
        assert_eq!("all".parse::<MetaFlags>().unwrap(), MetaFlags::ALL);
        assert_eq!("none".parse::<MetaFlags>().unwrap(), MetaFlags::NONE);
        assert_eq!("".parse::<MetaFlags>().unwrap(), MetaFlags::NONE);
    }

    #[test]
    fn parse_unknown_fails() {
        assert_eq!(
            "size,owner".parse::<MetaFlags>().unwrap_err(),
            TypeError::UnknownFlag("owner".into())
        );
    }

    #[test]
    fn truncate_drops_unknown_bits() {
        assert_eq!(MetaFlags::from_bits_truncate(0xff), MetaFlags::ALL);
    }
}
