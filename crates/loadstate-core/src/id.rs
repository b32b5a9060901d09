//! Identity types for loading areas

use std::fmt;

use crate::{LoadingError, LoadingResult};

/// Separator between area and segment names in a path
pub const PATH_SEPARATOR: char = '/';

/// Check that `name` can be addressed by a path: non-empty and free of
/// [`PATH_SEPARATOR`]
pub fn validate_name(name: &str) -> LoadingResult<()> {
    if name.is_empty() || name.contains(PATH_SEPARATOR) {
        return Err(LoadingError::InvalidName(name.to_string()));
    }
    Ok(())
}

/// Area identity - handle of one node inside a loading tree
///
/// Ids are never reused by a tree, so a handle to a destroyed area stays
/// invalid instead of silently pointing at a newer one.
#[derive(Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default)]
pub struct AreaId(pub u64);

impl AreaId {
    pub const ZERO: AreaId = AreaId(0);

    #[inline]
    pub fn new(id: u64) -> Self {
        AreaId(id)
    }

    #[inline]
    pub fn next(self) -> Self {
        AreaId(self.0 + 1)
    }
}

impl fmt::Debug for AreaId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Area({})", self.0)
    }
}

impl fmt::Display for AreaId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "area#{}", self.0)
    }
}
