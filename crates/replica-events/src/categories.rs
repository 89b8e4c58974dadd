use bitflags::bitflags;
use serde::{Deserialize, Serialize};

use replica_types::ReferenceTypes;

bitflags! {
    /// Kinds of repository data an external change can affect.
    #[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
    pub struct ChangeCategories: u16 {
        const CONFIG = 1 << 0;
        const BRANCHES = 1 << 1;
        const REMOTE_BRANCHES = 1 << 2;
        const TAGS = 1 << 3;
        const HEAD = 1 << 4;
        const STASH = 1 << 5;
        const NOTES = 1 << 6;
        const REMOTES = 1 << 7;
        const SUBMODULES = 1 << 8;
        const WORKING_TREE = 1 << 9;
    }
}

impl ChangeCategories {
    /// Reference kinds to refresh for these categories.
    pub fn reference_types(&self) -> ReferenceTypes {
        let mut types = ReferenceTypes::empty();
        if self.contains(Self::BRANCHES) {
            types |= ReferenceTypes::LOCAL_BRANCHES;
        }
        if self.contains(Self::REMOTE_BRANCHES) {
            types |= ReferenceTypes::REMOTE_BRANCHES;
        }
        if self.contains(Self::TAGS) {
            types |= ReferenceTypes::TAGS;
        }
        if self.contains(Self::STASH) {
            types |= ReferenceTypes::STASH;
        }
        types
    }
}

impl From<ReferenceTypes> for ChangeCategories {
    fn from(types: ReferenceTypes) -> Self {
        let mut categories = Self::empty();
        if types.contains(ReferenceTypes::LOCAL_BRANCHES) {
            categories |= Self::BRANCHES;
        }
        if types.contains(ReferenceTypes::REMOTE_BRANCHES) {
            categories |= Self::REMOTE_BRANCHES;
        }
        if types.contains(ReferenceTypes::TAGS) {
            categories |= Self::TAGS;
        }
        if types.contains(ReferenceTypes::STASH) {
            categories |= Self::STASH;
        }
        categories
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn reference_types_round_trip() {
        let categories = ChangeCategories::from(ReferenceTypes::REFERENCES);
        assert_eq!(
            categories,
            ChangeCategories::BRANCHES | ChangeCategories::REMOTE_BRANCHES | ChangeCategories::TAGS
        );
        assert_eq!(categories.reference_types(), ReferenceTypes::REFERENCES);
    }

    #[test]
    fn non_reference_categories_map_to_nothing() {
        let categories = ChangeCategories::CONFIG | ChangeCategories::WORKING_TREE;
        assert!(categories.reference_types().is_empty());
    }

    #[test]
    fn default_is_empty() {
        assert!(ChangeCategories::default().is_empty());
    }
}
