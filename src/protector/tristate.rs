//! Tri-state region settings.
//!
//! `Undefined` means "no opinion, defer to the next region or the host
//! default". The AND fold below is the precedence rule of the whole
//! region axis and must not be simplified: the first region producing a
//! definite opinion wins.

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Tristate {
    True,
    False,
    #[default]
    Undefined,
}

impl Tristate {
    /// Folding AND: a definite `False` is sticky, `Undefined` defers.
    ///
    /// | a         | b         | a.and(b)  |
    /// |-----------|-----------|-----------|
    /// | False     | any       | False     |
    /// | True      | True      | True      |
    /// | True      | False     | False     |
    /// | True      | Undefined | True      |
    /// | Undefined | b         | b         |
    pub fn and(self, other: Tristate) -> Tristate {
        match (self, other) {
            (Tristate::False, _) | (_, Tristate::False) => Tristate::False,
            (Tristate::True, _) | (_, Tristate::True) => Tristate::True,
            (Tristate::Undefined, Tristate::Undefined) => Tristate::Undefined,
        }
    }

    pub fn is_defined(self) -> bool {
        self != Tristate::Undefined
    }

    pub fn from_bool(value: bool) -> Tristate {
        if value {
            Tristate::True
        } else {
            Tristate::False
        }
    }
}

impl From<bool> for Tristate {
    fn from(value: bool) -> Self {
        Tristate::from_bool(value)
    }
}
