//! Address newtypes and translation contexts.

use std::{fmt, ops};

/// Declares a `u64` address newtype with wrapping arithmetic.
macro_rules! address {
    ($(#[$meta:meta])* $name:ident) => {
        $(#[$meta])*
        #[derive(Default, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
        pub struct $name(pub u64);

        impl $name {
            /// Subtracts `rhs`, returning `None` on underflow.
            pub const fn checked_sub(self, rhs: u64) -> Option<Self> {
                match self.0.checked_sub(rhs) {
                    Some(value) => Some(Self(value)),
                    None => None,
                }
            }
        }

        impl From<u64> for $name {
            fn from(value: u64) -> Self {
                Self(value)
            }
        }

        impl From<$name> for u64 {
            fn from(value: $name) -> u64 {
                value.0
            }
        }

        impl ops::Add<u64> for $name {
            type Output = Self;

            fn add(self, rhs: u64) -> Self {
                Self(self.0.wrapping_add(rhs))
            }
        }

        impl ops::Sub<u64> for $name {
            type Output = Self;

            fn sub(self, rhs: u64) -> Self {
                Self(self.0.wrapping_sub(rhs))
            }
        }

        // Distance between two addresses.
        impl ops::Sub for $name {
            type Output = u64;

            fn sub(self, rhs: Self) -> u64 {
                self.0.wrapping_sub(rhs.0)
            }
        }

        impl ops::BitAnd<u64> for $name {
            type Output = Self;

            fn bitand(self, rhs: u64) -> Self {
                Self(self.0 & rhs)
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
                write!(f, "{:#018x}", self.0)
            }
        }

        impl fmt::Debug for $name {
            fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
                write!(f, "{}({self})", stringify!($name))
            }
        }

        impl fmt::LowerHex for $name {
            fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
                fmt::LowerHex::fmt(&self.0, f)
            }
        }
    };
}

address! {
    /// A guest frame number (physical page index).
    Gfn
}

address! {
    /// A guest physical address.
    Pa
}

address! {
    /// A guest virtual address.
    Va
}

impl Va {
    /// Returns `true` for the NULL pointer.
    pub fn is_null(self) -> bool {
        self.0 == 0
    }
}

/// How an address is turned into a physical address before it is read.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum TranslationMechanism {
    /// The address already is physical.
    Direct,

    /// The address is virtual and is translated through the page tables
    /// rooted at `root` (CR3 on AMD64).
    Paging {
        /// Physical address of the top-level page table.
        root: Pa,
    },
}

/// An address together with the way to translate it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct AccessContext {
    /// Virtual or physical address, depending on `mechanism`.
    pub address: u64,

    /// Translation applied to `address`.
    pub mechanism: TranslationMechanism,
}

impl AccessContext {
    /// A physical access.
    pub fn direct(address: impl Into<Pa>) -> Self {
        Self::with_mechanism(address.into().0, TranslationMechanism::Direct)
    }

    /// A virtual access translated through `root`.
    pub fn paging(address: impl Into<Va>, root: impl Into<Pa>) -> Self {
        Self::with_mechanism(
            address.into().0,
            TranslationMechanism::Paging { root: root.into() },
        )
    }

    /// An access using `mechanism`.
    pub fn with_mechanism(address: u64, mechanism: TranslationMechanism) -> Self {
        Self { address, mechanism }
    }
}

impl From<Pa> for AccessContext {
    fn from(value: Pa) -> Self {
        Self::direct(value)
    }
}

impl From<(Va, Pa)> for AccessContext {
    fn from((va, root): (Va, Pa)) -> Self {
        Self::paging(va, root)
    }
}

impl ops::Add<u64> for AccessContext {
    type Output = Self;

    fn add(self, rhs: u64) -> Self {
        Self {
            address: self.address.wrapping_add(rhs),
            ..self
        }
    }
}
