use std::fmt;
use std::ops::{Index, IndexMut};
use std::str::FromStr;

// ---------------------------------------------------------------------------
// Ion – the fixed set of metal ions measured along every sightline
// ---------------------------------------------------------------------------

/// Ions carried by the KODIAQ fit catalog.
///
/// The declaration order is the column order of the summary table.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum Ion {
    SiII,
    SiIV,
    CIV,
    OVI,
}

/// Atomic data for the transition used to model an ion.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Transition {
    /// Line name, e.g. `"C IV 1548"`.
    pub name: &'static str,
    /// Rest wavelength in Angstrom.
    pub wavelength: f64,
    /// Oscillator strength.
    pub f_value: f64,
    /// Damping constant in s^-1.
    pub gamma: f64,
}

impl Ion {
    pub const ALL: [Ion; 4] = [Ion::SiII, Ion::SiIV, Ion::CIV, Ion::OVI];

    fn slot(self) -> usize {
        match self {
            Ion::SiII => 0,
            Ion::SiIV => 1,
            Ion::CIV => 2,
            Ion::OVI => 3,
        }
    }

    /// Label as it appears in the catalog `Ion` column.
    pub fn label(self) -> &'static str {
        match self {
            Ion::SiII => "SiII",
            Ion::SiIV => "SiIV",
            Ion::CIV => "CIV",
            Ion::OVI => "OVI",
        }
    }

    /// Prefix of this ion's columns in the summary table.
    pub fn column_prefix(self) -> &'static str {
        match self {
            Ion::SiII => "Si_II",
            Ion::SiIV => "Si_IV",
            Ion::CIV => "C_IV",
            Ion::OVI => "O_VI",
        }
    }

    /// Short tag used in the per-ion detail file name.
    pub fn file_tag(self) -> &'static str {
        match self {
            Ion::SiII => "si2",
            Ion::SiIV => "si4",
            Ion::CIV => "c4",
            Ion::OVI => "o6",
        }
    }

    pub fn transition(self) -> Transition {
        match self {
            Ion::SiII => Transition {
                name: "Si II 1206",
                wavelength: 1206.500,
                f_value: 1.63,
                gamma: 2.55e9,
            },
            Ion::SiIV => Transition {
                name: "Si IV 1394",
                wavelength: 1393.7602,
                f_value: 0.513,
                gamma: 8.80e8,
            },
            Ion::CIV => Transition {
                name: "C IV 1548",
                wavelength: 1548.204,
                f_value: 0.1899,
                gamma: 2.643e8,
            },
            Ion::OVI => Transition {
                name: "O VI 1032",
                wavelength: 1031.9261,
                f_value: 0.1325,
                gamma: 4.163e8,
            },
        }
    }
}

impl fmt::Display for Ion {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

/// Error returned for an ion label outside the fixed enumeration.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("unknown ion label '{0}'")]
pub struct UnknownIon(pub String);

impl FromStr for Ion {
    type Err = UnknownIon;

    /// Parse a catalog label. Interior whitespace is ignored so `"Si II"`
    /// and `"SiII"` name the same ion.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let compact: String = s.chars().filter(|c| !c.is_whitespace()).collect();
        Ion::ALL
            .into_iter()
            .find(|ion| ion.label() == compact)
            .ok_or_else(|| UnknownIon(s.trim().to_string()))
    }
}

// ---------------------------------------------------------------------------
// PerIon – one slot per ion, indexed by the enumeration
// ---------------------------------------------------------------------------

/// Fixed-size container holding one value per [`Ion`].
#[derive(Debug, Clone, PartialEq, Default)]
pub struct PerIon<T> {
    slots: [T; 4],
}

impl<T> PerIon<T> {
    pub fn from_fn(mut f: impl FnMut(Ion) -> T) -> Self {
        PerIon {
            slots: Ion::ALL.map(&mut f),
        }
    }

    /// Iterate `(ion, value)` pairs in summary-column order.
    pub fn iter(&self) -> impl Iterator<Item = (Ion, &T)> {
        Ion::ALL.into_iter().zip(self.slots.iter())
    }

    pub fn iter_mut(&mut self) -> impl Iterator<Item = (Ion, &mut T)> {
        Ion::ALL.into_iter().zip(self.slots.iter_mut())
    }

    pub fn map<U>(self, mut f: impl FnMut(Ion, T) -> U) -> PerIon<U> {
        let [si2, si4, c4, o6] = self.slots;
        PerIon {
            slots: [
                f(Ion::SiII, si2),
                f(Ion::SiIV, si4),
                f(Ion::CIV, c4),
                f(Ion::OVI, o6),
            ],
        }
    }
}

impl<T> IntoIterator for PerIon<T> {
    type Item = (Ion, T);
    type IntoIter = std::iter::Zip<std::array::IntoIter<Ion, 4>, std::array::IntoIter<T, 4>>;

    fn into_iter(self) -> Self::IntoIter {
        Ion::ALL.into_iter().zip(self.slots)
    }
}

impl<T> Index<Ion> for PerIon<T> {
    type Output = T;

    fn index(&self, ion: Ion) -> &T {
        &self.slots[ion.slot()]
    }
}

impl<T> IndexMut<Ion> for PerIon<T> {
    fn index_mut(&mut self, ion: Ion) -> &mut T {
        &mut self.slots[ion.slot()]
    }
}
