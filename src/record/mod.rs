mod decode;
mod variant;

pub use variant::VariantRecord;

/// Phased or unphased alleles, represented as indices.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum GenotypeAllele {
    Unphased(i32),
    Phased(i32),
    UnphasedMissing,
    PhasedMissing,
}

impl GenotypeAllele {
    pub(crate) fn new(index: Option<i32>, phased: bool) -> Self {
        match (index, phased) {
            (Some(i), false) => GenotypeAllele::Unphased(i),
            (Some(i), true) => GenotypeAllele::Phased(i),
            (None, false) => GenotypeAllele::UnphasedMissing,
            (None, true) => GenotypeAllele::PhasedMissing,
        }
    }

    /// Get the index into the list of alleles.
    pub fn index(self) -> Option<u32> {
        match self {
            GenotypeAllele::Unphased(i) | GenotypeAllele::Phased(i) => Some(i as u32),
            GenotypeAllele::UnphasedMissing | GenotypeAllele::PhasedMissing => None,
        }
    }

    pub fn is_phased(self) -> bool {
        matches!(
            self,
            GenotypeAllele::Phased(_) | GenotypeAllele::PhasedMissing
        )
    }
}
