//! Per-category emissions sums in kgCO2e. Extension entries are not counted.

use std::ops::Add;

use serde::Serialize;

use crate::category::{Category, TechCarbonStandard};

/// Sums for the four category blocks.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize)]
pub struct EmissionsTotals {
    pub upstream: f64,
    pub direct: f64,
    pub indirect: f64,
    pub downstream: f64,
}

impl EmissionsTotals {
    pub fn from_payload(payload: &TechCarbonStandard) -> Self {
        let sum = |c| payload.block(c).map_or(0.0, |b| b.total());
        Self {
            upstream: sum(Category::Upstream),
            direct: sum(Category::Direct),
            indirect: sum(Category::Indirect),
            downstream: sum(Category::Downstream),
        }
    }

    pub fn by_category(&self, category: Category) -> f64 {
        match category {
            Category::Upstream => self.upstream,
            Category::Direct => self.direct,
            Category::Indirect => self.indirect,
            Category::Downstream => self.downstream,
        }
    }

    /// Grand total across all four blocks.
    pub fn total(&self) -> f64 {
        self.upstream + self.direct + self.indirect + self.downstream
    }
}

impl Add for EmissionsTotals {
    type Output = Self;

    fn add(self, rhs: Self) -> Self {
        Self {
            upstream: self.upstream + rhs.upstream,
            direct: self.direct + rhs.direct,
            indirect: self.indirect + rhs.indirect,
            downstream: self.downstream + rhs.downstream,
        }
    }
}

impl std::iter::Sum for EmissionsTotals {
    fn sum<I: Iterator<Item = Self>>(iter: I) -> Self {
        iter.fold(Self::default(), Add::add)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::category::{CategoryBlock, CategoryField};
    use crate::emissions::Emissions;
    use crate::version::TcsVersion;

    #[test]
    fn test_sums_known_entries_only() {
        let mut ext = std::collections::BTreeMap::new();
        ext.insert("satellites".to_string(), serde_json::json!({"emissions": 1000}));
        let upstream = CategoryBlock::with_extensions(
            Category::Upstream,
            TcsVersion::V0_1_0,
            [
                (CategoryField::Software, Emissions::new(2.5).unwrap().into()),
                (CategoryField::ServerHardware, Emissions::new(7.5).unwrap().into()),
            ],
            ext,
        )
        .unwrap();
        let direct = CategoryBlock::new(
            Category::Direct,
            TcsVersion::V0_1_0,
            [(CategoryField::Generators, Emissions::new(5.0).unwrap().into())],
        )
        .unwrap();
        let payload = TechCarbonStandard::new(TcsVersion::V0_1_0, [upstream, direct]).unwrap();
        let totals = EmissionsTotals::from_payload(&payload);
        assert_eq!(totals.upstream, 10.0);
        assert_eq!(totals.direct, 5.0);
        assert_eq!(totals.indirect, 0.0);
        assert_eq!(totals.total(), 15.0);
    }

    #[test]
    fn test_sum_of_totals() {
        let a = EmissionsTotals {
            upstream: 1.0,
            direct: 2.0,
            indirect: 3.0,
            downstream: 4.0,
        };
        let sum: EmissionsTotals = [a, a].into_iter().sum();
        assert_eq!(sum.total(), 20.0);
        assert_eq!(sum.by_category(Category::Downstream), 8.0);
    }
}
