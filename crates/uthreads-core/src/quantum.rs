//! Per-priority quantum lengths
//!
//! Fixed at `init` from caller input. Every priority accepted anywhere else
//! in the library is bounds-checked against this table.

use std::time::Duration;

use crate::error::UsageError;
use crate::state::Priority;

/// Quantum length for each priority level
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct QuantumTable {
    slices: Vec<Duration>,
}

impl QuantumTable {
    /// Build the table, rejecting an empty input or any zero entry
    pub fn new(slices: &[Duration]) -> Result<Self, UsageError> {
        if slices.is_empty() {
            return Err(UsageError::EmptyQuantumTable);
        }
        if let Some(priority) = slices.iter().position(|d| d.is_zero()) {
            return Err(UsageError::ZeroQuantum { priority });
        }
        Ok(Self { slices: slices.to_vec() })
    }

    /// Build the table from microsecond counts
    pub fn from_micros(usecs: &[u64]) -> Result<Self, UsageError> {
        let slices: Vec<Duration> = usecs.iter().map(|&us| Duration::from_micros(us)).collect();
        Self::new(&slices)
    }

    /// Number of priority levels
    #[inline]
    pub fn levels(&self) -> usize {
        self.slices.len()
    }

    /// Reject priorities that do not index the table
    #[inline]
    pub fn check(&self, priority: Priority) -> Result<(), UsageError> {
        if priority.as_index() < self.slices.len() {
            Ok(())
        } else {
            Err(UsageError::InvalidPriority {
                priority: priority.as_index(),
                levels: self.slices.len(),
            })
        }
    }

    /// Quantum for a priority
    #[inline]
    pub fn quantum(&self, priority: Priority) -> Result<Duration, UsageError> {
        self.check(priority)?;
        Ok(self.slices[priority.as_index()])
    }

    pub fn iter(&self) -> impl Iterator<Item = Duration> + '_ {
        self.slices.iter().copied()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_rejects_empty_table() {
        assert_eq!(QuantumTable::new(&[]), Err(UsageError::EmptyQuantumTable));
    }

    #[test]
    fn test_rejects_zero_entry() {
        let err = QuantumTable::from_micros(&[100, 0, 300]).unwrap_err();
        assert_eq!(err, UsageError::ZeroQuantum { priority: 1 });
    }

    #[test]
    fn test_lookup_and_bounds() {
        let table = QuantumTable::from_micros(&[100_000, 200_000]).unwrap();
        assert_eq!(table.levels(), 2);
        assert_eq!(table.quantum(Priority::new(1)), Ok(Duration::from_millis(200)));
        assert_eq!(
            table.quantum(Priority::new(2)),
            Err(UsageError::InvalidPriority { priority: 2, levels: 2 })
        );
        assert!(table.check(Priority::DEFAULT).is_ok());
    }

    #[test]
    fn test_iter_preserves_order() {
        let table = QuantumTable::from_micros(&[3, 1, 2]).unwrap();
        let micros: Vec<u128> = table.iter().map(|d| d.as_micros()).collect();
        assert_eq!(micros, vec![3, 1, 2]);
    }
}
