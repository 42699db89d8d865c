//! Chunk ranges: half-open `[start, stop)` slices of one source's records.

use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};
use crate::id::SourceId;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ChunkRange {
    pub source: SourceId,
    pub start: u64,
    pub stop: u64,
}

impl ChunkRange {
    /// Build a range, enforcing `start < stop`.
    pub fn new(source: SourceId, start: u64, stop: u64) -> Result<Self> {
        if start >= stop {
            return Err(Error::Range(format!(
                "empty or inverted range [{start}, {stop}) for {source}"
            )));
        }
        Ok(Self {
            source,
            start,
            stop,
        })
    }

    pub fn len(&self) -> u64 {
        self.stop - self.start
    }

    /// Always false for ranges built through `new`.
    pub fn is_empty(&self) -> bool {
        self.stop <= self.start
    }

    /// Check the range fits a source with `total` records.
    pub fn check_within(&self, total: u64) -> Result<()> {
        if self.stop > total {
            return Err(Error::Range(format!(
                "{self} exceeds source length {total}"
            )));
        }
        Ok(())
    }
}

impl std::fmt::Display for ChunkRange {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}[{}..{})", self.source, self.start, self.stop)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rejects_empty_and_inverted() {
        let s = SourceId::new(0);
        assert!(ChunkRange::new(s, 3, 3).is_err());
        assert!(ChunkRange::new(s, 4, 3).is_err());
        let r = ChunkRange::new(s, 0, 10).unwrap();
        assert_eq!(r.len(), 10);
        assert!(r.check_within(10).is_ok());
        assert!(r.check_within(9).is_err());
    }
}
