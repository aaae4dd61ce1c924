//! Record batching: split a record set into ordered, size-bounded chunks.
//!
//! Splitting is pure and deterministic. Chunks borrow from the input slice,
//! so concatenating every chunk's records gives back the input exactly.

use crate::error::{Error, Result};

/// Records per collections request or composite sub-request.
pub const COLLECTIONS_CEILING: usize = crate::config::COLLECTIONS_BATCH_CEILING;

/// Sub-requests per composite call.
pub const COMPOSITE_SUBREQUEST_CEILING: usize = 25;

/// Rows per bulk ingest job.
pub const BULK_CEILING: usize = crate::config::BULK_BATCH_CEILING;

/// An order-preserving slice of a larger record set.
#[derive(Debug, PartialEq)]
pub struct Chunk<'a, T> {
    /// 0-based position among the chunks of one split.
    pub index: usize,
    /// Position of `records[0]` in the original input.
    pub offset: usize,
    pub records: &'a [T],
    /// Sum of record sizes; 0 when split by count only.
    pub byte_size: usize,
}

impl<T> Clone for Chunk<'_, T> {
    fn clone(&self) -> Self {
        *self
    }
}

impl<T> Copy for Chunk<'_, T> {}

impl<T> Chunk<'_, T> {
    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    /// Original input indices covered by this chunk.
    pub fn range(&self) -> std::ops::Range<usize> {
        self.offset..self.offset + self.records.len()
    }
}

/// Check a caller-supplied batch size against a protocol ceiling.
pub fn check_batch_size(max_batch_size: usize, ceiling: usize) -> Result<()> {
    if max_batch_size == 0 || max_batch_size > ceiling {
        return Err(Error::config(format!(
            "batch size must be between 1 and {ceiling}, got {max_batch_size}"
        )));
    }
    Ok(())
}

/// Split `records` into chunks of at most `max_batch_size` records.
///
/// The last chunk may be smaller. An empty input yields no chunks.
pub fn split<T>(records: &[T], max_batch_size: usize, ceiling: usize) -> Result<Vec<Chunk<'_, T>>> {
    check_batch_size(max_batch_size, ceiling)?;

    Ok(records
        .chunks(max_batch_size)
        .enumerate()
        .map(|(index, slice)| Chunk {
            index,
            offset: index * max_batch_size,
            records: slice,
            byte_size: 0,
        })
        .collect())
}

/// Split by record count and by accumulated byte size, whichever binds first.
///
/// `size_of` gives each record's encoded size. A record is never split: one
/// larger than `max_bytes` travels alone in its own chunk.
pub fn split_by_size<T>(
    records: &[T],
    max_batch_size: usize,
    ceiling: usize,
    max_bytes: usize,
    size_of: impl Fn(usize, &T) -> usize,
) -> Result<Vec<Chunk<'_, T>>> {
    check_batch_size(max_batch_size, ceiling)?;
    if max_bytes == 0 {
        return Err(Error::config("byte ceiling must be greater than zero"));
    }

    let mut chunks = Vec::new();
    let mut start = 0;
    let mut bytes = 0;

    for (i, record) in records.iter().enumerate() {
        let size = size_of(i, record);
        let count = i - start;
        if count > 0 && (count == max_batch_size || bytes + size > max_bytes) {
            chunks.push(Chunk {
                index: chunks.len(),
                offset: start,
                records: &records[start..i],
                byte_size: bytes,
            });
            start = i;
            bytes = 0;
        }
        bytes += size;
    }

    if start < records.len() {
        chunks.push(Chunk {
            index: chunks.len(),
            offset: start,
            records: &records[start..],
            byte_size: bytes,
        });
    }

    Ok(chunks)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ErrorKind;

    fn concat<T: Clone>(chunks: &[Chunk<'_, T>]) -> Vec<T> {
        chunks.iter().flat_map(|c| c.records.iter().cloned()).collect()
    }

    #[test]
    fn test_split_preserves_order_without_drops() {
        let records: Vec<u32> = (0..1234).collect();
        for m in [1, 7, 199, 200] {
            let chunks = split(&records, m, COLLECTIONS_CEILING).unwrap();
            assert_eq!(concat(&chunks), records);
            assert!(chunks.iter().all(|c| c.len() <= m && !c.is_empty()));
            for (i, chunk) in chunks.iter().enumerate() {
                assert_eq!(chunk.index, i);
                assert_eq!(records[chunk.range()], *chunk.records);
            }
        }
    }

    #[test]
    fn test_split_last_chunk_smaller() {
        let records: Vec<u32> = (0..450).collect();
        let sizes: Vec<usize> = split(&records, 200, COLLECTIONS_CEILING)
            .unwrap()
            .iter()
            .map(Chunk::len)
            .collect();
        assert_eq!(sizes, vec![200, 200, 50]);
    }

    #[test]
    fn test_split_is_deterministic() {
        let records: Vec<u32> = (0..999).collect();
        let a = split(&records, 37, COLLECTIONS_CEILING).unwrap();
        let b = split(&records, 37, COLLECTIONS_CEILING).unwrap();
        assert_eq!(a, b);
    }

    #[test]
    fn test_split_empty_input() {
        let records: Vec<u32> = Vec::new();
        assert!(split(&records, 10, COLLECTIONS_CEILING).unwrap().is_empty());
    }

    #[test]
    fn test_split_rejects_bad_batch_size() {
        let records = vec![1, 2, 3];
        for bad in [0, 201] {
            let err = split(&records, bad, COLLECTIONS_CEILING).unwrap_err();
            assert!(matches!(err.kind, ErrorKind::Config(_)));
        }
        assert!(split(&records, 10_000, BULK_CEILING).is_ok());
        assert!(split(&records, 10_001, BULK_CEILING).is_err());
    }

    #[test]
    fn test_split_by_size_byte_ceiling_binds_first() {
        let records = vec![40usize, 40, 40, 10, 90, 5];
        let chunks = split_by_size(&records, 100, BULK_CEILING, 100, |_, r| *r).unwrap();

        let shape: Vec<(usize, usize)> = chunks.iter().map(|c| (c.len(), c.byte_size)).collect();
        assert_eq!(shape, vec![(2, 80), (2, 50), (2, 95)]);
        assert_eq!(concat(&chunks), records);
    }

    #[test]
    fn test_split_by_size_count_binds_first() {
        let records = vec![1usize; 10];
        let chunks = split_by_size(&records, 4, BULK_CEILING, 1_000, |_, r| *r).unwrap();
        let sizes: Vec<usize> = chunks.iter().map(Chunk::len).collect();
        assert_eq!(sizes, vec![4, 4, 2]);
    }

    #[test]
    fn test_oversized_record_travels_alone() {
        let records = vec![10usize, 500, 10];
        let chunks = split_by_size(&records, 100, BULK_CEILING, 100, |_, r| *r).unwrap();
        let sizes: Vec<usize> = chunks.iter().map(Chunk::len).collect();
        assert_eq!(sizes, vec![1, 1, 1]);
    }
}
