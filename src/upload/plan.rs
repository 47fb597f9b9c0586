//! Part layout and progress arithmetic

use super::UploadError;

/// One byte range of the source, uploaded as one part
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Chunk {
    /// 1-based part number
    pub part_number: u32,
    pub start: u64,
    /// Exclusive, never past the source size
    pub end: u64,
}

impl Chunk {
    pub fn len(&self) -> u64 {
        self.end - self.start
    }

    pub fn is_empty(&self) -> bool {
        self.start == self.end
    }
}

/// Splits a source of `size` bytes into `chunk_size` parts.
///
/// An empty source still gets one (empty) part so the upload can be completed.
#[derive(Debug, Clone, Copy)]
pub struct ChunkPlan {
    size: u64,
    chunk_size: u64,
    total_parts: u32,
}

impl ChunkPlan {
    pub fn new(size: u64, chunk_size: u64) -> Result<Self, UploadError> {
        if chunk_size == 0 {
            return Err(UploadError::InvalidChunkSize(chunk_size));
        }

        let parts = size.div_ceil(chunk_size).max(1);
        let total_parts = u32::try_from(parts).map_err(|_| UploadError::TooManyParts(parts))?;

        Ok(Self {
            size,
            chunk_size,
            total_parts,
        })
    }

    pub fn total_parts(&self) -> u32 {
        self.total_parts
    }

    pub fn size(&self) -> u64 {
        self.size
    }

    /// Chunks in part-number order
    pub fn chunks(&self) -> impl Iterator<Item = Chunk> + '_ {
        (1..=self.total_parts).map(move |part_number| {
            let start = u64::from(part_number - 1) * self.chunk_size;
            Chunk {
                part_number,
                start,
                end: (start + self.chunk_size).min(self.size),
            }
        })
    }

    /// Whether `chunk` is the final part
    pub fn is_last(&self, chunk: &Chunk) -> bool {
        chunk.start + self.chunk_size >= self.size
    }
}

/// Percent shown while parts complete.
///
/// Each stored part adds `ceil(100 / total_parts)`, held at 99 until the run
/// finishes; only [`ProgressTracker::finish`] reports 100.
#[derive(Debug, Clone)]
pub struct ProgressTracker {
    step: u8,
    percent: u8,
}

impl ProgressTracker {
    pub fn new(total_parts: u32) -> Self {
        let step = 100u32.div_ceil(total_parts.max(1));
        Self {
            step: step.min(100) as u8,
            percent: 0,
        }
    }

    pub fn percent(&self) -> u8 {
        self.percent
    }

    /// Account for one stored part and return the new percent
    pub fn advance(&mut self) -> u8 {
        self.percent = self.percent.saturating_add(self.step).min(99);
        self.percent
    }

    /// Terminal percent, reported on both success and failure
    pub fn finish(&mut self) -> u8 {
        self.percent = 100;
        self.percent
    }
}
