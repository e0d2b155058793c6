//! Viewport-adaptive chunk ordering
//!
//! Pages are split into contiguous chunks that are rendered one batch at a
//! time. Before each batch the queue consults the current first-visible
//! page: if its chunk is still pending it goes next, otherwise rendering
//! continues in page order from where it left off, wrapping around to
//! lower chunks that were skipped.

use std::ops::Range;

/// A contiguous range of pages rendered as one batch
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Chunk {
    /// Position of the chunk in page order
    pub index: usize,

    /// Pages in the chunk
    pub pages: Range<u32>,
}

/// Pending chunks of a document, handed out in viewport-priority order.
///
/// # Example
///
/// ```
/// use pdf_viewer_scheduler::ChunkQueue;
///
/// let mut queue = ChunkQueue::new(1000, 12);
///
/// // The user jumped to page 500 before loading got going
/// let chunk = queue.next_chunk(Some(500)).unwrap();
/// assert_eq!(chunk.index, 41);
/// assert!(chunk.pages.contains(&500));
///
/// // Without a pending hinted chunk, order continues after the last one taken
/// assert_eq!(queue.next_chunk(Some(500)).unwrap().index, 42);
/// ```
#[derive(Debug, Clone)]
pub struct ChunkQueue {
    page_count: u32,
    chunk_size: u32,
    done: Vec<bool>,
    cursor: usize,
    remaining: usize,
}

impl ChunkQueue {
    /// Split `page_count` pages into chunks of `chunk_size` pages.
    ///
    /// The last chunk holds the remainder and may be shorter. A chunk size
    /// of zero is treated as one.
    pub fn new(page_count: u32, chunk_size: u32) -> Self {
        let chunk_size = chunk_size.max(1);
        let chunks = page_count.div_ceil(chunk_size) as usize;
        Self {
            page_count,
            chunk_size,
            done: vec![false; chunks],
            cursor: 0,
            remaining: chunks,
        }
    }

    pub fn chunk_size(&self) -> u32 {
        self.chunk_size
    }

    /// Total number of chunks
    pub fn len(&self) -> usize {
        self.done.len()
    }

    pub fn is_empty(&self) -> bool {
        self.done.is_empty()
    }

    /// Chunks not handed out yet
    pub fn remaining(&self) -> usize {
        self.remaining
    }

    /// Chunk index that contains `page`
    pub fn chunk_of(&self, page: u32) -> usize {
        (page / self.chunk_size) as usize
    }

    /// Pages covered by chunk `index`
    pub fn pages_of(&self, index: usize) -> Range<u32> {
        let start = (index as u32).saturating_mul(self.chunk_size).min(self.page_count);
        let end = start.saturating_add(self.chunk_size).min(self.page_count);
        start..end
    }

    /// Whether chunk `index` has been handed out
    pub fn is_done(&self, index: usize) -> bool {
        self.done.get(index).copied().unwrap_or(true)
    }

    /// Take the next chunk to render.
    ///
    /// `first_visible` is the page the viewport currently shows first. The
    /// returned chunk is marked done immediately.
    pub fn next_chunk(&mut self, first_visible: Option<u32>) -> Option<Chunk> {
        if self.remaining == 0 {
            return None;
        }

        let hinted = first_visible
            .filter(|&page| page < self.page_count)
            .map(|page| self.chunk_of(page))
            .filter(|&index| !self.done[index]);

        let index = match hinted {
            Some(index) => {
                if index != self.cursor % self.done.len() {
                    log::debug!("Viewport moved, jumping to chunk {}", index);
                }
                index
            }
            None => {
                let len = self.done.len();
                (0..len)
                    .map(|offset| (self.cursor + offset) % len)
                    .find(|&index| !self.done[index])?
            }
        };

        self.done[index] = true;
        self.remaining -= 1;
        self.cursor = index + 1;

        Some(Chunk {
            index,
            pages: self.pages_of(index),
        })
    }
}

impl Iterator for ChunkQueue {
    type Item = Chunk;

    /// Take chunks in order without a viewport hint
    fn next(&mut self) -> Option<Chunk> {
        self.next_chunk(None)
    }
}
