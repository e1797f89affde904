//! Batch classification of imported coordinates.

pub mod processor;

pub use processor::{
    find_duplicate_groups, BatchOptions, BatchProcessor, BatchResult, DuplicateGroup, ItemError,
    ProcessedCoordinate, BULK_CHUNK_SIZE,
};
