//! Contains the two storage backends: in-memory tables and on-disk fragment files

/// Defines the in-memory report, reference aggregation and helpers
pub mod memory;

/// Defines the scratch space and fragment files
pub mod disk;
