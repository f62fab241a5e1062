//! Pipeline stages of a document conversion.
//!
//! Each submodule implements exactly one step of the remote workflow and
//! knows nothing about the others; [`crate::convert`] strings them together
//! and owns the progress schedule.
//!
//! ## Data Flow
//!
//! ```text
//! input ──▶ upload ──▶ job ──▶ poll ──▶ download
//! (path)   (PUT bytes) (create) (status)  (URL)
//! ```
//!
//! 1. [`input`]: read and validate a local file
//! 2. [`upload`]: obtain a presigned target and PUT the raw bytes to it
//! 3. [`job`]: create the processing job and poll it to a terminal state
//! 4. [`download`]: fetch the spreadsheet's download URL

pub mod download;
pub mod input;
pub mod job;
pub mod upload;
