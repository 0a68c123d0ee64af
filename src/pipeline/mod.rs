//! Pipeline stages for counting the pages of an upload.
//!
//! Each submodule implements exactly one step, so each can be tested on its
//! own and swapped (e.g. a different converter) without touching the others.
//!
//! ## Data Flow
//!
//! ```text
//! input ──▶ office | raster | (identity) ──▶ pdf
//! (form)    (soffice) (image)   (pdf)        (count)
//! ```
//!
//! 1. [`input`]: validate the form, classify the extension, sanitise the name
//! 2. [`office`]: word-processor documents through a headless office suite;
//!    bounded by a semaphore and a timeout
//! 3. [`raster`]: JPEG/PNG wrapped into a one-page PDF; runs in
//!    `spawn_blocking`
//! 4. [`pdf`]: count pages; unreadable documents are reported, not raised

pub mod input;
pub mod office;
pub mod pdf;
pub mod raster;
