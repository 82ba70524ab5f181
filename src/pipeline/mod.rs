//! Pipeline stages for manuscript-to-PDF builds.
//!
//! Each submodule implements one step. The batch drivers in
//! [`crate::convert`] and [`crate::stream`] resolve inputs once and then run
//! [`build::build_manuscript`] for each manuscript in order.
//!
//! ## Data Flow
//!
//! ```text
//! input ──▶ markup ──▶ template ──▶ compile ×2 ──▶ relocate
//! (paths)   (blocks)   (.tex text)  (engine)       (output dir)
//! ```
//!
//! 1. [`input`]: resolve watermark and template identifiers, derive
//!    every path a manuscript's build touches
//! 2. [`markup`]: classify lines into styled blocks and rewrite inline
//!    markup as TeX
//! 3. [`template`]: compile the batch template once, render it per
//!    manuscript
//! 4. [`compile`]: run the TeX engine twice in the staging directory and
//!    clean up after it
//! 5. [`build`]: the per-manuscript state machine tying the above
//!    together

pub mod build;
pub mod compile;
pub mod input;
pub mod markup;
pub mod template;
