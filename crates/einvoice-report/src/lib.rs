//! E-invoice validation report pipeline
//!
//! Takes the ruleset-keyed response of a remote e-invoice validator and
//! turns it into a stable, client-facing report:
//!
//! - [`wellformed::check`]: cheap syntax gate run before any remote call
//! - [`report::normalize`]: projection into [`NormalizedReport`]
//! - [`render::render`]: JSON, HTML, PDF or DOCX output
//! - [`dispatch::dispatch`]: headers and inline vs. file transfer
//!
//! PDF and DOCX outputs are materialized under a [`ScratchDir`] with a
//! unique name per render and removed when their guard is dropped.

pub mod dispatch;
pub mod error;
pub mod format;
pub mod render;
pub mod report;
pub mod ruleset;
pub mod scratch;
pub mod wellformed;

pub use dispatch::{dispatch, Dispatch, Transport};
pub use error::ReportError;
pub use format::ReportFormat;
pub use render::{render, render_as, RenderedArtifact};
pub use report::{
    normalize, CategoryResult, CategoryResults, Clock, FixedClock, NormalizedReport,
    RawValidationResult, ReportedError, SystemClock,
};
pub use ruleset::{Category, Rulesets, DEFAULT_RULESETS};
pub use scratch::{ScratchDir, ScratchFile};
