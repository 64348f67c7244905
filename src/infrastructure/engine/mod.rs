//! Transport seam for the external engine.
//!
//! The bridge facade only ever talks to the engine through this trait, so the
//! concrete transport (subprocess today, anything else tomorrow) is swappable
//! and tests can substitute a scripted fake.

pub mod subprocess;

pub use subprocess::SubprocessEngine;

use crate::domain::entities::DetectOptions;
use crate::domain::error::Result;
use crate::infrastructure::process::{CapturedOutput, StreamedExit};
use crate::shared::cancel::CancelToken;
use async_trait::async_trait;
use std::path::Path;

#[async_trait]
pub trait Engine {
    /// One buffered `detect` invocation; both streams captured in full.
    async fn detect(&self, file: &Path, options: &DetectOptions) -> Result<CapturedOutput>;

    /// One streaming `convert` invocation. Raw stdout chunks are pushed into
    /// `on_chunk` as they arrive; chunk boundaries carry no meaning.
    ///
    /// The sink lifetime is higher-ranked so implementations can hand it
    /// chunks borrowed from their own read buffers.
    async fn convert(
        &self,
        input: &Path,
        output: &Path,
        on_chunk: &mut (dyn for<'a> FnMut(&'a [u8]) + Send),
        cancel: Option<CancelToken>,
    ) -> Result<StreamedExit>;
}
