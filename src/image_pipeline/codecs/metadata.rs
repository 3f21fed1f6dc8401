use std::path::Path;

use crate::image_pipeline::common::cancel::CancellationToken;
use crate::image_pipeline::common::error::Result;

pub trait MetadataExtractor {
    /// Copies embedded metadata from `input` into `output`, overwriting in place.
    /// With `xmp_only` every tag is written into the XMP group instead.
    fn copy_embedded_metadata(
        &self,
        input: &Path,
        output: &Path,
        xmp_only: bool,
        cancel: Option<&CancellationToken>,
    ) -> Result<()>;

    /// Writes the embedded metadata of `input` as an XMP sidecar. Any existing
    /// file at `output` is replaced.
    fn extract_xmp_to_sidecar(
        &self,
        input: &Path,
        output: &Path,
        cancel: Option<&CancellationToken>,
    ) -> Result<()>;
}
