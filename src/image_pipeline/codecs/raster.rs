use std::path::Path;

use crate::image_pipeline::common::cancel::CancellationToken;
use crate::image_pipeline::common::error::Result;

/// General purpose raster conversion tool.
///
/// `input` and `output` are passed as the tool sees them, so `input` may carry
/// a frame selector such as `file.tif[0]` and `output` a format prefix such as
/// `tif:out`.
pub trait RasterCodec {
    fn convert(
        &self,
        input: &str,
        output: &str,
        initial_args: &[String],
        post_args: &[String],
        cancel: Option<&CancellationToken>,
    ) -> Result<()>;

    /// Modifies `input` in place.
    fn mogrify(
        &self,
        input: &Path,
        initial_args: &[String],
        post_args: &[String],
        cancel: Option<&CancellationToken>,
    ) -> Result<()>;

    /// Colourspace name of the first frame, e.g. `sRGB` or `Gray`.
    fn identify_colourspace(&self, path: &Path) -> Result<String>;

    /// Uncompressed TIFF copy of `input`.
    fn convert_to_tiff(
        &self,
        input: &Path,
        output: &Path,
        cancel: Option<&CancellationToken>,
    ) -> Result<()> {
        self.convert(
            &input.to_string_lossy(),
            &output.to_string_lossy(),
            &[],
            &["-compress".to_string(), "None".to_string()],
            cancel,
        )
    }

    /// JPEG copy of the first frame of `input`, optionally resized by a
    /// factor in (0, 1].
    fn convert_to_jpg(
        &self,
        input: &Path,
        output: &Path,
        resize: Option<f64>,
        quality: Option<u8>,
        cancel: Option<&CancellationToken>,
    ) -> Result<()> {
        let mut initial_args = Vec::new();
        if let Some(resize) = resize {
            initial_args.push("-resize".to_string());
            initial_args.push(resize_percentage(resize));
        }
        if let Some(quality) = quality {
            initial_args.push("-quality".to_string());
            initial_args.push(quality.to_string());
        }
        self.convert(
            &format!("{}[0]", input.to_string_lossy()),
            &output.to_string_lossy(),
            &initial_args,
            &[],
            cancel,
        )
    }
}

/// `0.6` becomes `60%`. Rounded so float noise never reaches the command line.
pub(crate) fn resize_percentage(factor: f64) -> String {
    let percent = (factor * 100.0 * 10_000.0).round() / 10_000.0;
    format!("{percent}%")
}
