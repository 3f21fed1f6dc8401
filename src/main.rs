use std::path::{Path, PathBuf};

use anyhow::{bail, Context};
use image_preservation_rs::image_pipeline::{
    DerivativeFilesGenerator, GeneratorConfig, JpgDerivativeOptions, TiffDerivativeOptions,
};
use image_preservation_rs::logger;

use tracing::{error, info};

fn main() -> anyhow::Result<()> {
    logger::init();

    let mut args = std::env::args_os().skip(1);
    let Some(source) = args.next().map(PathBuf::from) else {
        bail!("usage: image_preservation_rs <source> [output_folder]");
    };
    let output_folder = args.next().map(PathBuf::from).unwrap_or_else(|| PathBuf::from("."));

    info!("Starting image_preservation...");

    let config = GeneratorConfig::builder()
        .require_icc_profile_for_colour(false)
        .require_icc_profile_for_greyscale(false)
        .use_default_filenames(false)
        .build();
    let generator = DerivativeFilesGenerator::new(config).context("failed to locate the external tools")?;

    info!("Derivative generator initialized");
    info!("Compression options: {}", generator.config().compress_options);

    let result = if is_jpeg(&source) {
        generator.generate_derivatives_from_jpg(&source, &output_folder, &JpgDerivativeOptions::default())
    } else {
        generator.generate_derivatives_from_tiff(&source, &output_folder, &TiffDerivativeOptions::default())
    };

    match result {
        Ok(outputs) => {
            for (kind, path) in outputs.iter() {
                info!("Created {}: {}", kind, path.display());
            }
            Ok(())
        }
        Err(e) => {
            error!("Derivative generation failed: {}", e);
            Err(e).with_context(|| format!("could not generate derivatives for {}", source.display()))
        }
    }
}

fn is_jpeg(path: &Path) -> bool {
    path.extension()
        .and_then(|e| e.to_str())
        .is_some_and(|e| e.eq_ignore_ascii_case("jpg") || e.eq_ignore_ascii_case("jpeg"))
}
