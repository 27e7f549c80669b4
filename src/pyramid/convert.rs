//! End-to-end conversion: image file in, pyramid container out.

use std::path::Path;

use tracing::{info, warn};

use crate::config::ConvertConfig;
use crate::error::{ConfigError, PyramidError, SinkError};
use crate::format::PyramidWriter;
use crate::raster::{open_image_file, ImageSink, ImageSource};

use super::builder::{BuildSummary, PyramidBuilder};
use super::metadata::PyramidConfig;

/// Convert the image at `config.input` into a pyramid at `config.output`.
///
/// Validates the configuration, opens the source, plans and declares the
/// metadata, builds every tile, then closes the writer and the source. A
/// failed conversion leaves no output file behind.
pub fn convert(config: &ConvertConfig) -> Result<BuildSummary, PyramidError> {
    config.validate()?;

    let mut source = open_image_file(&config.input)?;
    let result = convert_source(&mut source, &config.output, &config.pyramid_config());
    let closed = source.close();

    let summary = result?;
    closed?;
    Ok(summary)
}

/// Build a pyramid from any [`ImageSource`] into a container at `output`.
///
/// The source is left open; closing it is up to the caller.
pub fn convert_source<S: ImageSource + ?Sized>(
    source: &mut S,
    output: &Path,
    config: &PyramidConfig,
) -> Result<BuildSummary, PyramidError> {
    let builder = PyramidBuilder::new(config.clone())?;
    let metadata = builder.plan(source)?;

    let mut writer =
        PyramidWriter::create(output, metadata.clone()).map_err(|e| match e {
            SinkError::Io(io) => PyramidError::Config(ConfigError::OutputNotWritable {
                path: output.display().to_string(),
                reason: io.to_string(),
            }),
            other => PyramidError::Sink(other),
        })?;

    let result = builder
        .build(source, &mut writer, &metadata)
        .and_then(|summary| {
            writer.close()?;
            Ok(summary)
        });

    match result {
        Ok(summary) => {
            info!(
                "Wrote {}: {} tiles from {} megapixels read",
                output.display(),
                summary.tiles_written,
                summary.pixels_read / 1_000_000
            );
            Ok(summary)
        }
        Err(e) => {
            drop(writer);
            discard_output(output);
            Err(e)
        }
    }
}

/// Remove a partially written output file.
fn discard_output(output: &Path) {
    if let Err(e) = std::fs::remove_file(output) {
        warn!("Failed to remove partial output {}: {}", output.display(), e);
    } else {
        info!("Removed partial output {}", output.display());
    }
}
