//! End-to-end conversion tests.
//!
//! Tests verify:
//! - PNG and TIFF inputs convert into valid, readable pyramids
//! - 16-bit samples survive the trip little-endian
//! - Configuration errors are reported before any output is created
//! - Failed conversions leave no output behind

use std::path::Path;

use image::{GrayImage, ImageBuffer, Luma, Rgb, RgbImage};

use pyramid_tiler::error::{ConfigError, PyramidError, SourceError};
use pyramid_tiler::raster::PixelFormatFacts;
use pyramid_tiler::tile::{TileSize, TileSizeMode};
use pyramid_tiler::{convert, ConvertConfig, PyramidReader};

use super::test_utils::gray_pattern;

fn write_gray_png(path: &Path, width: u32, height: u32) -> Vec<u8> {
    let pixels = gray_pattern(width, height, 0);
    GrayImage::from_raw(width, height, pixels.clone())
        .unwrap()
        .save(path)
        .unwrap();
    pixels
}

fn fixed(size: u32) -> TileSizeMode {
    TileSizeMode::Fixed(TileSize::square(size).unwrap())
}

// =============================================================================
// Successful Conversions
// =============================================================================

#[test]
fn test_convert_png() {
    let dir = tempfile::tempdir().unwrap();
    let input = dir.path().join("input.png");
    let output = dir.path().join("output.tpyr");
    let pixels = write_gray_png(&input, 200, 150);

    let config = ConvertConfig::new(&input, &output)
        .with_resolutions(2)
        .with_tile_size(fixed(64));
    let summary = convert(&config).unwrap();

    // 4x3 + 2x2 (100x75) + 1x1 (50x37)
    assert_eq!(summary.series, 1);
    assert_eq!(summary.planes, 1);
    assert_eq!(summary.tiles_written, 12 + 4 + 1);

    let reader = PyramidReader::open_path(&output).unwrap();
    assert!(reader.validate_payloads().is_valid);
    assert_eq!(reader.metadata().pixel_format, PixelFormatFacts::new(1, 1));
    assert_eq!(reader.read_level(0, 0, 0).unwrap().to_vec(), pixels);
    assert_eq!(
        reader.level_dimensions(0, 2).map(|g| (g.width, g.height)),
        Some((50, 37))
    );
}

#[test]
fn test_convert_rgb_tiff_whole_image() {
    let dir = tempfile::tempdir().unwrap();
    let input = dir.path().join("input.tif");
    let output = dir.path().join("output.tpyr");
    RgbImage::from_fn(64, 40, |x, y| Rgb([x as u8, y as u8, 200]))
        .save(&input)
        .unwrap();

    let config = ConvertConfig::new(&input, &output)
        .with_resolutions(3)
        .with_tile_size(TileSizeMode::WholeImage);
    let summary = convert(&config).unwrap();
    assert_eq!(summary.tiles_written, 4);

    let reader = PyramidReader::open_path(&output).unwrap();
    let series = &reader.metadata().series[0];
    assert_eq!((series.tile_width, series.tile_height), (64, 40));
    assert!(reader.validate().is_valid);

    // Level 3 is 8x5; the blue channel is constant.
    let level = reader.read_level(0, 3, 0).unwrap();
    assert_eq!(level.len(), 8 * 5 * 3);
    assert!(level.chunks(3).all(|px| px[2] == 200));
}

#[test]
fn test_convert_gray16_png() {
    let dir = tempfile::tempdir().unwrap();
    let input = dir.path().join("input16.png");
    let output = dir.path().join("output.tpyr");
    let img: ImageBuffer<Luma<u16>, Vec<u16>> = ImageBuffer::from_pixel(32, 32, Luma([0xABCD]));
    img.save(&input).unwrap();

    let config = ConvertConfig::new(&input, &output)
        .with_resolutions(1)
        .with_tile_size(fixed(16));
    convert(&config).unwrap();

    let reader = PyramidReader::open_path(&output).unwrap();
    assert_eq!(reader.metadata().pixel_format, PixelFormatFacts::new(2, 1));

    let level = reader.read_level(0, 1, 0).unwrap();
    assert_eq!(level.len(), 16 * 16 * 2);
    assert!(level.chunks(2).all(|s| s == [0xCD, 0xAB]));
}

// =============================================================================
// Failures
// =============================================================================

#[test]
fn test_missing_input() {
    let dir = tempfile::tempdir().unwrap();
    let output = dir.path().join("output.tpyr");
    let config = ConvertConfig::new(dir.path().join("nope.png"), &output);

    assert!(matches!(
        convert(&config),
        Err(PyramidError::Config(ConfigError::InputNotFound(_)))
    ));
    assert!(!output.exists());
}

#[test]
fn test_undecodable_input() {
    let dir = tempfile::tempdir().unwrap();
    let input = dir.path().join("garbage.png");
    let output = dir.path().join("output.tpyr");
    std::fs::write(&input, b"definitely not an image").unwrap();

    let result = convert(&ConvertConfig::new(&input, &output));
    assert!(matches!(
        result,
        Err(PyramidError::Source(SourceError::Decode { .. }))
    ));
    assert!(!output.exists());
}

#[test]
fn test_too_many_levels_for_image() {
    let dir = tempfile::tempdir().unwrap();
    let input = dir.path().join("small.png");
    let output = dir.path().join("output.tpyr");
    write_gray_png(&input, 20, 20);

    let config = ConvertConfig::new(&input, &output).with_resolutions(5);
    assert!(matches!(
        convert(&config),
        Err(PyramidError::Config(ConfigError::LevelTooSmall { level: 5, .. }))
    ));
    assert!(!output.exists());
}

#[test]
fn test_output_directory_rejected() {
    let dir = tempfile::tempdir().unwrap();
    let input = dir.path().join("input.png");
    write_gray_png(&input, 8, 8);

    let config = ConvertConfig::new(&input, dir.path());
    assert!(matches!(
        convert(&config),
        Err(PyramidError::Config(ConfigError::OutputNotWritable { .. }))
    ));
}

#[test]
fn test_invalid_scale_rejected() {
    let dir = tempfile::tempdir().unwrap();
    let input = dir.path().join("input.png");
    let output = dir.path().join("output.tpyr");
    write_gray_png(&input, 8, 8);

    let config = ConvertConfig::new(&input, &output).with_scale(1);
    assert!(matches!(convert(&config), Err(PyramidError::Config(_))));
    assert!(!output.exists());
}
