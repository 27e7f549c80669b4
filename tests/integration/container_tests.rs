//! Container integration tests.
//!
//! Tests verify:
//! - Pyramids built into a writer read back pixel-exact
//! - Aborted writes produce files readers reject
//! - Validation reports corrupted payloads and broken indexes

use pyramid_tiler::error::{FormatError, SinkError};
use pyramid_tiler::format::container::{ContainerTrailer, TRAILER_SIZE};
use pyramid_tiler::io::MemoryRangeReader;
use pyramid_tiler::raster::{ImageGeometry, ImageSink, MemorySource, PixelFormatFacts, Region};
use pyramid_tiler::tile::{BoxDownsampler, TileSize, TileSizeMode};
use pyramid_tiler::{PyramidBuilder, PyramidConfig, PyramidReader, PyramidWriter};

use super::test_utils::{gray_pattern, gray_source, rgb16_pattern};

fn build_container(source: &mut MemorySource, config: PyramidConfig) -> Vec<u8> {
    let builder = PyramidBuilder::new(config).unwrap();
    let metadata = builder.plan(source).unwrap();
    let mut writer = PyramidWriter::new(Vec::new(), "memory", metadata.clone()).unwrap();
    builder.build(source, &mut writer, &metadata).unwrap();
    writer.close().unwrap();
    writer.into_inner()
}

fn open(bytes: Vec<u8>) -> Result<PyramidReader<MemoryRangeReader>, FormatError> {
    PyramidReader::open(MemoryRangeReader::new(bytes, "memory"))
}

fn fixed(size: u32) -> TileSizeMode {
    TileSizeMode::Fixed(TileSize::square(size).unwrap())
}

#[test]
fn test_roundtrip_multi_plane_levels() {
    let mut source = gray_source(130, 70, 2);
    let bytes = build_container(&mut source, PyramidConfig::new(2, 2, fixed(32)));
    let reader = open(bytes).unwrap();

    assert!(reader.validate().is_valid);
    assert_eq!(reader.series_count(), 1);
    assert_eq!(reader.resolution_count(0), Some(3));
    assert_eq!(
        reader.level_dimensions(0, 2),
        Some(ImageGeometry::new(32, 17))
    );

    let format = PixelFormatFacts::new(1, 1);
    for plane in 0..2 {
        let base = gray_pattern(130, 70, plane as u32);
        assert_eq!(reader.read_level(0, 0, plane).unwrap().to_vec(), base);

        let expected = BoxDownsampler::new()
            .downsample(&base, 130, 70, 4, &format)
            .unwrap();
        assert_eq!(
            reader.read_level(0, 2, plane).unwrap(),
            expected.data,
            "plane {}",
            plane
        );
    }
}

#[test]
fn test_roundtrip_rgb16() {
    let format = PixelFormatFacts::new(2, 3);
    let pixels = rgb16_pattern(40, 24);
    let mut source = MemorySource::new(format)
        .with_series(ImageGeometry::new(40, 24), vec![pixels.clone()])
        .unwrap();

    let bytes = build_container(&mut source, PyramidConfig::new(1, 2, fixed(16)));
    let reader = open(bytes).unwrap();

    assert_eq!(reader.metadata().pixel_format, format);
    assert_eq!(reader.read_level(0, 0, 0).unwrap().to_vec(), pixels);

    let tile = reader.read_tile(0, 1, 0, 16, 0).unwrap();
    assert_eq!(tile.len(), 4 * 12 * 6);
}

#[test]
fn test_file_roundtrip() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("pyramid.tpyr");

    let mut source = gray_source(50, 50, 1);
    let builder = PyramidBuilder::new(PyramidConfig::new(1, 2, fixed(20))).unwrap();
    let metadata = builder.plan(&source).unwrap();
    let mut writer = PyramidWriter::create(&path, metadata.clone()).unwrap();
    builder.build(&mut source, &mut writer, &metadata).unwrap();
    writer.close().unwrap();
    drop(writer);

    let reader = PyramidReader::open_path(&path).unwrap();
    assert_eq!(reader.metadata(), &metadata);
    assert!(reader.validate_payloads().is_valid);
    assert_eq!(reader.tiles(0, 0, 0).count(), 9);
    assert_eq!(reader.tiles(0, 1, 0).count(), 4);
}

#[test]
fn test_unclosed_writer_is_rejected() {
    let mut source = gray_source(16, 16, 1);
    let builder = PyramidBuilder::new(PyramidConfig::new(0, 2, fixed(16))).unwrap();
    let metadata = builder.plan(&source).unwrap();
    let mut writer = PyramidWriter::new(Vec::new(), "memory", metadata.clone()).unwrap();
    builder.build(&mut source, &mut writer, &metadata).unwrap();

    // No close: no index, no trailer.
    let bytes = writer.into_inner();
    assert!(open(bytes).is_err());
}

#[test]
fn test_incomplete_writer_fails_to_close() {
    let source = gray_source(64, 32, 1);
    let builder = PyramidBuilder::new(PyramidConfig::new(0, 2, fixed(32))).unwrap();
    let metadata = builder.plan(&source).unwrap();
    let mut writer = PyramidWriter::new(Vec::new(), "memory", metadata).unwrap();

    writer.set_series(0).unwrap();
    writer
        .write_tile(0, &[0u8; 32 * 32], Region::new(0, 0, 32, 32))
        .unwrap();

    assert!(matches!(
        writer.close(),
        Err(SinkError::Incomplete {
            written: 1024,
            expected: 2048,
            ..
        })
    ));
    assert!(open(writer.into_inner()).is_err());
}

#[test]
fn test_corruption_reported_by_validation() {
    let mut source = gray_source(32, 32, 1);
    let mut bytes = build_container(&mut source, PyramidConfig::new(0, 2, fixed(16)));

    let reader = open(bytes.clone()).unwrap();
    let victim = reader.entries()[2].clone();
    bytes[victim.offset as usize + 5] ^= 0x55;

    let reader = open(bytes).unwrap();
    assert!(reader.validate().is_valid, "geometry is still intact");

    let result = reader.validate_payloads();
    assert!(!result.is_valid);
    assert_eq!(result.errors.len(), 1);
    assert!(matches!(
        reader.read_tile(0, 0, 0, victim.x, victim.y),
        Err(FormatError::ChecksumMismatch { .. })
    ));
    assert!(matches!(
        reader.read_level(0, 0, 0),
        Err(FormatError::ChecksumMismatch { .. })
    ));
}

#[test]
fn test_index_pointing_outside_payloads_rejected() {
    let mut source = gray_source(8, 8, 1);
    let bytes = build_container(&mut source, PyramidConfig::new(0, 2, fixed(8)));

    // Rewrite the trailer so the index range starts inside the manifest.
    let len = bytes.len();
    let mut broken = bytes.clone();
    let trailer = ContainerTrailer {
        index_offset: 2,
        index_len: 4,
    };
    broken[len - TRAILER_SIZE..].copy_from_slice(&trailer.to_bytes());
    assert!(matches!(
        open(broken),
        Err(FormatError::InvalidIndex { .. })
    ));
}

#[test]
fn test_foreign_file_rejected() {
    let mut bytes = vec![0u8; 100];
    bytes[0..4].copy_from_slice(b"II*\0");
    assert!(matches!(open(bytes), Err(FormatError::InvalidMagic(_))));
}
