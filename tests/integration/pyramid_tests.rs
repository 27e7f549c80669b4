//! Pyramid builder integration tests.
//!
//! Tests verify:
//! - Grid geometry and call order for tiled and whole-image pyramids
//! - Level tiles are read at full resolution and downsampled once
//! - Tiled and whole-image modes produce identical levels
//! - Source and sink failures abort the build
//! - Converting into a container leaves the source to the caller

use pyramid_tiler::error::{PyramidError, SinkError, SourceError};
use pyramid_tiler::raster::{ImageGeometry, ImageSource, MemorySource, PixelFormatFacts, Region};
use pyramid_tiler::tile::{BoxDownsampler, TileSize, TileSizeMode};
use pyramid_tiler::pyramid::convert_source;
use pyramid_tiler::{PyramidBuilder, PyramidConfig, PyramidReader};

use super::test_utils::{
    gray_pattern, gray_source, rgb16_pattern, RecordingSink, SinkCall, TrackingSource,
};

fn fixed(size: u32) -> TileSizeMode {
    TileSizeMode::Fixed(TileSize::square(size).unwrap())
}

fn build(
    source: &mut TrackingSource,
    config: PyramidConfig,
) -> Result<RecordingSink, PyramidError> {
    let builder = PyramidBuilder::new(config)?;
    let metadata = builder.plan(&*source)?;
    let mut sink = RecordingSink::new();
    builder.build(source, &mut sink, &metadata)?;
    Ok(sink)
}

// =============================================================================
// Geometry
// =============================================================================

#[test]
fn test_tiled_pyramid_2000x1500() {
    let mut source = TrackingSource::new(gray_source(2000, 1500, 1));
    let builder = PyramidBuilder::new(PyramidConfig::new(2, 2, fixed(512))).unwrap();
    let metadata = builder.plan(&source).unwrap();

    assert_eq!(
        metadata.series[0].levels,
        vec![
            ImageGeometry::new(2000, 1500),
            ImageGeometry::new(1000, 750),
            ImageGeometry::new(500, 375),
        ]
    );

    let mut sink = RecordingSink::new();
    let summary = builder.build(&mut source, &mut sink, &metadata).unwrap();
    assert_eq!(summary.tiles_written, 12 + 4 + 1);

    let base = sink.tiles_of(0, 0, 0);
    assert_eq!(base.len(), 12);
    let widths: Vec<u32> = base.iter().take(4).map(|t| t.region.width).collect();
    assert_eq!(widths, vec![512, 512, 512, 464]);
    let heights: Vec<u32> = base.iter().step_by(4).map(|t| t.region.height).collect();
    assert_eq!(heights, vec![512, 512, 476]);
    assert_eq!(base[11].region, Region::new(1536, 1024, 464, 476));

    let level1 = sink.tiles_of(0, 1, 0);
    assert_eq!(
        level1.iter().map(|t| t.region).collect::<Vec<_>>(),
        vec![
            Region::new(0, 0, 512, 512),
            Region::new(512, 0, 488, 512),
            Region::new(0, 512, 512, 238),
            Region::new(512, 512, 488, 238),
        ]
    );

    let level2 = sink.tiles_of(0, 2, 0);
    assert_eq!(level2.len(), 1);
    assert_eq!(level2[0].region, Region::new(0, 0, 500, 375));

    // Base tiles are read exactly; level tiles are read at full resolution.
    assert_eq!(source.requests[11].region, Region::new(1536, 1024, 464, 476));
    assert_eq!(source.requests[15].region, Region::new(1024, 1024, 976, 476));
    assert_eq!(source.requests[16].region, Region::new(0, 0, 2000, 1500));
}

#[test]
fn test_whole_image_pyramid_800x600() {
    let mut source = TrackingSource::new(gray_source(800, 600, 1));
    let sink = build(&mut source, PyramidConfig::new(1, 2, TileSizeMode::WholeImage)).unwrap();

    assert_eq!(sink.tiles.len(), 2);
    assert_eq!(sink.tiles[0].region, Region::new(0, 0, 800, 600));
    assert_eq!(sink.tiles[1].region, Region::new(0, 0, 400, 300));

    // One read per level, both of the whole base image.
    assert_eq!(source.requests.len(), 2);
    assert!(source
        .requests
        .iter()
        .all(|r| r.region == Region::new(0, 0, 800, 600)));

    let expected = BoxDownsampler::new()
        .downsample(
            &gray_pattern(800, 600, 0),
            800,
            600,
            2,
            &PixelFormatFacts::new(1, 1),
        )
        .unwrap();
    assert_eq!(sink.tiles[1].data, expected.data.to_vec());
}

#[test]
fn test_base_only_pyramid() {
    let mut source = TrackingSource::new(gray_source(100, 100, 1));
    let sink = build(&mut source, PyramidConfig::new(0, 2, fixed(64))).unwrap();

    assert_eq!(sink.tile_counts().len(), 1);
    assert_eq!(sink.tiles.len(), 4);
    let format = PixelFormatFacts::new(1, 1);
    assert_eq!(
        sink.stitch(0, 0, 0, ImageGeometry::new(100, 100), &format),
        gray_pattern(100, 100, 0)
    );
}

#[test]
fn test_image_smaller_than_tile() {
    let mut source = TrackingSource::new(gray_source(100, 40, 1));
    let sink = build(&mut source, PyramidConfig::new(1, 2, fixed(512))).unwrap();

    assert_eq!(sink.tiles[0].region, Region::new(0, 0, 100, 40));
    assert_eq!(sink.tiles[1].region, Region::new(0, 0, 50, 20));
}

// =============================================================================
// Ordering
// =============================================================================

#[test]
fn test_call_order_series_planes_levels() {
    let format = PixelFormatFacts::new(1, 1);
    let memory = MemorySource::new(format)
        .with_series(
            ImageGeometry::new(8, 8),
            vec![gray_pattern(8, 8, 0), gray_pattern(8, 8, 1)],
        )
        .unwrap()
        .with_series(ImageGeometry::new(4, 4), vec![gray_pattern(4, 4, 2)])
        .unwrap();
    let mut source = TrackingSource::new(memory);

    let sink = build(&mut source, PyramidConfig::new(1, 2, fixed(4))).unwrap();

    let structure: Vec<&SinkCall> = sink
        .calls
        .iter()
        .filter(|c| !matches!(c, SinkCall::WriteTile { .. }))
        .collect();
    assert_eq!(
        structure,
        vec![
            &SinkCall::SetSeries(0),
            &SinkCall::SetResolution(0),
            &SinkCall::SetResolution(1),
            &SinkCall::SetResolution(0),
            &SinkCall::SetResolution(1),
            &SinkCall::SetSeries(1),
            &SinkCall::SetResolution(0),
            &SinkCall::SetResolution(1),
        ]
    );

    // Series 0 plane 0 base tiles are row-major.
    let origins: Vec<(u32, u32)> = sink
        .tiles_of(0, 0, 0)
        .iter()
        .map(|t| (t.region.x, t.region.y))
        .collect();
    assert_eq!(origins, vec![(0, 0), (4, 0), (0, 4), (4, 4)]);

    // Every plane of series 0 is complete before series 1 starts.
    let first_series_1 = sink.tiles.iter().position(|t| t.series == 1).unwrap();
    assert!(sink.tiles[..first_series_1].iter().all(|t| t.series == 0));
    assert_eq!(first_series_1, 2 * (4 + 1));

    // Reads follow the same order and never touch another plane.
    assert!(source.requests[..5].iter().all(|r| r.plane == 0));
    assert!(source.requests[5..10].iter().all(|r| r.plane == 1));
    assert!(source.requests[10..].iter().all(|r| r.series == 1));
}

// =============================================================================
// Mode Equivalence
// =============================================================================

#[test]
fn test_tiled_and_whole_image_levels_match() {
    let (width, height) = (300u32, 200u32);
    let planar: Vec<u8> = (0..3)
        .flat_map(|channel| gray_pattern(width, height, channel))
        .collect();
    let cases = [
        (PixelFormatFacts::new(2, 3), rgb16_pattern(width, height)),
        (PixelFormatFacts::new(1, 3).with_interleaved(false), planar),
    ];

    for (format, pixels) in cases {
        let memory = MemorySource::new(format)
            .with_series(ImageGeometry::new(width, height), vec![pixels.clone()])
            .unwrap();

        let mut tiled_source = TrackingSource::new(memory.clone());
        let tiled = build(&mut tiled_source, PyramidConfig::new(3, 2, fixed(64))).unwrap();

        let mut whole_source = TrackingSource::new(memory);
        let whole = build(
            &mut whole_source,
            PyramidConfig::new(3, 2, TileSizeMode::WholeImage),
        )
        .unwrap();

        let base = ImageGeometry::new(width, height);
        assert_eq!(tiled.stitch(0, 0, 0, base, &format), pixels);

        for level in 0..=3usize {
            let factor = 1u32 << level;
            let geometry = ImageGeometry::new(width / factor, height / factor);
            assert_eq!(
                tiled.stitch(0, level, 0, geometry, &format),
                whole.stitch(0, level, 0, geometry, &format),
                "level {} differs (interleaved: {})",
                level,
                format.interleaved
            );
        }
    }
}

#[test]
fn test_constant_image_stays_constant() {
    let memory = MemorySource::new(PixelFormatFacts::new(1, 1))
        .with_series(ImageGeometry::new(333, 257), vec![vec![173u8; 333 * 257]])
        .unwrap();
    let mut source = TrackingSource::new(memory);

    let sink = build(&mut source, PyramidConfig::new(4, 2, fixed(50))).unwrap();
    assert!(sink
        .tiles
        .iter()
        .all(|t| t.data.iter().all(|&v| v == 173)));
}

#[test]
fn test_scale_three_uses_power_of_scale() {
    let mut source = TrackingSource::new(gray_source(90, 90, 1));
    let sink = build(&mut source, PyramidConfig::new(2, 3, fixed(32))).unwrap();

    let level2 = sink.tiles_of(0, 2, 0);
    assert_eq!(level2.len(), 1);
    assert_eq!(level2[0].region, Region::new(0, 0, 10, 10));
    // Level 2 tile is read from a 90x90 base region and reduced by 9.
    assert_eq!(
        source.requests.last().unwrap().region,
        Region::new(0, 0, 90, 90)
    );
}

// =============================================================================
// Conversion
// =============================================================================

#[test]
fn test_convert_source_leaves_source_open() {
    let dir = tempfile::tempdir().unwrap();
    let output = dir.path().join("open.tpyr");
    let mut source = TrackingSource::new(gray_source(40, 30, 1));

    let summary =
        convert_source(&mut source, &output, &PyramidConfig::new(1, 2, fixed(16))).unwrap();
    assert_eq!(summary.tiles_written, 6 + 2);
    assert!(!source.closed);

    // The caller closes once the container is complete.
    source.close().unwrap();
    assert!(source.closed);
    assert!(PyramidReader::open_path(&output).unwrap().validate().is_valid);
}

// =============================================================================
// Failures
// =============================================================================

#[test]
fn test_read_past_bounds_fails_before_returning_data() {
    let mut source = gray_source(64, 64, 1);
    let result = source.read_region(0, 0, Region::new(32, 32, 64, 64));
    match result {
        Err(SourceError::RegionOutOfBounds {
            series,
            plane,
            x,
            width,
            image_width,
            ..
        }) => {
            assert_eq!((series, plane, x, width, image_width), (0, 0, 32, 64, 64));
        }
        other => panic!("Expected RegionOutOfBounds, got {:?}", other),
    }
}

#[test]
fn test_source_geometry_mismatch_aborts_build() {
    // Declares 96x64 but only holds 64x64 pixels.
    let mut source =
        TrackingSource::new(gray_source(64, 64, 1)).declaring(ImageGeometry::new(96, 64));

    let builder = PyramidBuilder::new(PyramidConfig::new(1, 2, fixed(32))).unwrap();
    let metadata = builder.plan(&source).unwrap();
    let mut sink = RecordingSink::new();

    let result = builder.build(&mut source, &mut sink, &metadata);
    assert!(matches!(
        result,
        Err(PyramidError::Source(SourceError::RegionOutOfBounds { x: 64, .. }))
    ));
    // The first two tiles of row 0 were written; nothing after the failure.
    assert_eq!(sink.tiles.len(), 2);
    assert_eq!(source.requests.len(), 3);
}

#[test]
fn test_sink_failure_aborts_build() {
    let mut source = TrackingSource::new(gray_source(64, 64, 1));
    let builder = PyramidBuilder::new(PyramidConfig::new(1, 2, fixed(32))).unwrap();
    let metadata = builder.plan(&source).unwrap();
    let mut sink = RecordingSink::failing_on_write(2);

    let result = builder.build(&mut source, &mut sink, &metadata);
    assert!(matches!(
        result,
        Err(PyramidError::Sink(SinkError::Encode { .. }))
    ));
    assert_eq!(sink.tiles.len(), 2);
    assert_eq!(source.requests.len(), 3);
}

#[test]
fn test_too_many_resolutions_rejected_before_io() {
    let mut source = TrackingSource::new(gray_source(16, 16, 1));
    let result = build(&mut source, PyramidConfig::new(5, 2, fixed(8)));

    assert!(matches!(result, Err(PyramidError::Config(_))));
    assert!(source.requests.is_empty());
}
