use std::path::Path;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Instant;

use crate::overlay::domain::composite_style::CompositeStyle;
use crate::overlay::domain::label_metrics::LabelMetrics;
use crate::overlay::domain::overlay_compositor::OverlayCompositor;
use crate::overlay::domain::placement::{resolve, Anchor, Placement};
use crate::pipeline::pipeline_logger::{NullPipelineLogger, PipelineLogger, Stage};
use crate::shared::error::WatermarkError;
use crate::shared::video_metadata::VideoMetadata;
use crate::video::domain::video_reader::VideoReader;
use crate::video::domain::video_writer::VideoWriter;

/// Progress callback: `(frames_done, total_frames)`. Returning `false`
/// requests cancellation at the next frame boundary.
pub type ProgressFn = Box<dyn Fn(usize, usize) -> bool + Send>;

/// Streams a video through the overlay compositor, one frame at a time.
///
/// Frames are decoded, stamped and encoded strictly in order; at most one
/// frame is alive at once. Both ends are closed on every exit path. This
/// is a single-use struct: `execute` consumes it.
pub struct WatermarkVideoUseCase {
    reader: Box<dyn VideoReader>,
    writer: Box<dyn VideoWriter>,
    compositor: OverlayCompositor,
    style: CompositeStyle,
    logger: Box<dyn PipelineLogger>,
    on_progress: Option<ProgressFn>,
    cancelled: Arc<AtomicBool>,
}

impl WatermarkVideoUseCase {
    pub fn new(
        reader: Box<dyn VideoReader>,
        writer: Box<dyn VideoWriter>,
        compositor: OverlayCompositor,
        style: CompositeStyle,
        on_progress: Option<ProgressFn>,
        cancelled: Option<Arc<AtomicBool>>,
    ) -> Self {
        Self {
            reader,
            writer,
            compositor,
            style,
            logger: Box::new(NullPipelineLogger),
            on_progress,
            cancelled: cancelled.unwrap_or_else(|| Arc::new(AtomicBool::new(false))),
        }
    }

    pub fn with_logger(mut self, logger: Box<dyn PipelineLogger>) -> Self {
        self.logger = logger;
        self
    }

    /// Watermarks every frame of `input` with `text` and writes the result
    /// to `output`. Returns the number of frames written.
    pub fn execute(
        self,
        input: &Path,
        output: &Path,
        text: &str,
        placement: Placement,
    ) -> Result<usize, WatermarkError> {
        let Self {
            mut reader,
            mut writer,
            compositor,
            style,
            mut logger,
            on_progress,
            cancelled,
        } = self;

        if !input.exists() {
            return Err(WatermarkError::InputNotFound(input.to_path_buf()));
        }

        let metadata = match reader.open(input) {
            Ok(metadata) => metadata,
            Err(e) => {
                reader.close();
                return Err(WatermarkError::open_failure(input, e));
            }
        };

        let metrics = match compositor.measure(text, &style) {
            Ok(metrics) => metrics,
            Err(e) => {
                reader.close();
                return Err(e);
            }
        };
        log::debug!(
            "Label {:?} measures {}x{} (baseline {})",
            text,
            metrics.width,
            metrics.height,
            metrics.baseline
        );

        let sink_metadata = VideoMetadata {
            fps: metadata.effective_fps(),
            ..metadata.clone()
        };
        if let Err(e) = writer.open(output, &sink_metadata) {
            reader.close();
            close_writer(writer.as_mut());
            return Err(WatermarkError::open_failure(output, e));
        }

        logger.info(&format!(
            "Watermarking {}x{} @ {:.2} fps, placement {placement}",
            metadata.width,
            metadata.height,
            sink_metadata.fps
        ));

        let frame_loop = FrameLoop {
            compositor: &compositor,
            style: &style,
            text,
            placement,
            metrics,
            total_frames: metadata.total_frames,
            on_progress: on_progress.as_deref(),
            cancelled: &cancelled,
        };
        let result = frame_loop.run(reader.as_mut(), writer.as_mut(), logger.as_mut());

        reader.close();
        let result = match result {
            Ok(count) => writer
                .close()
                .map(|()| count)
                .map_err(|e| WatermarkError::WriteFailure(format!("failed to finalize output: {e}"))),
            Err(e) => {
                close_writer(writer.as_mut());
                Err(e)
            }
        };

        logger.summary();
        result
    }
}

/// Closes the sink on a failure path. A close error is logged so it never
/// replaces the failure already being reported.
fn close_writer(writer: &mut dyn VideoWriter) {
    if let Err(e) = writer.close() {
        log::warn!("Failed to close output: {e}");
    }
}

/// Read-only state shared by every iteration of the frame loop.
struct FrameLoop<'a> {
    compositor: &'a OverlayCompositor,
    style: &'a CompositeStyle,
    text: &'a str,
    placement: Placement,
    metrics: LabelMetrics,
    total_frames: usize,
    on_progress: Option<&'a (dyn Fn(usize, usize) -> bool + Send)>,
    cancelled: &'a AtomicBool,
}

impl FrameLoop<'_> {
    fn run(
        &self,
        reader: &mut dyn VideoReader,
        writer: &mut dyn VideoWriter,
        logger: &mut dyn PipelineLogger,
    ) -> Result<usize, WatermarkError> {
        let mut frames = reader.frames();
        let mut anchor: Option<Anchor> = None;
        let mut written = 0;

        loop {
            if self.cancelled.load(Ordering::Relaxed) {
                log::info!("Cancelled after {written} frames");
                return Err(WatermarkError::Cancelled);
            }

            let started = Instant::now();
            let Some(next) = frames.next() else {
                break;
            };
            let frame = next.map_err(|e| WatermarkError::ReadFailure(e.to_string()))?;
            logger.timing(Stage::Decode, started.elapsed());

            // Frame size is fixed for the whole video, so the anchor is too.
            let anchor = *anchor.get_or_insert_with(|| {
                resolve(
                    self.placement,
                    frame.width(),
                    frame.height(),
                    self.metrics.width,
                    self.metrics.height,
                    self.style,
                )
            });

            let started = Instant::now();
            let frame =
                self.compositor
                    .composite(frame, anchor, self.text, &self.metrics, self.style)?;
            logger.timing(Stage::Composite, started.elapsed());

            let started = Instant::now();
            writer
                .write(&frame)
                .map_err(|e| WatermarkError::WriteFailure(e.to_string()))?;
            logger.timing(Stage::Encode, started.elapsed());

            written += 1;
            logger.progress(written, self.total_frames);
            if let Some(on_progress) = self.on_progress {
                if !on_progress(written, self.total_frames) {
                    self.cancelled.store(true, Ordering::Relaxed);
                }
            }
        }

        Ok(written)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::overlay::domain::overlay_compositor::BackingBox;
    use crate::overlay::domain::text_renderer::TextRenderer;
    use crate::shared::frame::Frame;
    use std::path::PathBuf;
    use std::sync::Mutex;

    type BoxError = Box<dyn std::error::Error>;

    // --- Stubs ---

    #[derive(Default)]
    struct ReaderProbe {
        opened: bool,
        closed: bool,
    }

    struct StubReader {
        frames: Vec<Frame>,
        width: u32,
        height: u32,
        fps: f64,
        fail_open: bool,
        fail_at: Option<usize>,
        probe: Arc<Mutex<ReaderProbe>>,
    }

    impl StubReader {
        fn new(frames: Vec<Frame>) -> Self {
            Self {
                frames,
                width: 100,
                height: 50,
                fps: 24.0,
                fail_open: false,
                fail_at: None,
                probe: Arc::new(Mutex::new(ReaderProbe::default())),
            }
        }
    }

    impl VideoReader for StubReader {
        fn open(&mut self, path: &Path) -> Result<VideoMetadata, BoxError> {
            if self.fail_open {
                return Err("not a video".into());
            }
            self.probe.lock().unwrap().opened = true;
            Ok(VideoMetadata {
                width: self.width,
                height: self.height,
                fps: self.fps,
                total_frames: self.frames.len(),
                codec: "stub".to_string(),
                source_path: Some(path.to_path_buf()),
            })
        }

        fn frames(&mut self) -> Box<dyn Iterator<Item = Result<Frame, BoxError>> + '_> {
            let fail_at = self.fail_at;
            Box::new(self.frames.drain(..).enumerate().map(move |(i, f)| {
                if Some(i) == fail_at {
                    Err("corrupt packet".into())
                } else {
                    Ok(f)
                }
            }))
        }

        fn close(&mut self) {
            self.probe.lock().unwrap().closed = true;
        }
    }

    #[derive(Default)]
    struct WriterProbe {
        opened_with: Option<VideoMetadata>,
        written: Vec<Frame>,
        closed: bool,
    }

    #[derive(Default)]
    struct StubWriter {
        fail_open: bool,
        fail_write_at: Option<usize>,
        fail_close: bool,
        probe: Arc<Mutex<WriterProbe>>,
    }

    impl VideoWriter for StubWriter {
        fn open(&mut self, _path: &Path, metadata: &VideoMetadata) -> Result<(), BoxError> {
            if self.fail_open {
                return Err("read-only filesystem".into());
            }
            self.probe.lock().unwrap().opened_with = Some(metadata.clone());
            Ok(())
        }

        fn write(&mut self, frame: &Frame) -> Result<(), BoxError> {
            let mut probe = self.probe.lock().unwrap();
            if Some(probe.written.len()) == self.fail_write_at {
                return Err("disk full".into());
            }
            probe.written.push(frame.clone());
            Ok(())
        }

        fn close(&mut self) -> Result<(), BoxError> {
            self.probe.lock().unwrap().closed = true;
            if self.fail_close {
                return Err("trailer write failed".into());
            }
            Ok(())
        }
    }

    /// Reports a fixed 20x10 label and paints its area white.
    struct BlockRenderer {
        fail: bool,
    }

    impl TextRenderer for BlockRenderer {
        fn measure(&self, _text: &str, _style: &CompositeStyle) -> Result<LabelMetrics, BoxError> {
            if self.fail {
                return Err("font missing".into());
            }
            Ok(LabelMetrics::new(20, 10, 0))
        }

        fn stamp(
            &self,
            frame: &mut Frame,
            anchor: Anchor,
            _text: &str,
            style: &CompositeStyle,
        ) -> Result<(), BoxError> {
            let area = glyph_area(anchor, frame);
            let w = frame.width() as usize;
            let data = frame.data_mut();
            for y in area.top..area.bottom {
                for x in area.left..area.right {
                    let offset = (y as usize * w + x as usize) * 3;
                    data[offset..offset + 3].copy_from_slice(&style.text_color);
                }
            }
            Ok(())
        }
    }

    fn glyph_area(anchor: Anchor, frame: &Frame) -> BackingBox {
        let no_pad = CompositeStyle {
            padding: 0,
            ..CompositeStyle::default()
        };
        BackingBox::around(
            anchor,
            &LabelMetrics::new(20, 10, 0),
            &no_pad,
            frame.width(),
            frame.height(),
        )
    }

    // --- Helpers ---

    fn make_frames(count: usize) -> Vec<Frame> {
        (0..count)
            .map(|i| Frame::filled(100, 50, [200, 150, 100], i))
            .collect()
    }

    fn existing_input() -> (tempfile::TempDir, PathBuf) {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("in.mp4");
        std::fs::write(&path, b"stub").unwrap();
        (dir, path)
    }

    fn use_case(reader: StubReader, writer: StubWriter) -> WatermarkVideoUseCase {
        use_case_with_renderer(reader, writer, BlockRenderer { fail: false })
    }

    fn use_case_with_renderer(
        reader: StubReader,
        writer: StubWriter,
        renderer: BlockRenderer,
    ) -> WatermarkVideoUseCase {
        WatermarkVideoUseCase::new(
            Box::new(reader),
            Box::new(writer),
            OverlayCompositor::new(Box::new(renderer)),
            CompositeStyle::default(),
            None,
            None,
        )
    }

    fn out_path() -> PathBuf {
        PathBuf::from("/tmp/watermarked.mp4")
    }

    // --- Tests ---

    #[test]
    fn test_center_label_on_100x50_frames() {
        let (_dir, input) = existing_input();
        let writer = StubWriter::default();
        let probe = writer.probe.clone();

        let count = use_case(StubReader::new(make_frames(4)), writer)
            .execute(&input, &out_path(), "HI", Placement::Center)
            .unwrap();
        assert_eq!(count, 4);

        let probe = probe.lock().unwrap();
        assert_eq!(probe.written.len(), 4);

        // anchor (40, 30); box [30, 70) x [10, 40); glyphs [40, 60) x [20, 30)
        let bbox = BackingBox {
            left: 30,
            top: 10,
            right: 70,
            bottom: 40,
        };
        let glyphs = BackingBox {
            left: 40,
            top: 20,
            right: 60,
            bottom: 30,
        };
        for (i, frame) in probe.written.iter().enumerate() {
            assert_eq!(frame.index(), i);
            assert_eq!((frame.width(), frame.height()), (100, 50));
            for y in 0..50 {
                for x in 0..100 {
                    let px = frame.pixel(x, y).unwrap();
                    let want = if glyphs.contains(x, y) {
                        [255, 255, 255]
                    } else if bbox.contains(x, y) {
                        [120, 90, 60]
                    } else {
                        [200, 150, 100]
                    };
                    assert_eq!(px, want, "frame {i} pixel ({x}, {y})");
                }
            }
        }
    }

    #[test]
    fn test_anchor_is_identical_across_frames() {
        let (_dir, input) = existing_input();
        let writer = StubWriter::default();
        let probe = writer.probe.clone();

        use_case(StubReader::new(make_frames(6)), writer)
            .execute(&input, &out_path(), "HI", Placement::TopRight)
            .unwrap();

        let probe = probe.lock().unwrap();
        let first = probe.written[0].data();
        assert!(probe.written.iter().all(|f| f.data() == first));
    }

    #[test]
    fn test_empty_video_writes_nothing_and_succeeds() {
        let (_dir, input) = existing_input();
        let reader = StubReader::new(vec![]);
        let reader_probe = reader.probe.clone();
        let writer = StubWriter::default();
        let writer_probe = writer.probe.clone();

        let count = use_case(reader, writer)
            .execute(&input, &out_path(), "HI", Placement::Center)
            .unwrap();

        assert_eq!(count, 0);
        let writer_probe = writer_probe.lock().unwrap();
        assert!(writer_probe.written.is_empty());
        assert!(writer_probe.opened_with.is_some());
        assert!(writer_probe.closed);
        assert!(reader_probe.lock().unwrap().closed);
    }

    #[test]
    fn test_sink_matches_source_geometry_and_rate() {
        let (_dir, input) = existing_input();
        let writer = StubWriter::default();
        let probe = writer.probe.clone();

        use_case(StubReader::new(make_frames(1)), writer)
            .execute(&input, &out_path(), "HI", Placement::BottomLeft)
            .unwrap();

        let opened = probe.lock().unwrap().opened_with.clone().unwrap();
        assert_eq!((opened.width, opened.height), (100, 50));
        assert!((opened.fps - 24.0).abs() < f64::EPSILON);
    }

    #[test]
    fn test_unknown_source_rate_falls_back_to_default() {
        let (_dir, input) = existing_input();
        let mut reader = StubReader::new(make_frames(1));
        reader.fps = 0.0;
        let writer = StubWriter::default();
        let probe = writer.probe.clone();

        use_case(reader, writer)
            .execute(&input, &out_path(), "HI", Placement::Center)
            .unwrap();

        let opened = probe.lock().unwrap().opened_with.clone().unwrap();
        assert!((opened.fps - 30.0).abs() < f64::EPSILON);
    }

    #[test]
    fn test_missing_input_is_input_not_found() {
        let reader = StubReader::new(make_frames(2));
        let reader_probe = reader.probe.clone();
        let writer = StubWriter::default();
        let writer_probe = writer.probe.clone();

        let err = use_case(reader, writer)
            .execute(
                Path::new("/nonexistent/in.mp4"),
                &out_path(),
                "HI",
                Placement::Center,
            )
            .unwrap_err();

        assert!(matches!(err, WatermarkError::InputNotFound(_)));
        assert!(!reader_probe.lock().unwrap().opened);
        assert!(writer_probe.lock().unwrap().opened_with.is_none());
    }

    #[test]
    fn test_unopenable_source_is_open_failure() {
        let (_dir, input) = existing_input();
        let mut reader = StubReader::new(make_frames(2));
        reader.fail_open = true;
        let writer = StubWriter::default();
        let writer_probe = writer.probe.clone();

        let err = use_case(reader, writer)
            .execute(&input, &out_path(), "HI", Placement::Center)
            .unwrap_err();

        assert!(matches!(err, WatermarkError::OpenFailure { .. }));
        assert!(writer_probe.lock().unwrap().opened_with.is_none());
    }

    #[test]
    fn test_unopenable_sink_is_open_failure_and_closes_source() {
        let (_dir, input) = existing_input();
        let reader = StubReader::new(make_frames(2));
        let reader_probe = reader.probe.clone();
        let writer = StubWriter {
            fail_open: true,
            ..StubWriter::default()
        };

        let err = use_case(reader, writer)
            .execute(&input, &out_path(), "HI", Placement::Center)
            .unwrap_err();

        match err {
            WatermarkError::OpenFailure { path, .. } => assert_eq!(path, out_path()),
            other => panic!("unexpected error: {other}"),
        }
        assert!(reader_probe.lock().unwrap().closed);
    }

    #[test]
    fn test_render_failure_aborts_before_sink_opens() {
        let (_dir, input) = existing_input();
        let reader = StubReader::new(make_frames(2));
        let reader_probe = reader.probe.clone();
        let writer = StubWriter::default();
        let writer_probe = writer.probe.clone();

        let err = use_case_with_renderer(reader, writer, BlockRenderer { fail: true })
            .execute(&input, &out_path(), "HI", Placement::Center)
            .unwrap_err();

        assert!(matches!(err, WatermarkError::RenderUnavailable(_)));
        assert!(reader_probe.lock().unwrap().closed);
        assert!(writer_probe.lock().unwrap().opened_with.is_none());
    }

    #[test]
    fn test_write_failure_stops_stream_and_closes_both_ends() {
        let (_dir, input) = existing_input();
        let reader = StubReader::new(make_frames(5));
        let reader_probe = reader.probe.clone();
        let writer = StubWriter {
            fail_write_at: Some(2),
            ..StubWriter::default()
        };
        let writer_probe = writer.probe.clone();

        let err = use_case(reader, writer)
            .execute(&input, &out_path(), "HI", Placement::Center)
            .unwrap_err();

        assert!(matches!(err, WatermarkError::WriteFailure(_)));
        let writer_probe = writer_probe.lock().unwrap();
        assert_eq!(writer_probe.written.len(), 2);
        assert!(writer_probe.closed);
        assert!(reader_probe.lock().unwrap().closed);
    }

    #[test]
    fn test_decode_failure_is_read_failure() {
        let (_dir, input) = existing_input();
        let mut reader = StubReader::new(make_frames(5));
        reader.fail_at = Some(3);
        let writer = StubWriter::default();
        let writer_probe = writer.probe.clone();

        let err = use_case(reader, writer)
            .execute(&input, &out_path(), "HI", Placement::Center)
            .unwrap_err();

        assert!(matches!(err, WatermarkError::ReadFailure(_)));
        let writer_probe = writer_probe.lock().unwrap();
        assert_eq!(writer_probe.written.len(), 3);
        assert!(writer_probe.closed);
    }

    #[test]
    fn test_close_error_does_not_mask_stream_failure() {
        let (_dir, input) = existing_input();
        let writer = StubWriter {
            fail_write_at: Some(0),
            fail_close: true,
            ..StubWriter::default()
        };

        let err = use_case(StubReader::new(make_frames(3)), writer)
            .execute(&input, &out_path(), "HI", Placement::Center)
            .unwrap_err();

        match err {
            WatermarkError::WriteFailure(msg) => assert!(msg.contains("disk full")),
            other => panic!("unexpected error: {other}"),
        }
    }

    #[test]
    fn test_close_error_after_success_is_reported() {
        let (_dir, input) = existing_input();
        let writer = StubWriter {
            fail_close: true,
            ..StubWriter::default()
        };

        let err = use_case(StubReader::new(make_frames(2)), writer)
            .execute(&input, &out_path(), "HI", Placement::Center)
            .unwrap_err();

        match err {
            WatermarkError::WriteFailure(msg) => assert!(msg.contains("trailer")),
            other => panic!("unexpected error: {other}"),
        }
    }

    #[test]
    fn test_pre_cancelled_run_writes_nothing() {
        let (_dir, input) = existing_input();
        let reader = StubReader::new(make_frames(3));
        let reader_probe = reader.probe.clone();
        let writer = StubWriter::default();
        let writer_probe = writer.probe.clone();

        let uc = WatermarkVideoUseCase::new(
            Box::new(reader),
            Box::new(writer),
            OverlayCompositor::new(Box::new(BlockRenderer { fail: false })),
            CompositeStyle::default(),
            None,
            Some(Arc::new(AtomicBool::new(true))),
        );
        let err = uc
            .execute(&input, &out_path(), "HI", Placement::Center)
            .unwrap_err();

        assert!(matches!(err, WatermarkError::Cancelled));
        let writer_probe = writer_probe.lock().unwrap();
        assert!(writer_probe.written.is_empty());
        assert!(writer_probe.closed);
        assert!(reader_probe.lock().unwrap().closed);
    }

    #[test]
    fn test_progress_callback_reports_and_can_cancel() {
        let (_dir, input) = existing_input();
        let writer = StubWriter::default();
        let writer_probe = writer.probe.clone();
        let seen = Arc::new(Mutex::new(Vec::new()));
        let seen_in_cb = seen.clone();

        let progress: ProgressFn = Box::new(move |current, total| {
            seen_in_cb.lock().unwrap().push((current, total));
            current < 2
        });
        let uc = WatermarkVideoUseCase::new(
            Box::new(StubReader::new(make_frames(5))),
            Box::new(writer),
            OverlayCompositor::new(Box::new(BlockRenderer { fail: false })),
            CompositeStyle::default(),
            Some(progress),
            None,
        );
        let err = uc
            .execute(&input, &out_path(), "HI", Placement::Center)
            .unwrap_err();

        assert!(matches!(err, WatermarkError::Cancelled));
        assert_eq!(*seen.lock().unwrap(), vec![(1, 5), (2, 5)]);
        assert_eq!(writer_probe.lock().unwrap().written.len(), 2);
    }

    #[test]
    fn test_ffmpeg_round_trip() {
        use crate::video::infrastructure::ffmpeg_reader::tests::create_test_video;
        use crate::video::infrastructure::ffmpeg_reader::FfmpegReader;
        use crate::video::infrastructure::ffmpeg_writer::FfmpegWriter;

        let dir = tempfile::tempdir().unwrap();
        let input = dir.path().join("in.mp4");
        let output = dir.path().join("out.mp4");
        create_test_video(&input, 4, 160, 120, 25);

        let uc = WatermarkVideoUseCase::new(
            Box::new(FfmpegReader::new()),
            Box::new(FfmpegWriter::new()),
            OverlayCompositor::new(Box::new(BlockRenderer { fail: false })),
            CompositeStyle::default(),
            None,
            None,
        );
        let count = uc
            .execute(&input, &output, "HI", Placement::BottomRight)
            .unwrap();
        assert_eq!(count, 4);

        let mut reader = FfmpegReader::new();
        let meta = reader.open(&output).unwrap();
        assert_eq!((meta.width, meta.height), (160, 120));
        assert!((meta.fps - 25.0).abs() < 0.5, "fps was {}", meta.fps);
        assert_eq!(reader.frames().count(), 4);
    }
}
