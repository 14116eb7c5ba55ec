use self::{
    capture::{CaptureScope, PendingCapture, optimize_for_capture},
    layout::{PageSize, best_fit},
    services::{
        CaptureTarget, DocumentError, ExternalServices, LoadedServices, OutputDocument, RasterizeError,
        RasterizeOptions, ServiceLoadError,
    },
};
use crate::{
    config::{DefaultsConfig, ExportConfig},
    deck::element::Selector,
    presentation::{Presentation, chrome::NotificationKind, effects::ROTATING_PILL_ID},
    timers::{Scheduler, TimerId, TimerTask},
};
use image::{DynamicImage, ImageError, codecs::jpeg::JpegEncoder};
use std::{
    fmt,
    path::{Path, PathBuf},
    time::Duration,
};

pub(crate) mod capture;
pub(crate) mod layout;
pub(crate) mod pdf;
pub(crate) mod rasterizer;
pub(crate) mod services;

const REARM_DELAY: Duration = Duration::from_millis(100);

/// What an export covers.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ExportScope {
    /// Every slide in the deck.
    All,

    /// A single slide, given its 1-based index.
    Slide(usize),
}

impl ExportScope {
    /// The path the exported document is written to unless one is given explicitly.
    pub fn default_output_path(&self, deck_path: &Path) -> PathBuf {
        match self {
            Self::All => deck_path.with_extension("pdf"),
            Self::Slide(slide) => {
                let stem = deck_path.file_stem().map(|s| s.to_string_lossy().into_owned()).unwrap_or_default();
                deck_path.with_file_name(format!("{stem}-slide-{slide}.pdf"))
            }
        }
    }

    fn success_message(&self) -> &'static str {
        match self {
            Self::All => "PDF created successfully!",
            Self::Slide(_) => "Slide exported as PDF!",
        }
    }

    fn failure_message(&self) -> &'static str {
        match self {
            Self::All => "PDF export failed",
            Self::Slide(_) => "Export failed",
        }
    }
}

/// The knobs that control how slides are captured and laid out.
#[derive(Clone, Debug)]
pub(crate) struct ExportOptions {
    pub(crate) settle_delay: Duration,
    pub(crate) rasterize: RasterizeOptions,
    pub(crate) jpeg_quality: u8,
    pub(crate) page_margin: f64,
}

impl ExportOptions {
    pub(crate) fn new(export: &ExportConfig, defaults: &DefaultsConfig) -> Self {
        Self {
            settle_delay: export.settle_delay(),
            rasterize: RasterizeOptions {
                scale: export.scale,
                background: export.background.clone(),
                timeout: export.image_timeout(),
                viewport_width: defaults.viewport_width,
                viewport_height: defaults.viewport_height,
            },
            jpeg_quality: export.jpeg_quality.clamp(1, 100),
            page_margin: export.page_margin_mm,
        }
    }
}

/// An export that's in progress.
struct ExportJob {
    scope: ExportScope,
    targets: Vec<usize>,
    position: usize,
    services: LoadedServices,
    document: Box<dyn OutputDocument>,
    output: PathBuf,
    pending: Option<PendingCapture>,
    settle_timer: Option<TimerId>,
}

impl fmt::Debug for ExportJob {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ExportJob")
            .field("scope", &self.scope)
            .field("targets", &self.targets)
            .field("position", &self.position)
            .field("output", &self.output)
            .field("pending", &self.pending)
            .finish()
    }
}

/// Exports slides one at a time, letting each settle in its capture state before rasterizing it.
///
/// At most one export runs at a time. Starting one while another is running does nothing.
#[derive(Debug)]
pub(crate) struct ExportSequencer {
    services: ExternalServices,
    options: ExportOptions,
    job: Option<ExportJob>,
    outcome: Option<Result<PathBuf, ExportError>>,
}

impl ExportSequencer {
    pub(crate) fn new(services: ExternalServices, options: ExportOptions) -> Self {
        Self { services, options, job: None, outcome: None }
    }

    pub(crate) fn is_exporting(&self) -> bool {
        self.job.is_some()
    }

    /// Takes the result of the last export that finished.
    pub(crate) fn take_outcome(&mut self) -> Option<Result<PathBuf, ExportError>> {
        self.outcome.take()
    }

    /// Starts an export. Returns `false` if another one is running.
    pub(crate) fn start(
        &mut self,
        scope: ExportScope,
        output: PathBuf,
        presentation: &mut Presentation,
        timers: &mut Scheduler,
        now: Duration,
    ) -> bool {
        if self.job.is_some() {
            tracing::debug!("ignoring export request, one is already running");
            return false;
        }
        let targets = match scope {
            ExportScope::All => (1..=presentation.total_slides()).collect(),
            ExportScope::Slide(slide) => vec![slide],
        };
        tracing::info!("exporting {} slides into {}", targets.len(), output.display());
        presentation.chrome_mut().show_overlay();
        presentation.stop_effects(timers);

        let services = match self.services.ensure_loaded() {
            Ok(services) => services,
            Err(e) => {
                self.fail(scope, e.into(), presentation, timers, now);
                return true;
            }
        };
        if let ExportScope::Slide(slide) = scope {
            if slide < 1 || slide > presentation.total_slides() {
                self.fail(scope, ExportError::MissingSlide(slide), presentation, timers, now);
                return true;
            }
        }
        let document = services.generator.create(PageSize::A4_LANDSCAPE);
        self.job = Some(ExportJob {
            scope,
            targets,
            position: 0,
            services,
            document,
            output,
            pending: None,
            settle_timer: None,
        });
        self.begin_slide(presentation, timers, now);
        true
    }

    fn begin_slide(&mut self, presentation: &mut Presentation, timers: &mut Scheduler, now: Duration) {
        let Some(job) = &mut self.job else {
            return;
        };
        let Some(&slide) = job.targets.get(job.position) else {
            return;
        };
        let (percentage, text) = match job.scope {
            ExportScope::All => {
                let total = job.targets.len();
                let current = job.position + 1;
                (current as f64 / total as f64 * 100.0, format!("Exporting slide {current}/{total}"))
            }
            ExportScope::Slide(_) => (50.0, "Exporting current slide...".to_string()),
        };
        presentation.chrome_mut().update_overlay(percentage, text);

        let label = presentation.pinned_label();
        let pending = CaptureScope::enter(presentation.deck_mut(), slide, label.as_deref()).map(CaptureScope::suspend);
        let Some(pending) = pending else {
            let scope = job.scope;
            self.fail(scope, ExportError::MissingSlide(slide), presentation, timers, now);
            return;
        };
        job.pending = Some(pending);
        job.settle_timer = Some(timers.once(now, self.options.settle_delay, TimerTask::CaptureSettled));
    }

    /// Captures the slide that's been settling and moves on to the next one.
    pub(crate) fn on_settled(&mut self, presentation: &mut Presentation, timers: &mut Scheduler, now: Duration) {
        let Some(job) = &mut self.job else {
            return;
        };
        job.settle_timer = None;
        let Some(pending) = job.pending.take() else {
            return;
        };
        let scope = job.scope;
        let rasterizer = job.services.rasterizer.clone();
        let slide = pending.slide();
        let result = {
            let capture = pending.resume(presentation.deck_mut());
            let result = match capture.slide_element() {
                Some(element) => {
                    let background = &self.options.rasterize.background;
                    let html = capture.deck().capture_html(&optimize_for_capture(element), background);
                    let target = CaptureTarget { slide, html };
                    rasterizer.rasterize(&target, &self.options.rasterize)
                }
                None => Err(RasterizeError::Other(slide, "slide not found".into())),
            };
            // dropping the capture restores the slide
            result
        };
        Self::rearm_rotation(slide, presentation, timers, now);

        let image = match result {
            Ok(image) => image,
            Err(source) => {
                self.fail(scope, ExportError::Rasterize { slide, source }, presentation, timers, now);
                return;
            }
        };
        if let Err(e) = self.place_image(&image) {
            self.fail(scope, e, presentation, timers, now);
            return;
        }
        let Some(job) = &mut self.job else {
            return;
        };
        job.position += 1;
        if job.position < job.targets.len() {
            self.begin_slide(presentation, timers, now);
        } else {
            self.finish(presentation, timers, now);
        }
    }

    fn place_image(&mut self, image: &DynamicImage) -> Result<(), ExportError> {
        let Some(job) = &mut self.job else {
            return Ok(());
        };
        let placement = best_fit(job.document.page_size(), self.options.page_margin, image.width(), image.height());
        let jpeg = encode_jpeg(image, self.options.jpeg_quality)?;
        if job.position > 0 {
            job.document.add_page();
        }
        job.document.add_image(jpeg, placement)?;
        Ok(())
    }

    fn finish(&mut self, presentation: &mut Presentation, timers: &mut Scheduler, now: Duration) {
        let Some(job) = self.job.take() else {
            return;
        };
        if let ExportScope::Slide(_) = job.scope {
            presentation.chrome_mut().update_overlay(100.0, "Done!".into());
        }
        match job.document.save(&job.output) {
            Ok(()) => {
                tracing::info!("export written to {}", job.output.display());
                let chrome = presentation.chrome_mut();
                chrome.hide_overlay();
                chrome.notify(timers, now, job.scope.success_message().into(), NotificationKind::Success);
                self.outcome = Some(Ok(job.output));
            }
            Err(e) => self.fail(job.scope, e.into(), presentation, timers, now),
        }
    }

    fn fail(
        &mut self,
        scope: ExportScope,
        error: ExportError,
        presentation: &mut Presentation,
        timers: &mut Scheduler,
        now: Duration,
    ) {
        tracing::error!("export failed: {error}");
        if let Some(mut job) = self.job.take() {
            if let Some(timer) = job.settle_timer.take() {
                timers.cancel(timer);
            }
            if let Some(pending) = job.pending.take() {
                pending.restore(presentation.deck_mut());
            }
        }
        // the label rotation was stopped when the export started
        Self::rearm_rotation(presentation.current_slide_index(), presentation, timers, now);
        let chrome = presentation.chrome_mut();
        chrome.hide_overlay();
        chrome.notify(timers, now, scope.failure_message().into(), NotificationKind::Error);
        self.outcome = Some(Err(error));
    }

    /// Drops the running export, if any, restoring the slide it was capturing.
    pub(crate) fn abandon(&mut self, presentation: &mut Presentation, timers: &mut Scheduler) {
        let Some(mut job) = self.job.take() else {
            return;
        };
        tracing::warn!("abandoning export into {}", job.output.display());
        if let Some(timer) = job.settle_timer.take() {
            timers.cancel(timer);
        }
        if let Some(pending) = job.pending.take() {
            pending.restore(presentation.deck_mut());
        }
        presentation.chrome_mut().hide_overlay();
    }

    fn rearm_rotation(slide: usize, presentation: &Presentation, timers: &mut Scheduler, now: Duration) {
        let owns_label =
            presentation.deck().slide(slide).is_some_and(|s| s.contains(Selector::Id(ROTATING_PILL_ID)));
        if owns_label && presentation.current_slide_index() == slide {
            timers.once(now, REARM_DELAY, TimerTask::RearmRotation { slide });
        }
    }
}

fn encode_jpeg(image: &DynamicImage, quality: u8) -> Result<Vec<u8>, ImageError> {
    let mut buffer = Vec::new();
    let rgb = image.to_rgb8();
    JpegEncoder::new_with_quality(&mut buffer, quality).encode_image(&rgb)?;
    Ok(buffer)
}

#[derive(thiserror::Error, Debug)]
pub enum ExportError {
    #[error("loading services: {0}")]
    Services(#[from] ServiceLoadError),

    #[error("rasterizing slide {slide}: {source}")]
    Rasterize { slide: usize, source: RasterizeError },

    #[error("encoding image: {0}")]
    Encoding(#[from] ImageError),

    #[error("generating document: {0}")]
    Document(#[from] DocumentError),

    #[error("slide {0} does not exist")]
    MissingSlide(usize),
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::presentation::test::make_presentation;
    use rstest::rstest;

    #[rstest]
    #[case::all(ExportScope::All, "talks/deck.pdf")]
    #[case::slide(ExportScope::Slide(4), "talks/deck-slide-4.pdf")]
    fn output_paths(#[case] scope: ExportScope, #[case] expected: &str) {
        assert_eq!(scope.default_output_path(Path::new("talks/deck.html")), PathBuf::from(expected));
    }

    #[test]
    fn jpeg_encoding() {
        let image = DynamicImage::ImageRgba8(image::RgbaImage::new(16, 9));
        let jpeg = encode_jpeg(&image, 95).expect("encoding failed");
        assert_eq!(&jpeg[..2], &[0xFF, 0xD8]);
    }

    #[test]
    fn options_from_config() {
        let export = ExportConfig { jpeg_quality: 0, ..Default::default() };
        let options = ExportOptions::new(&export, &DefaultsConfig::default());
        assert_eq!(options.jpeg_quality, 1);
        assert_eq!(options.settle_delay, Duration::from_millis(500));
        assert_eq!(options.rasterize.scale, 2.5);
        assert_eq!(options.rasterize.viewport_width, 1280);
    }

    #[test]
    fn abandon_restores_pending_capture() {
        use services::test::{FakeGenerator, FakeProvider, FakeRasterizer};

        let mut timers = Scheduler::default();
        let mut presentation = make_presentation(3, &mut timers);
        let original = presentation.deck().slide(1).unwrap().root.clone();
        let provider = FakeProvider::new(FakeRasterizer::default(), FakeGenerator::default());
        let options = ExportOptions::new(&ExportConfig::default(), &DefaultsConfig::default());
        let mut sequencer = ExportSequencer::new(ExternalServices::new(Box::new(provider)), options);

        assert!(sequencer.start(ExportScope::All, "out.pdf".into(), &mut presentation, &mut timers, Duration::ZERO));
        assert!(sequencer.is_exporting());
        assert_ne!(presentation.deck().slide(1).unwrap().root, original);

        sequencer.abandon(&mut presentation, &mut timers);
        assert!(!sequencer.is_exporting());
        assert_eq!(presentation.deck().slide(1).unwrap().root, original);
        assert!(presentation.chrome().overlay().is_none());
        assert!(sequencer.take_outcome().is_none());
    }
}
