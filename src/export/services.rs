use super::{
    layout::{PageSize, Placement},
    pdf::WeasyPrint,
    rasterizer::WkHtmlToImage,
};
use crate::{
    config::ExportConfig,
    tools::{ExecutionError, ThirdPartyTools},
};
use image::{DynamicImage, ImageError};
use std::{fmt, io, path::Path, rc::Rc, time::Duration};

/// What gets rasterized: a standalone HTML document showing a single slide.
#[derive(Clone, Debug)]
pub(crate) struct CaptureTarget {
    pub(crate) slide: usize,
    pub(crate) html: String,
}

#[derive(Clone, Debug, PartialEq)]
pub(crate) struct RasterizeOptions {
    pub(crate) scale: f64,
    pub(crate) background: String,
    pub(crate) timeout: Duration,
    pub(crate) viewport_width: u32,
    pub(crate) viewport_height: u32,
}

/// Turns a capture target into an image.
pub(crate) trait Rasterizer {
    fn rasterize(&self, target: &CaptureTarget, options: &RasterizeOptions) -> Result<DynamicImage, RasterizeError>;
}

/// Creates documents that slide images are placed into.
pub(crate) trait DocumentGenerator {
    fn create(&self, page_size: PageSize) -> Box<dyn OutputDocument>;
}

/// A document being generated.
///
/// Documents start with a single empty page.
pub(crate) trait OutputDocument {
    fn page_size(&self) -> PageSize;

    fn add_page(&mut self);

    /// Add a JPEG image to the last page.
    fn add_image(&mut self, jpeg: Vec<u8>, placement: Placement) -> Result<(), DocumentError>;

    fn save(self: Box<Self>, path: &Path) -> Result<(), DocumentError>;
}

/// Resolves the services used during an export.
pub(crate) trait ServiceProvider {
    fn load_rasterizer(&self) -> Result<Rc<dyn Rasterizer>, ServiceLoadError>;

    fn load_document_generator(&self) -> Result<Rc<dyn DocumentGenerator>, ServiceLoadError>;
}

/// The services an export needs, once they're loaded.
#[derive(Clone)]
pub(crate) struct LoadedServices {
    pub(crate) rasterizer: Rc<dyn Rasterizer>,
    pub(crate) generator: Rc<dyn DocumentGenerator>,
}

/// Lazily loads services and keeps them around once they are.
pub(crate) struct ExternalServices {
    provider: Box<dyn ServiceProvider>,
    rasterizer: Option<Rc<dyn Rasterizer>>,
    generator: Option<Rc<dyn DocumentGenerator>>,
}

impl ExternalServices {
    pub(crate) fn new(provider: Box<dyn ServiceProvider>) -> Self {
        Self { provider, rasterizer: None, generator: None }
    }

    /// Loads any service that isn't loaded yet.
    pub(crate) fn ensure_loaded(&mut self) -> Result<LoadedServices, ServiceLoadError> {
        let rasterizer = match self.rasterizer.clone() {
            Some(rasterizer) => rasterizer,
            None => {
                let rasterizer = self.provider.load_rasterizer()?;
                tracing::info!("rasterizer loaded");
                self.rasterizer.insert(rasterizer).clone()
            }
        };
        let generator = match self.generator.clone() {
            Some(generator) => generator,
            None => {
                let generator = self.provider.load_document_generator()?;
                tracing::info!("document generator loaded");
                self.generator.insert(generator).clone()
            }
        };
        Ok(LoadedServices { rasterizer, generator })
    }

    pub(crate) fn is_loaded(&self) -> bool {
        self.rasterizer.is_some() && self.generator.is_some()
    }
}

impl fmt::Debug for ExternalServices {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ExternalServices")
            .field("rasterizer", &self.rasterizer.is_some())
            .field("generator", &self.generator.is_some())
            .finish()
    }
}

/// Provides services backed by third party tools.
pub(crate) struct ToolServiceProvider {
    rasterizer_command: String,
    document_command: String,
}

impl ToolServiceProvider {
    pub(crate) fn new(config: &ExportConfig) -> Self {
        Self {
            rasterizer_command: config.rasterizer_command.clone(),
            document_command: config.document_command.clone(),
        }
    }

    fn validate_exists(command: &str) -> Result<(), ServiceLoadError> {
        match ThirdPartyTools::version_check(command).run_and_capture_stdout() {
            Ok(_) => Ok(()),
            Err(ExecutionError::SpawnNotFound { .. }) => Err(ServiceLoadError::Missing(command.to_string())),
            Err(e) => Err(e.into()),
        }
    }
}

impl ServiceProvider for ToolServiceProvider {
    fn load_rasterizer(&self) -> Result<Rc<dyn Rasterizer>, ServiceLoadError> {
        Self::validate_exists(&self.rasterizer_command)?;
        Ok(Rc::new(WkHtmlToImage::new(self.rasterizer_command.clone())))
    }

    fn load_document_generator(&self) -> Result<Rc<dyn DocumentGenerator>, ServiceLoadError> {
        Self::validate_exists(&self.document_command)?;
        Ok(Rc::new(WeasyPrint::new(self.document_command.clone())))
    }
}

#[derive(thiserror::Error, Debug)]
pub enum ServiceLoadError {
    #[error("'{0}' not found")]
    Missing(String),

    #[error(transparent)]
    Execution(#[from] ExecutionError),
}

#[derive(thiserror::Error, Debug)]
pub enum RasterizeError {
    #[error("io: {0}")]
    Io(#[from] io::Error),

    #[error(transparent)]
    Execution(#[from] ExecutionError),

    #[error("decoding image: {0}")]
    Image(#[from] ImageError),

    #[error("slide {0} could not be rasterized: {1}")]
    Other(usize, String),
}

#[derive(thiserror::Error, Debug)]
pub enum DocumentError {
    #[error("io: {0}")]
    Io(#[from] io::Error),

    #[error(transparent)]
    Execution(#[from] ExecutionError),

    #[error("invalid image placement: {0}")]
    InvalidPlacement(String),
}

#[cfg(test)]
pub(crate) mod test {
    use super::*;
    use image::RgbImage;
    use std::cell::{Cell, RefCell};

    /// A rasterizer that produces blank images and can be told to fail on a slide.
    #[derive(Default)]
    pub(crate) struct FakeRasterizer {
        pub(crate) fail_on: Option<usize>,
        pub(crate) captured: RefCell<Vec<CaptureTarget>>,
    }

    impl Rasterizer for FakeRasterizer {
        fn rasterize(&self, target: &CaptureTarget, _: &RasterizeOptions) -> Result<DynamicImage, RasterizeError> {
            self.captured.borrow_mut().push(target.clone());
            if self.fail_on == Some(target.slide) {
                return Err(RasterizeError::Other(target.slide, "fake failure".into()));
            }
            Ok(DynamicImage::ImageRgb8(RgbImage::new(32, 18)))
        }
    }

    /// What a fake document saw, shared so tests can look at it after it's consumed.
    #[derive(Debug, Default)]
    pub(crate) struct DocumentLog {
        pub(crate) pages: Cell<usize>,
        pub(crate) placements: RefCell<Vec<Placement>>,
        pub(crate) saved_to: RefCell<Option<std::path::PathBuf>>,
    }

    #[derive(Default)]
    pub(crate) struct FakeGenerator {
        pub(crate) log: Rc<DocumentLog>,
        pub(crate) fail_save: bool,
    }

    struct FakeDocument {
        log: Rc<DocumentLog>,
        fail_save: bool,
    }

    impl DocumentGenerator for FakeGenerator {
        fn create(&self, _: PageSize) -> Box<dyn OutputDocument> {
            self.log.pages.set(1);
            Box::new(FakeDocument { log: self.log.clone(), fail_save: self.fail_save })
        }
    }

    impl OutputDocument for FakeDocument {
        fn page_size(&self) -> PageSize {
            PageSize::A4_LANDSCAPE
        }

        fn add_page(&mut self) {
            self.log.pages.set(self.log.pages.get() + 1);
        }

        fn add_image(&mut self, _: Vec<u8>, placement: Placement) -> Result<(), DocumentError> {
            self.log.placements.borrow_mut().push(placement);
            Ok(())
        }

        fn save(self: Box<Self>, path: &Path) -> Result<(), DocumentError> {
            if self.fail_save {
                return Err(DocumentError::Io(io::Error::other("disk full")));
            }
            *self.log.saved_to.borrow_mut() = Some(path.to_path_buf());
            Ok(())
        }
    }

    /// A provider handing out fixed services, counting how many times it's asked for them.
    pub(crate) struct FakeProvider {
        pub(crate) rasterizer: Rc<FakeRasterizer>,
        pub(crate) generator: Rc<FakeGenerator>,
        pub(crate) loads: Rc<Cell<usize>>,
        pub(crate) unavailable: bool,
    }

    impl FakeProvider {
        pub(crate) fn new(rasterizer: FakeRasterizer, generator: FakeGenerator) -> Self {
            Self {
                rasterizer: Rc::new(rasterizer),
                generator: Rc::new(generator),
                loads: Default::default(),
                unavailable: false,
            }
        }
    }

    impl ServiceProvider for FakeProvider {
        fn load_rasterizer(&self) -> Result<Rc<dyn Rasterizer>, ServiceLoadError> {
            self.loads.set(self.loads.get() + 1);
            if self.unavailable {
                return Err(ServiceLoadError::Missing("fake-rasterizer".into()));
            }
            Ok(self.rasterizer.clone())
        }

        fn load_document_generator(&self) -> Result<Rc<dyn DocumentGenerator>, ServiceLoadError> {
            self.loads.set(self.loads.get() + 1);
            Ok(self.generator.clone())
        }
    }

    #[test]
    fn services_are_loaded_once() {
        let provider = FakeProvider::new(FakeRasterizer::default(), FakeGenerator::default());
        let loads = provider.loads.clone();
        let mut services = ExternalServices::new(Box::new(provider));
        assert!(!services.is_loaded());
        services.ensure_loaded().expect("load failed");
        services.ensure_loaded().expect("load failed");
        assert!(services.is_loaded());
        assert_eq!(loads.get(), 2);
    }

    #[test]
    fn load_failure_is_not_cached() {
        let mut provider = FakeProvider::new(FakeRasterizer::default(), FakeGenerator::default());
        provider.unavailable = true;
        let loads = provider.loads.clone();
        let mut services = ExternalServices::new(Box::new(provider));
        assert!(services.ensure_loaded().is_err());
        assert!(services.ensure_loaded().is_err());
        assert!(!services.is_loaded());
        assert_eq!(loads.get(), 2);
    }

    #[cfg(unix)]
    #[test]
    fn missing_tool_fails_to_load() {
        let config = ExportConfig {
            rasterizer_command: "this-rasterizer-does-not-exist".into(),
            ..Default::default()
        };
        let provider = ToolServiceProvider::new(&config);
        let result = provider.load_rasterizer();
        assert!(matches!(result, Err(ServiceLoadError::Missing(_))));
    }
}
