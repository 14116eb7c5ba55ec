use super::services::{CaptureTarget, RasterizeError, RasterizeOptions, Rasterizer};
use crate::tools::ThirdPartyTools;
use image::DynamicImage;
use tempfile::TempDir;

/// Rasterizes slides using `wkhtmltoimage`.
pub(crate) struct WkHtmlToImage {
    command: String,
}

impl WkHtmlToImage {
    pub(crate) fn new(command: String) -> Self {
        Self { command }
    }

    fn arguments(options: &RasterizeOptions) -> Vec<String> {
        let width = (options.viewport_width as f64 * options.scale).round() as u32;
        let height = (options.viewport_height as f64 * options.scale).round() as u32;
        vec![
            "--quiet".into(),
            "--enable-local-file-access".into(),
            "--format".into(),
            "png".into(),
            "--zoom".into(),
            options.scale.to_string(),
            "--width".into(),
            width.to_string(),
            "--height".into(),
            height.to_string(),
        ]
    }
}

impl Rasterizer for WkHtmlToImage {
    fn rasterize(&self, target: &CaptureTarget, options: &RasterizeOptions) -> Result<DynamicImage, RasterizeError> {
        let directory = TempDir::with_suffix("htmldeck")?;
        let image_path = directory.path().join(format!("slide-{}.png", target.slide));

        // the document is read from stdin
        let mut args = Self::arguments(options);
        args.push("-".into());
        args.push(image_path.to_string_lossy().into_owned());
        let args: Vec<&str> = args.iter().map(String::as_str).collect();
        tracing::debug!("rasterizing slide {} using {}", target.slide, self.command);
        ThirdPartyTools::rasterizer(&self.command, &args)
            .stdin(target.html.clone().into_bytes())
            .timeout(options.timeout)
            .run()?;

        if !image_path.exists() {
            return Err(RasterizeError::Other(target.slide, format!("{} produced no image", self.command)));
        }
        let image = image::open(&image_path)?;
        Ok(image)
    }
}
