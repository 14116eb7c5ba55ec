use super::{
    layout::{PageSize, Placement},
    services::{DocumentError, DocumentGenerator, OutputDocument},
};
use crate::tools::ThirdPartyTools;
use base64::{Engine, engine::general_purpose::STANDARD};
use std::{fmt::Write, fs, path::Path};
use tempfile::TempDir;

/// Generates PDF documents using `weasyprint`.
pub(crate) struct WeasyPrint {
    command: String,
}

impl WeasyPrint {
    pub(crate) fn new(command: String) -> Self {
        Self { command }
    }
}

impl DocumentGenerator for WeasyPrint {
    fn create(&self, page_size: PageSize) -> Box<dyn OutputDocument> {
        Box::new(HtmlDocument::new(self.command.clone(), page_size))
    }
}

struct PageImage {
    jpeg: Vec<u8>,
    placement: Placement,
}

/// A document made of pages that each hold absolutely positioned images.
///
/// This is turned into HTML and handed to `weasyprint` when saved.
pub(crate) struct HtmlDocument {
    command: String,
    page_size: PageSize,
    pages: Vec<Vec<PageImage>>,
}

impl HtmlDocument {
    fn new(command: String, page_size: PageSize) -> Self {
        Self { command, page_size, pages: vec![Vec::new()] }
    }

    fn render_html(&self) -> String {
        let PageSize { width, height } = self.page_size;
        let mut html = format!(
            r#"<!DOCTYPE html>
<html>
<head>
<meta charset="utf-8">
<style>
@page {{
    size: {width}mm {height}mm;
    margin: 0;
}}

body {{
    margin: 0;
}}

.page {{
    position: relative;
    width: {width}mm;
    height: {height}mm;
    overflow: hidden;
    page-break-after: always;
}}

.page:last-child {{
    page-break-after: auto;
}}

.page img {{
    position: absolute;
}}
</style>
</head>
<body>
"#
        );
        for page in &self.pages {
            html.push_str("<div class=\"page\">");
            for image in page {
                let Placement { x, y, width, height } = image.placement;
                let data = STANDARD.encode(&image.jpeg);
                let _ = write!(
                    html,
                    "<img src=\"data:image/jpeg;base64,{data}\" style=\"left: {x}mm; top: {y}mm; width: {width}mm; height: {height}mm;\">"
                );
            }
            html.push_str("</div>\n");
        }
        html.push_str("</body>\n</html>\n");
        html
    }
}

impl OutputDocument for HtmlDocument {
    fn page_size(&self) -> PageSize {
        self.page_size
    }

    fn add_page(&mut self) {
        self.pages.push(Vec::new());
    }

    fn add_image(&mut self, jpeg: Vec<u8>, placement: Placement) -> Result<(), DocumentError> {
        let Placement { x, y, width, height } = placement;
        if [x, y, width, height].iter().any(|value| !value.is_finite() || *value < 0.0) {
            return Err(DocumentError::InvalidPlacement(format!("{placement:?}")));
        }
        if let Some(page) = self.pages.last_mut() {
            page.push(PageImage { jpeg, placement });
        }
        Ok(())
    }

    fn save(self: Box<Self>, path: &Path) -> Result<(), DocumentError> {
        let directory = TempDir::with_suffix("htmldeck")?;
        let html_path = directory.path().join("index.html");
        fs::write(&html_path, self.render_html())?;
        tracing::info!("generating {} using {}", path.display(), self.command);
        ThirdPartyTools::document_generator(
            &self.command,
            &["-e", "utf8", html_path.to_string_lossy().as_ref(), path.to_string_lossy().as_ref()],
        )
        .run()?;
        Ok(())
    }
}
