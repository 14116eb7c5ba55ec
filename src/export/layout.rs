/// The size of a page, in millimeters.
#[derive(Clone, Copy, Debug, PartialEq)]
pub(crate) struct PageSize {
    pub(crate) width: f64,
    pub(crate) height: f64,
}

impl PageSize {
    pub(crate) const A4_LANDSCAPE: PageSize = PageSize { width: 297.0, height: 210.0 };
}

/// Where an image goes in a page, in millimeters from the top left corner.
#[derive(Clone, Copy, Debug, PartialEq)]
pub(crate) struct Placement {
    pub(crate) x: f64,
    pub(crate) y: f64,
    pub(crate) width: f64,
    pub(crate) height: f64,
}

/// Computes the largest placement for an image that fits in a page minus its margins.
///
/// The image keeps its aspect ratio and is centered in the page.
pub(crate) fn best_fit(page: PageSize, margin: f64, image_width: u32, image_height: u32) -> Placement {
    let available_width = (page.width - margin * 2.0).max(0.0);
    let available_height = (page.height - margin * 2.0).max(0.0);
    let (width, height) = if image_width == 0 || image_height == 0 || available_height == 0.0 {
        (available_width, available_height)
    } else {
        let image_ratio = image_width as f64 / image_height as f64;
        let page_ratio = available_width / available_height;
        if image_ratio > page_ratio {
            (available_width, available_width / image_ratio)
        } else {
            (available_height * image_ratio, available_height)
        }
    };
    let x = (page.width - width) / 2.0;
    let y = (page.height - height) / 2.0;
    Placement { x, y, width, height }
}
