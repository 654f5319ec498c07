//! Figure capture: load a rendered page, crop the selected region, upload it.

use std::io::Cursor;
use std::sync::Arc;

use base64::Engine as _;
use base64::engine::general_purpose::STANDARD;
use image::{DynamicImage, GenericImageView, ImageFormat};
use tracing::{debug, info};

use prep_core::model::{CaptureTarget, FigureBBox, FigureSource, ImageSize, SelectionRect};
use prep_core::region::{DisplaySize, RegionSelector};

use crate::api::{FigureApi, FigureUpload, UploadedFigure};
use crate::error::FigureError;

/// Decoded page ready for selection.
#[derive(Debug, Clone)]
pub struct LoadedSource {
    target: CaptureTarget,
    source: FigureSource,
    format: ImageFormat,
    image: DynamicImage,
}

impl LoadedSource {
    /// Decode the page bytes and check them against the declared size.
    ///
    /// # Errors
    ///
    /// Returns `FigureError` when the bytes are not a decodable image or the
    /// decoded size disagrees with the declared one.
    pub fn decode(target: CaptureTarget, source: FigureSource) -> Result<Self, FigureError> {
        let bytes = STANDARD.decode(source.image.as_bytes())?;
        let format = image::guess_format(&bytes)?;
        let image = image::load_from_memory_with_format(&bytes, format)?;
        let (actual_width, actual_height) = image.dimensions();
        if (actual_width, actual_height) != (source.width, source.height) {
            return Err(FigureError::SizeMismatch {
                width: source.width,
                height: source.height,
                actual_width,
                actual_height,
            });
        }
        Ok(Self {
            target,
            source,
            format,
            image,
        })
    }

    #[must_use]
    pub fn target(&self) -> CaptureTarget {
        self.target
    }

    #[must_use]
    pub fn source(&self) -> &FigureSource {
        &self.source
    }

    #[must_use]
    pub fn size(&self) -> ImageSize {
        self.source.size()
    }

    /// `data:` URL of the page for display, typed by the sniffed format.
    #[must_use]
    pub fn data_url(&self) -> String {
        format!("data:{};base64,{}", self.format.to_mime_type(), self.source.image)
    }

    /// Fresh selector fitted to `max_box`.
    ///
    /// # Errors
    ///
    /// Returns `FigureError::Region` for a zero-sized page.
    pub fn selector(&self, max_box: DisplaySize) -> Result<RegionSelector, FigureError> {
        Ok(RegionSelector::new(self.size(), max_box)?)
    }

    /// Crop `rect` out of the page and encode it as PNG.
    ///
    /// # Errors
    ///
    /// Returns `FigureError::SelectionOutOfBounds` when `rect` leaves the page.
    pub fn crop(&self, rect: SelectionRect) -> Result<CroppedFigure, FigureError> {
        let size = self.size();
        if !rect.fits_within(size) {
            return Err(FigureError::SelectionOutOfBounds {
                width: size.width,
                height: size.height,
            });
        }
        let cropped = self.image.crop_imm(rect.x, rect.y, rect.width, rect.height);
        let mut png = Cursor::new(Vec::new());
        cropped.write_to(&mut png, ImageFormat::Png)?;
        debug!(x = rect.x, y = rect.y, width = rect.width, height = rect.height, "cropped figure");
        Ok(CroppedFigure {
            png: png.into_inner(),
            bbox: rect.to_bbox(size),
        })
    }
}

/// PNG crop plus the box it was cut from.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CroppedFigure {
    png: Vec<u8>,
    bbox: FigureBBox,
}

impl CroppedFigure {
    #[must_use]
    pub fn png(&self) -> &[u8] {
        &self.png
    }

    #[must_use]
    pub fn bbox(&self) -> FigureBBox {
        self.bbox
    }

    #[must_use]
    pub fn preview_data_url(&self) -> String {
        format!("data:image/png;base64,{}", STANDARD.encode(&self.png))
    }

    fn to_upload(&self) -> FigureUpload {
        FigureUpload {
            image_base64: STANDARD.encode(&self.png),
            bbox: self.bbox,
        }
    }
}

#[derive(Clone)]
pub struct FigureCaptureService {
    api: Arc<dyn FigureApi>,
}

impl FigureCaptureService {
    #[must_use]
    pub fn new(api: Arc<dyn FigureApi>) -> Self {
        Self { api }
    }

    /// # Errors
    ///
    /// Returns `FigureError::NoTarget` when nothing is bound, otherwise the
    /// fetch or decode failure.
    pub async fn load_source(
        &self,
        target: Option<CaptureTarget>,
        page: Option<u32>,
    ) -> Result<LoadedSource, FigureError> {
        let target = target.ok_or(FigureError::NoTarget)?;
        let source = self.api.fetch_page_source(target, page).await?;
        debug!(target = %target.path_segment(), page = source.page, "page source loaded");
        LoadedSource::decode(target, source)
    }

    /// Upload a crop for the bound target.
    ///
    /// # Errors
    ///
    /// Returns `FigureError::NoTarget` when nothing is bound, or the API error.
    pub async fn upload(
        &self,
        target: Option<CaptureTarget>,
        figure: &CroppedFigure,
    ) -> Result<UploadedFigure, FigureError> {
        let target = target.ok_or(FigureError::NoTarget)?;
        let uploaded = self.api.upload_figure(target, &figure.to_upload()).await?;
        info!(target = %target.path_segment(), figure_id = %uploaded.id, "figure uploaded");
        Ok(uploaded)
    }
}
