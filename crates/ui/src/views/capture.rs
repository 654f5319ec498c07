use std::sync::Arc;

use dioxus::prelude::*;
use tracing::warn;

use prep_core::model::SelectionRect;
use prep_core::region::{DisplaySize, RegionSelector};
use services::{CroppedFigure, LoadedSource};

use crate::context::AppContext;
use crate::views::region::RegionSelectorView;
use crate::views::{ViewError, ViewState, view_state_from_resource};
use crate::vm::{capture_target, target_label};

/// Decoded page plus the selector fitted to it.
#[derive(Clone)]
struct LoadedPage {
    source: Arc<LoadedSource>,
    selector: RegionSelector,
}

impl PartialEq for LoadedPage {
    fn eq(&self, other: &Self) -> bool {
        Arc::ptr_eq(&self.source, &other.source)
    }
}

#[derive(Clone, Debug, PartialEq, Eq)]
enum UploadStatus {
    Idle,
    Uploading,
    Uploaded(String),
}

#[component]
pub fn CaptureView(kind: String, id: u64) -> Element {
    let ctx = use_context::<AppContext>();
    let target = capture_target(&kind, id);
    let heading = target.map_or_else(|| "Figure capture".to_string(), target_label);

    let resource = {
        let figures = ctx.figures();
        use_resource(move || {
            let figures = figures.clone();
            async move {
                let source = figures
                    .load_source(target, None)
                    .await
                    .map_err(|err| {
                        warn!(error = %err, "page source unavailable");
                        ViewError::from_figure(&err)
                    })?;
                let selector = source
                    .selector(DisplaySize::DEFAULT_BOX)
                    .map_err(|err| ViewError::from_figure(&err))?;
                Ok::<_, ViewError>(LoadedPage {
                    source: Arc::new(source),
                    selector,
                })
            }
        })
    };
    let state = view_state_from_resource(&resource);

    rsx! {
        div { class: "page capture-page",
            header { class: "view-header",
                h2 { class: "view-title", "{heading}" }
                p { class: "view-subtitle", "Drag over the page to select a figure." }
            }
            match state {
                ViewState::Idle | ViewState::Loading => rsx! {
                    p { "Loading page..." }
                },
                ViewState::Error(err) => rsx! {
                    p { class: "error", "{err.message()}" }
                    if err != ViewError::NoTarget {
                        button {
                            class: "btn btn-secondary",
                            r#type: "button",
                            onclick: move |_| {
                                let mut resource = resource;
                                resource.restart();
                            },
                            "Retry"
                        }
                    }
                },
                ViewState::Ready(page) => rsx! {
                    CaptureWorkspace { page }
                },
            }
        }
    }
}

#[component]
fn CaptureWorkspace(page: LoadedPage) -> Element {
    let ctx = use_context::<AppContext>();
    let selector = use_signal(|| page.selector.clone());
    let mut cropped = use_signal(|| None::<CroppedFigure>);
    let mut error = use_signal(|| None::<ViewError>);
    let mut status = use_signal(|| UploadStatus::Idle);
    let source = Arc::clone(&page.source);
    let target = source.target();
    let image_url = use_hook(|| source.data_url());

    let on_complete = {
        let source = Arc::clone(&source);
        move |rect: SelectionRect| match source.crop(rect) {
            Ok(figure) => {
                cropped.set(Some(figure));
                error.set(None);
                status.set(UploadStatus::Idle);
            }
            Err(err) => {
                warn!(error = %err, "crop failed");
                cropped.set(None);
                error.set(Some(ViewError::from_figure(&err)));
            }
        }
    };

    let on_upload = {
        let figures = ctx.figures();
        move |_: MouseEvent| {
            let Some(figure) = cropped.read().clone() else {
                return;
            };
            if *status.peek() == UploadStatus::Uploading {
                return;
            }
            let figures = figures.clone();
            status.set(UploadStatus::Uploading);
            spawn(async move {
                match figures.upload(Some(target), &figure).await {
                    Ok(uploaded) => {
                        error.set(None);
                        status.set(UploadStatus::Uploaded(uploaded.url));
                    }
                    Err(err) => {
                        error.set(Some(ViewError::from_figure(&err)));
                        status.set(UploadStatus::Idle);
                    }
                }
            });
        }
    };

    let preview = cropped.read().as_ref().map(|figure| {
        let bbox = figure.bbox();
        (
            figure.preview_data_url(),
            format!(
                "{}×{} at ({}, {}) of {}×{}",
                bbox.width, bbox.height, bbox.x, bbox.y, bbox.image_width, bbox.image_height
            ),
        )
    });
    let status_value = status.read().clone();

    rsx! {
        div { class: "capture",
            RegionSelectorView { image_url, selector, on_complete }
            aside { class: "capture__preview",
                h3 { "Preview" }
                if let Some(err) = *error.read() {
                    p { class: "error", "{err.message()}" }
                }
                match preview {
                    Some((url, bbox_label)) => rsx! {
                        img { class: "capture__crop", src: "{url}", alt: "Selected figure" }
                        p { class: "capture__bbox", "{bbox_label}" }
                        button {
                            class: "btn btn-primary",
                            r#type: "button",
                            disabled: status_value == UploadStatus::Uploading,
                            onclick: on_upload,
                            "Upload figure"
                        }
                    },
                    None => rsx! {
                        p { class: "capture__hint", "Select a region to preview it here." }
                    },
                }
                match status_value {
                    UploadStatus::Idle => rsx! {},
                    UploadStatus::Uploading => rsx! {
                        p { class: "capture__status", "Uploading..." }
                    },
                    UploadStatus::Uploaded(url) => rsx! {
                        p { class: "capture__status capture__status--done", "Uploaded to {url}" }
                    },
                }
            }
        }
    }
}
