use prep_core::model::{CaptureTarget, DraftId, QuestionId};
use prep_core::region::{Handle, RegionSelector};

/// Resolve a `/capture/:kind/:id` route into a capture target.
#[must_use]
pub fn capture_target(kind: &str, id: u64) -> Option<CaptureTarget> {
    match kind {
        "question" => Some(CaptureTarget::Question(QuestionId::new(id))),
        "draft" => Some(CaptureTarget::Draft(DraftId::new(id))),
        _ => None,
    }
}

#[must_use]
pub fn target_label(target: CaptureTarget) -> String {
    match target {
        CaptureTarget::Question(id) => format!("Question {id}"),
        CaptureTarget::Draft(id) => format!("Draft {id}"),
    }
}

#[derive(Clone, Debug, PartialEq)]
pub struct HandleVm {
    pub name: &'static str,
    pub style: String,
}

#[derive(Clone, Debug, PartialEq)]
pub struct SelectionOverlayVm {
    pub stage_style: String,
    pub box_style: Option<String>,
    pub handles: Vec<HandleVm>,
    pub selection_label: Option<String>,
    pub zoom_label: String,
    pub dragging: bool,
}

fn px(value: f64) -> String {
    format!("{value:.1}px")
}

/// Overlay geometry for the current selector state, in display pixels.
#[must_use]
pub fn map_overlay(selector: &RegionSelector) -> SelectionOverlayVm {
    let transform = selector.transform();
    let display = transform.display_size();
    let stage_style = format!(
        "width: {}; height: {};",
        px(display.width),
        px(display.height)
    );

    let Some(rect) = selector.selection() else {
        return SelectionOverlayVm {
            stage_style,
            box_style: None,
            handles: Vec::new(),
            selection_label: None,
            zoom_label: zoom_label(transform.zoom()),
            dragging: selector.is_dragging(),
        };
    };

    let (left, top, width, height) = transform.display_rect(&rect);
    let handles = Handle::ALL
        .iter()
        .map(|handle| {
            let (x, y) = handle.corner(&rect);
            let (x, y) = transform.to_display(x, y);
            HandleVm {
                name: handle.as_str(),
                style: format!("left: {}; top: {};", px(x), px(y)),
            }
        })
        .collect();

    SelectionOverlayVm {
        stage_style,
        box_style: Some(format!(
            "left: {}; top: {}; width: {}; height: {};",
            px(left),
            px(top),
            px(width),
            px(height)
        )),
        handles,
        selection_label: Some(format!(
            "{}×{} at ({}, {})",
            rect.width, rect.height, rect.x, rect.y
        )),
        zoom_label: zoom_label(transform.zoom()),
        dragging: selector.is_dragging(),
    }
}

#[allow(clippy::cast_possible_truncation)]
#[must_use]
pub fn zoom_label(zoom: f64) -> String {
    format!("{}%", (zoom * 100.0).round() as i64)
}
