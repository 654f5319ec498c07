use dioxus::document::eval;
use dioxus::prelude::*;
use keyboard_types::Modifiers;

use prep_core::model::SelectionRect;
use prep_core::region::{
    PointerId, PointerInput, PointerKind, RegionSelector, SelectionEvent, ZOOM_STEP,
};

use crate::vm::map_overlay;

fn pointer_input(evt: &PointerEvent) -> PointerInput {
    let point = evt.data.element_coordinates();
    PointerInput {
        id: PointerId(evt.data.pointer_id()),
        kind: PointerKind::from_dom(&evt.data.pointer_type()),
        x: point.x,
        y: point.y,
    }
}

const STAGE_ID: &str = "region-stage";

/// Route later events for `pointer` to the stage, or hand touch back to the page.
fn capture_script(pointer: PointerId, kind: PointerKind) -> String {
    let PointerId(id) = pointer;
    if kind == PointerKind::Touch {
        format!(
            "const el = document.getElementById('{STAGE_ID}'); \
             if (el && el.hasPointerCapture({id})) {{ el.releasePointerCapture({id}); }}"
        )
    } else {
        format!("document.getElementById('{STAGE_ID}')?.setPointerCapture({id});")
    }
}

/// End the gesture owned by `input`'s pointer, returning the finished rectangle.
fn finish_gesture(selector: &mut RegionSelector, input: PointerInput) -> Option<SelectionRect> {
    match selector.pointer_up(input)? {
        SelectionEvent::Completed(rect) => Some(rect),
        SelectionEvent::Changed(_) => None,
    }
}

fn step_zoom(mut selector: Signal<RegionSelector>, step: f64) {
    let zoom = selector.peek().transform().zoom();
    selector.write().set_zoom(zoom + step);
}

/// Page image with a draggable selection rectangle.
///
/// `on_complete` fires once per finished drag with the rectangle in source pixels.
#[component]
pub fn RegionSelectorView(
    image_url: String,
    selector: Signal<RegionSelector>,
    on_complete: EventHandler<SelectionRect>,
) -> Element {
    let mut selector = selector;
    let overlay = map_overlay(&selector.read());

    let on_down = move |evt: PointerEvent| {
        evt.prevent_default();
        let input = pointer_input(&evt);
        let started = selector.write().pointer_down(input).is_some();
        if started || input.kind == PointerKind::Touch {
            let _ = eval(&capture_script(input.id, input.kind));
        }
    };
    let on_move = move |evt: PointerEvent| {
        if !selector.peek().is_dragging() {
            return;
        }
        selector.write().pointer_move(pointer_input(&evt));
    };
    // Release, leaving the stage and losing capture all finish the gesture;
    // only the first of them for a given pointer reports completion.
    let finish = move |evt: PointerEvent| {
        if !selector.peek().is_dragging() {
            return;
        }
        let finished = finish_gesture(&mut selector.write(), pointer_input(&evt));
        if let Some(rect) = finished {
            on_complete.call(rect);
        }
    };
    let on_cancel = move |evt: PointerEvent| {
        selector.write().pointer_cancel(PointerId(evt.data.pointer_id()));
    };
    let on_wheel = move |evt: WheelEvent| {
        let modifiers = evt.data.modifiers();
        let modifier = modifiers.contains(Modifiers::CONTROL) || modifiers.contains(Modifiers::META);
        let delta_y = evt.data.delta().strip_units().y;
        if selector.write().wheel(delta_y, modifier).is_some() {
            evt.prevent_default();
        }
    };
    let stage_class = if overlay.dragging {
        "region__stage region__stage--dragging"
    } else {
        "region__stage"
    };

    rsx! {
        div { class: "region",
            div { class: "region__toolbar",
                button {
                    class: "btn btn-secondary",
                    r#type: "button",
                    onclick: move |_| step_zoom(selector, -ZOOM_STEP),
                    "−"
                }
                span { class: "region__zoom", "{overlay.zoom_label}" }
                button {
                    class: "btn btn-secondary",
                    r#type: "button",
                    onclick: move |_| step_zoom(selector, ZOOM_STEP),
                    "+"
                }
                button {
                    class: "btn btn-ghost",
                    r#type: "button",
                    onclick: move |_| selector.write().set_zoom(1.0),
                    "Reset zoom"
                }
                button {
                    class: "btn btn-ghost",
                    r#type: "button",
                    disabled: overlay.box_style.is_none(),
                    onclick: move |_| selector.write().clear(),
                    "Clear"
                }
                if let Some(label) = overlay.selection_label.as_ref() {
                    span { class: "region__selection-label", "{label}" }
                }
            }
            div {
                id: STAGE_ID,
                class: "{stage_class}",
                style: "{overlay.stage_style}",
                onpointerdown: on_down,
                onpointermove: on_move,
                onpointerup: finish,
                onpointerleave: finish,
                onlostpointercapture: finish,
                onpointercancel: on_cancel,
                onwheel: on_wheel,
                img { class: "region__image", src: "{image_url}", draggable: "false" }
                if let Some(box_style) = overlay.box_style.as_ref() {
                    div { class: "region__box", style: "{box_style}" }
                    for handle in overlay.handles.iter() {
                        div {
                            key: "{handle.name}",
                            class: "region__handle region__handle--{handle.name}",
                            style: "{handle.style}",
                        }
                    }
                }
            }
        }
    }
}
