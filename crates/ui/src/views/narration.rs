use std::rc::Rc;

use dioxus::prelude::*;

use prep_core::model::{Explanation, StepDirective};
use services::NarrationPlayer;

use crate::vm::map_narration;

/// Plays one explanation and mirrors the active step's directives into
/// `directives`. Remount (via `key`) to play a different explanation.
#[component]
pub fn NarrationPanel(
    explanation: Explanation,
    language: String,
    directives: Signal<Vec<StepDirective>>,
) -> Element {
    let player = use_hook(|| Rc::new(NarrationPlayer::spawn(&explanation, Some(&language), true)));
    let frame = use_signal(|| player.frame());

    use_hook({
        let player = Rc::clone(&player);
        move || {
            let mut frames = player.subscribe();
            let mut directives = directives;
            let mut frame = frame;
            spawn(async move {
                directives.set(frames.borrow_and_update().directives.clone());
                while frames.changed().await.is_ok() {
                    let next = frames.borrow_and_update().clone();
                    if *directives.peek() != next.directives {
                        directives.set(next.directives.clone());
                    }
                    frame.set(next);
                }
            });
        }
    });

    use_drop(move || {
        let mut directives = directives;
        directives.set(Vec::new());
    });

    let Some(vm) = map_narration(&frame.read()) else {
        return rsx! {
            p { class: "narration narration--empty", "No explanation steps." }
        };
    };

    let on_previous = {
        let player = Rc::clone(&player);
        move |_: MouseEvent| player.previous()
    };
    let on_toggle = {
        let player = Rc::clone(&player);
        move |_: MouseEvent| player.toggle_play()
    };
    let on_next = {
        let player = Rc::clone(&player);
        move |_: MouseEvent| player.next()
    };
    let typing_class = if vm.typing {
        "narration__subtitle narration__subtitle--typing"
    } else {
        "narration__subtitle"
    };
    let panel_class = if vm.is_summary {
        "narration narration--summary"
    } else {
        "narration"
    };

    rsx! {
        section { class: "{panel_class}", aria_live: "polite",
            header { class: "narration__header",
                span { class: "narration__step", "{vm.step_label}" }
                if !vm.title.is_empty() {
                    h3 { class: "narration__title", "{vm.title}" }
                }
            }
            p { class: "{typing_class}", "{vm.subtitle}" }
            if !vm.board_notes.is_empty() {
                ul { class: "narration__board",
                    for (index, note) in vm.board_notes.iter().enumerate() {
                        li { key: "{index}", "{note}" }
                    }
                }
            }
            div { class: "narration__controls",
                button {
                    class: "btn btn-secondary",
                    r#type: "button",
                    disabled: !vm.can_previous,
                    onclick: on_previous,
                    "Previous step"
                }
                button {
                    class: "btn btn-primary",
                    r#type: "button",
                    onclick: on_toggle,
                    "{vm.play_label}"
                }
                button {
                    class: "btn btn-secondary",
                    r#type: "button",
                    disabled: !vm.can_next,
                    onclick: on_next,
                    "Next step"
                }
            }
        }
    }
}
