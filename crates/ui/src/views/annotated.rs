use dioxus::prelude::*;

use crate::vm::{ChoiceVm, FigureVm, RunVm};

/// Question text with explanation marks applied.
#[component]
pub fn AnnotatedText(runs: Vec<RunVm>, class: &'static str) -> Element {
    rsx! {
        p { class: "{class}",
            for (index, run) in runs.into_iter().enumerate() {
                match run.class {
                    Some(mark) => rsx! {
                        span { key: "{index}", class: "{mark}", "{run.text}" }
                    },
                    None => rsx! {
                        span { key: "{index}", "{run.text}" }
                    },
                }
            }
        }
    }
}

#[component]
pub fn FigureList(figures: Vec<FigureVm>) -> Element {
    if figures.is_empty() {
        return rsx! {};
    }
    rsx! {
        div { class: "figures",
            for item in figures {
                figure { key: "{item.id}", class: "{item.class}",
                    img { src: "{item.url}", alt: item.caption.clone().unwrap_or_default() }
                    if let Some(caption) = &item.caption {
                        figcaption { "{caption}" }
                    }
                }
            }
        }
    }
}

#[component]
pub fn ChoiceList(
    choices: Vec<ChoiceVm>,
    enabled: bool,
    on_select: EventHandler<String>,
) -> Element {
    rsx! {
        ol { class: "choices",
            for choice in choices {
                li { key: "{choice.key}",
                    button {
                        class: "{choice.class}",
                        r#type: "button",
                        disabled: !enabled,
                        onclick: {
                            let key = choice.key.clone();
                            move |_| on_select.call(key.clone())
                        },
                        span { class: "choice__key", "{choice.key}" }
                        span { class: "choice__text",
                            for (index, run) in choice.runs.into_iter().enumerate() {
                                match run.class {
                                    Some(mark) => rsx! {
                                        span { key: "{index}", class: "{mark}", "{run.text}" }
                                    },
                                    None => rsx! {
                                        span { key: "{index}", "{run.text}" }
                                    },
                                }
                            }
                        }
                    }
                    FigureList { figures: choice.figures }
                }
            }
        }
    }
}
