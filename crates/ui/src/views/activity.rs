use std::rc::Rc;

use dioxus::prelude::*;
use url::Url;

use services::{PushChannel, PushFeed};

use crate::context::AppContext;
use crate::vm::{ActivityRowVm, map_activity};

#[component]
pub fn ActivityView() -> Element {
    let ctx = use_context::<AppContext>();

    rsx! {
        div { class: "page activity-page",
            header { class: "view-header",
                h2 { class: "view-title", "Activity" }
                p { class: "view-subtitle", "Generation jobs, drafts and server log." }
            }
            match ctx.push_url() {
                Some(url) => rsx! {
                    ActivityFeed { url }
                },
                None => rsx! {
                    p { class: "activity__offline", "Live updates are off while working offline." }
                },
            }
        }
    }
}

#[component]
fn ActivityFeed(url: Url) -> Element {
    let channel = use_hook(|| Rc::new(PushChannel::spawn(url.clone())));
    let feed = use_signal(PushFeed::default);

    use_hook({
        let channel = Rc::clone(&channel);
        move || {
            let mut updates = channel.subscribe();
            let mut feed = feed;
            spawn(async move {
                while updates.changed().await.is_ok() {
                    let next = updates.borrow_and_update().clone();
                    feed.set(next);
                }
            });
        }
    });

    let vm = map_activity(&feed.read());
    if vm.is_empty() {
        return rsx! {
            p { class: "activity__empty", "Waiting for activity from {url}..." }
        };
    }

    rsx! {
        div { class: "activity",
            ActivityTable { title: "Jobs", rows: vm.jobs }
            ActivityTable { title: "Drafts", rows: vm.drafts }
            section { class: "activity__section",
                h3 { "Log" }
                ol { class: "activity__log",
                    for (index, line) in vm.logs.into_iter().enumerate() {
                        li { key: "{index}", class: "log log--{line.level}", "{line.text}" }
                    }
                }
            }
        }
    }
}

#[component]
fn ActivityTable(title: &'static str, rows: Vec<ActivityRowVm>) -> Element {
    rsx! {
        section { class: "activity__section",
            h3 { "{title}" }
            if rows.is_empty() {
                p { class: "activity__none", "None" }
            } else {
                table { class: "activity__table",
                    tbody {
                        for row in rows {
                            tr { key: "{row.key}",
                                td { "{row.title}" }
                                td { class: "status status--{row.status}", "{row.status}" }
                                td { {row.detail.unwrap_or_default()} }
                                td { {row.updated.unwrap_or_default()} }
                            }
                        }
                    }
                }
            }
        }
    }
}
