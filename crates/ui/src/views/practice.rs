use std::time::Duration;

use dioxus::prelude::*;
use keyboard_types::Key;
use tracing::warn;

use prep_core::error::parse_question_count;
use prep_core::model::{AnswerValue, Explanation, QuestionId, StepDirective};
use services::sessions::{ExplanationOutcome, Phase};
use services::{Clock, SessionEngine, SessionError, StartRequest};

use crate::context::AppContext;
use crate::views::annotated::{AnnotatedText, ChoiceList, FigureList};
use crate::views::narration::NarrationPanel;
use crate::views::ViewError;
use crate::vm::{
    EngineSignal, QUESTION_COUNTS, SECTIONS, can_start, map_question, map_resume_candidate,
    map_session_footer,
};

#[cfg(test)]
use std::cell::RefCell;
#[cfg(test)]
use std::rc::Rc;

#[derive(Clone, Debug, PartialEq, Eq)]
pub(crate) enum PracticeIntent {
    Start,
    AcceptResume,
    DiscardAndStart,
    Select(String),
    Submit,
    RevealAnswer,
    Explain,
    Previous,
    Next,
    Finish,
    Abort,
    DismissNotice,
}

fn start_request(section: &str, count: u32) -> StartRequest {
    let request = StartRequest::new(count);
    if section.is_empty() {
        request
    } else {
        request.with_section(section)
    }
}

fn report(mut error: Signal<Option<ViewError>>, result: Result<(), SessionError>) {
    match result {
        Ok(()) => error.set(None),
        Err(SessionError::Stale) => {}
        Err(err) => {
            warn!(error = %err, "practice request failed");
            error.set(Some(ViewError::from_session(&err)));
        }
    }
}

#[component]
pub fn PracticeView() -> Element {
    let ctx = use_context::<AppContext>();
    let practice = ctx.practice();

    let engine = use_signal(|| SessionEngine::new(Clock::default()));
    let store = EngineSignal::new(engine);
    let mut section = use_signal(String::new);
    let mut count = use_signal(|| QUESTION_COUNTS[1]);
    let mut selected = use_signal(|| None::<String>);
    let mut free_text = use_signal(String::new);
    let mut directives = use_signal(Vec::<StepDirective>::new);
    let explanation = use_signal(|| None::<(QuestionId, Explanation)>);
    let error = use_signal(|| None::<ViewError>);
    let mut language = use_signal(|| ctx.language());
    let mut tick = use_signal(|| 0_u64);

    use_hook({
        let practice = practice.clone();
        move || {
            spawn(async move {
                report(error, practice.resume_active(&store).await.map(|_| ()));
            });
        }
    });

    use_hook({
        let mut updates = ctx.user_updates();
        move || {
            spawn(async move {
                while updates.changed().await.is_ok() {
                    let next = updates.borrow_and_update().language.clone();
                    language.set(next);
                }
            });
        }
    });

    use_future(move || async move {
        let mut interval = tokio::time::interval(Duration::from_secs(1));
        loop {
            interval.tick().await;
            if engine.peek().phase() == Phase::Active {
                tick.with_mut(|value| *value += 1);
            }
        }
    });

    let dispatch_intent = {
        let practice = practice.clone();
        use_callback(move |intent: PracticeIntent| {
            let mut engine = engine;
            let mut explanation = explanation;
            let practice = practice.clone();
            let mut reset_question = move || {
                selected.set(None);
                free_text.set(String::new());
                explanation.set(None);
                directives.set(Vec::new());
            };

            match intent {
                PracticeIntent::Start => {
                    reset_question();
                    let request = start_request(&section.peek(), *count.peek());
                    spawn(async move {
                        report(error, practice.start(&store, &request).await.map(|_| ()));
                    });
                }
                PracticeIntent::DiscardAndStart => {
                    reset_question();
                    let request = start_request(&section.peek(), *count.peek());
                    spawn(async move {
                        let result = practice.discard_candidate_and_start(&store, &request).await;
                        report(error, result.map(|_| ()));
                    });
                }
                PracticeIntent::AcceptResume => {
                    reset_question();
                    engine.write().accept_resume_candidate();
                }
                PracticeIntent::Select(key) => selected.set(Some(key)),
                PracticeIntent::Submit => {
                    let Some(question_id) = engine.peek().current_question().map(|q| q.id) else {
                        return;
                    };
                    let value = selected
                        .peek()
                        .clone()
                        .unwrap_or_else(|| free_text.peek().trim().to_string());
                    let elapsed = engine.peek().elapsed_on_current();
                    spawn(async move {
                        let result = practice
                            .submit(&store, question_id, AnswerValue::new(value), Some(elapsed))
                            .await;
                        if result.is_ok() {
                            selected.set(None);
                        }
                        report(error, result.map(|_| ()));
                    });
                }
                PracticeIntent::RevealAnswer => {
                    let question_id = engine.peek().current_question().map(|q| q.id);
                    if let Some(question_id) = question_id {
                        engine.write().reveal_answer(question_id);
                    }
                }
                PracticeIntent::Explain => {
                    let Some(question_id) = engine.peek().current_question().map(|q| q.id) else {
                        return;
                    };
                    spawn(async move {
                        match practice.explanation(&store, question_id).await {
                            Ok(ExplanationOutcome::Ready(ready)) => {
                                explanation.set(Some((question_id, ready)));
                                report(error, Ok(()));
                            }
                            Ok(ExplanationOutcome::QuotaExceeded(_)) => report(error, Ok(())),
                            Err(err) => report(error, Err(err)),
                        }
                    });
                }
                PracticeIntent::Previous => {
                    if engine.write().previous().is_ok() {
                        reset_question();
                    }
                }
                PracticeIntent::Next => {
                    if engine.write().next().is_ok() {
                        reset_question();
                    }
                }
                PracticeIntent::Finish => {
                    reset_question();
                    spawn(async move {
                        report(error, practice.finish(&store).await);
                    });
                }
                PracticeIntent::Abort => {
                    reset_question();
                    spawn(async move {
                        practice.abort(&store).await;
                    });
                }
                PracticeIntent::DismissNotice => {
                    engine.write().dismiss_notice();
                    let mut error = error;
                    error.set(None);
                }
            }
        })
    };

    #[cfg(test)]
    {
        let mut registered = use_signal(|| false);
        if !registered() {
            registered.set(true);
            if let Some(handles) = try_consume_context::<PracticeTestHandles>() {
                handles.register(dispatch_intent, engine);
            }
        }
    }

    let on_key = move |evt: KeyboardEvent| match evt.data.key() {
        Key::ArrowLeft => {
            evt.prevent_default();
            dispatch_intent.call(PracticeIntent::Previous);
        }
        Key::ArrowRight => {
            evt.prevent_default();
            dispatch_intent.call(PracticeIntent::Next);
        }
        _ => {}
    };

    let _ = tick();
    let engine_guard = engine.read();
    let phase = engine_guard.phase();
    let start_enabled = can_start(&engine_guard);
    let resume = map_resume_candidate(&engine_guard);
    let footer = map_session_footer(&engine_guard);
    let notice = engine_guard.notice().map(|notice| notice.message());
    let question = map_question(&engine_guard, &directives.read(), selected.read().as_deref());
    drop(engine_guard);

    let shown_explanation = explanation
        .read()
        .as_ref()
        .filter(|(id, _)| question.as_ref().is_some_and(|vm| vm.id == *id))
        .cloned();
    let language_value = language();
    let view_error = *error.read();
    let loading_label = footer.busy_label.unwrap_or("Loading...");

    rsx! {
        div { class: "page practice-page", tabindex: "0", onkeydown: on_key,
            header { class: "view-header",
                h2 { class: "view-title", "Practice" }
                p { class: "view-subtitle", "Answer questions and watch step-by-step explanations." }
            }
            div { class: "view-divider" }
            if let Some(err) = view_error {
                p { class: "error", "{err.message()}" }
            }
            if let Some(message) = notice {
                div { class: "notice", role: "status",
                    span { "{message}" }
                    button {
                        class: "btn btn-ghost",
                        r#type: "button",
                        onclick: move |_| dispatch_intent.call(PracticeIntent::DismissNotice),
                        "Dismiss"
                    }
                }
            }
            match phase {
                Phase::Prep => rsx! {
                    if let Some(candidate) = resume {
                        div { class: "resume",
                            h3 { "You have an unfinished session" }
                            p { "{candidate.answered_label}" }
                            button {
                                class: "btn btn-primary",
                                id: "practice-resume",
                                r#type: "button",
                                onclick: move |_| dispatch_intent.call(PracticeIntent::AcceptResume),
                                "Resume"
                            }
                            button {
                                class: "btn btn-secondary",
                                r#type: "button",
                                onclick: move |_| dispatch_intent.call(PracticeIntent::DiscardAndStart),
                                "Discard and start new"
                            }
                        }
                    } else {
                        form { class: "prep",
                            onsubmit: move |evt: FormEvent| {
                                evt.prevent_default();
                                dispatch_intent.call(PracticeIntent::Start);
                            },
                            label { "Section"
                                select {
                                    value: "{section}",
                                    onchange: move |evt: FormEvent| section.set(evt.value()),
                                    for (value, label) in SECTIONS {
                                        option { key: "{value}", value: "{value}", "{label}" }
                                    }
                                }
                            }
                            label { "Questions"
                                select {
                                    value: "{count}",
                                    onchange: move |evt: FormEvent| {
                                        if let Ok(parsed) = parse_question_count(&evt.value()) {
                                            count.set(parsed);
                                        }
                                    },
                                    for value in QUESTION_COUNTS {
                                        option { key: "{value}", value: "{value}", "{value}" }
                                    }
                                }
                            }
                            button {
                                class: "btn btn-primary",
                                id: "practice-start",
                                r#type: "submit",
                                disabled: !start_enabled,
                                "Start session"
                            }
                        }
                    }
                },
                Phase::Loading => rsx! {
                    p { class: "practice__loading", "{loading_label}" }
                },
                Phase::Active => rsx! {
                    if let Some(vm) = question {
                        article { class: "question",
                            header { class: "question__header",
                                span { class: "question__position", "{vm.position_label}" }
                                span { class: "question__section", "{vm.section_label}" }
                            }
                            if let Some(passage) = vm.passage.clone() {
                                AnnotatedText { runs: passage, class: "question__passage" }
                            }
                            AnnotatedText { runs: vm.stem.clone(), class: "question__stem" }
                            FigureList { figures: vm.figures.clone() }
                            if let Some(reason) = vm.unavailable.clone() {
                                p { class: "question__unavailable", "{reason}" }
                            }
                            if !vm.choices.is_empty() {
                                ChoiceList {
                                    choices: vm.choices.clone(),
                                    enabled: vm.can_answer(),
                                    on_select: move |key: String| dispatch_intent.call(PracticeIntent::Select(key)),
                                }
                            }
                            if let Some(free) = vm.free_response.clone() {
                                input {
                                    class: "question__input",
                                    r#type: "text",
                                    "inputmode": "{free.input_mode}",
                                    placeholder: "{free.placeholder}",
                                    maxlength: free.max_length.map(|len| len.to_string()),
                                    disabled: !vm.can_answer(),
                                    value: "{free_text}",
                                    oninput: move |evt: FormEvent| free_text.set(evt.value()),
                                    onkeydown: move |evt: KeyboardEvent| {
                                        evt.stop_propagation();
                                        if evt.data.key() == Key::Enter {
                                            dispatch_intent.call(PracticeIntent::Submit);
                                        }
                                    },
                                }
                            }
                            if let Some(status) = vm.status.clone() {
                                div { class: "answer answer--{status.label.to_ascii_lowercase()}",
                                    span { class: "answer__label", "{status.label}" }
                                    span { class: "answer__value", "Your answer: {status.value}" }
                                    match status.revealed_answer {
                                        Some(answer) => rsx! {
                                            span { class: "answer__canonical", "Answer: {answer}" }
                                        },
                                        None => rsx! {
                                            button {
                                                class: "btn btn-ghost",
                                                r#type: "button",
                                                onclick: move |_| dispatch_intent.call(PracticeIntent::RevealAnswer),
                                                "Show answer"
                                            }
                                        },
                                    }
                                }
                            }
                            div { class: "question__actions",
                                button {
                                    class: "btn btn-primary",
                                    id: "practice-submit",
                                    r#type: "button",
                                    disabled: !vm.can_answer() || footer.busy_label.is_some(),
                                    onclick: move |_| dispatch_intent.call(PracticeIntent::Submit),
                                    "Submit"
                                }
                                button {
                                    class: "btn btn-secondary",
                                    id: "practice-explain",
                                    r#type: "button",
                                    disabled: footer.busy_label.is_some(),
                                    onclick: move |_| dispatch_intent.call(PracticeIntent::Explain),
                                    "Explain"
                                }
                            }
                        }
                        if let Some((question_id, ready)) = shown_explanation {
                            NarrationPanel {
                                key: "{question_id}-{language_value}",
                                explanation: ready,
                                language: language_value.clone(),
                                directives,
                            }
                        }
                        nav { class: "question__nav",
                            button {
                                class: "btn btn-secondary",
                                r#type: "button",
                                disabled: !vm.can_previous,
                                onclick: move |_| dispatch_intent.call(PracticeIntent::Previous),
                                "Previous"
                            }
                            button {
                                class: "btn btn-secondary",
                                r#type: "button",
                                disabled: !vm.can_next,
                                onclick: move |_| dispatch_intent.call(PracticeIntent::Next),
                                "Next"
                            }
                            button {
                                class: "btn btn-primary",
                                r#type: "button",
                                onclick: move |_| dispatch_intent.call(PracticeIntent::Finish),
                                "Finish"
                            }
                            button {
                                class: "btn btn-ghost",
                                r#type: "button",
                                onclick: move |_| dispatch_intent.call(PracticeIntent::Abort),
                                "Abort"
                            }
                        }
                    }
                    footer { class: "session-modal__footer",
                        span { class: "session-footer__item", "{footer.progress_label}" }
                        span { class: "session-footer__item", "{footer.score_label}" }
                        span { class: "session-footer__item session-footer__timer", "{footer.elapsed_label}" }
                        if let Some(quota) = footer.quota_label.clone() {
                            span { class: "session-footer__item", "{quota}" }
                        }
                        if let Some(busy) = footer.busy_label {
                            span { class: "session-footer__item session-footer__busy", "{busy}" }
                        }
                    }
                },
            }
        }
    }
}

#[cfg(test)]
#[derive(Clone, Default)]
pub(crate) struct PracticeTestHandles {
    dispatch: Rc<RefCell<Option<Callback<PracticeIntent>>>>,
    engine: Rc<RefCell<Option<Signal<SessionEngine>>>>,
}

#[cfg(test)]
impl PracticeTestHandles {
    pub(crate) fn register(&self, dispatch: Callback<PracticeIntent>, engine: Signal<SessionEngine>) {
        *self.dispatch.borrow_mut() = Some(dispatch);
        *self.engine.borrow_mut() = Some(engine);
    }

    pub(crate) fn dispatch(&self) -> Callback<PracticeIntent> {
        (*self.dispatch.borrow()).expect("practice dispatch registered")
    }

    pub(crate) fn engine(&self) -> Signal<SessionEngine> {
        (*self.engine.borrow()).expect("practice engine registered")
    }
}
