use prep_core::directives::{TextRun, annotate_choice, for_figure, for_target, segment_text};
use prep_core::model::{
    AnswerFormat, AssignedQuestion, DirectiveAction, DirectiveTarget, Figure, FreeResponseKind,
    QuestionId, StepDirective,
};
use services::SessionEngine;

/// One rendered piece of question text.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct RunVm {
    pub text: String,
    /// CSS classes for annotated runs; `None` for plain text.
    pub class: Option<String>,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct FigureVm {
    pub id: String,
    pub url: String,
    pub caption: Option<String>,
    pub class: String,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ChoiceVm {
    pub key: String,
    pub runs: Vec<RunVm>,
    pub class: String,
    pub figures: Vec<FigureVm>,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct FreeResponseVm {
    pub placeholder: String,
    pub max_length: Option<u32>,
    pub input_mode: &'static str,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct AnswerStatusVm {
    pub value: String,
    pub correct: bool,
    pub label: &'static str,
    /// Canonical answer, once the student asked to see it.
    pub revealed_answer: Option<String>,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct QuestionVm {
    pub id: QuestionId,
    pub position_label: String,
    pub section_label: String,
    pub passage: Option<Vec<RunVm>>,
    pub stem: Vec<RunVm>,
    pub figures: Vec<FigureVm>,
    pub choices: Vec<ChoiceVm>,
    pub free_response: Option<FreeResponseVm>,
    pub unavailable: Option<String>,
    pub status: Option<AnswerStatusVm>,
    pub can_previous: bool,
    pub can_next: bool,
}

impl QuestionVm {
    #[must_use]
    pub fn can_answer(&self) -> bool {
        self.unavailable.is_none() && self.status.is_none()
    }
}

/// CSS classes for an annotation: `mark mark--<action>` plus an emphasis modifier.
#[must_use]
pub fn run_class(action: DirectiveAction, emphasis: Option<&str>) -> String {
    let mut class = format!("mark mark--{}", action.as_str());
    if let Some(emphasis) = emphasis.map(css_token).filter(|token| !token.is_empty()) {
        class.push_str(" mark--");
        class.push_str(&emphasis);
    }
    class
}

fn css_token(raw: &str) -> String {
    raw.trim()
        .chars()
        .map(|ch| {
            if ch.is_ascii_alphanumeric() {
                ch.to_ascii_lowercase()
            } else {
                '-'
            }
        })
        .collect()
}

#[must_use]
pub fn map_runs(runs: &[TextRun]) -> Vec<RunVm> {
    runs.iter()
        .map(|run| match run {
            TextRun::Plain(text) => RunVm {
                text: text.clone(),
                class: None,
            },
            TextRun::Annotated {
                text,
                action,
                emphasis,
                ..
            } => RunVm {
                text: text.clone(),
                class: Some(run_class(*action, emphasis.as_deref())),
            },
        })
        .collect()
}

fn map_figure(figure: &Figure, directives: &[StepDirective]) -> FigureVm {
    let mut class = String::from("figure");
    for directive in for_figure(directives, &figure.id) {
        class.push_str(" figure--");
        class.push_str(directive.action.as_str());
    }
    FigureVm {
        id: figure.id.clone(),
        url: figure.url.clone(),
        caption: figure.caption.clone(),
        class,
    }
}

fn map_choices(
    question: &AssignedQuestion,
    directives: &[StepDirective],
    selected: Option<&str>,
    submitted: Option<(&str, bool)>,
) -> Vec<ChoiceVm> {
    question
        .choices()
        .iter()
        .map(|choice| {
            let annotation = annotate_choice(&choice.key, &choice.text, directives);
            let mut class = String::from("choice");
            if selected.is_some_and(|key| key.eq_ignore_ascii_case(&choice.key)) {
                class.push_str(" choice--selected");
            }
            match submitted {
                Some((value, true)) if value.eq_ignore_ascii_case(&choice.key) => {
                    class.push_str(" choice--correct");
                }
                Some((value, false)) if value.eq_ignore_ascii_case(&choice.key) => {
                    class.push_str(" choice--incorrect");
                }
                _ => {}
            }
            for action in &annotation.whole {
                class.push_str(" choice--");
                class.push_str(action.as_str());
            }
            ChoiceVm {
                key: choice.key.clone(),
                runs: map_runs(&annotation.runs),
                class,
                figures: question
                    .figures_for_choice(&choice.key)
                    .map(|figure| map_figure(figure, directives))
                    .collect(),
            }
        })
        .collect()
}

/// Current question of `engine` with `directives` applied.
#[must_use]
pub fn map_question(
    engine: &SessionEngine,
    directives: &[StepDirective],
    selected: Option<&str>,
) -> Option<QuestionVm> {
    let question = engine.current_question()?;
    let index = engine.current_index();
    let total = engine.question_count();
    let progress = engine.progress_for(question.id);

    let status = progress.map(|entry| AnswerStatusVm {
        value: entry.value.as_str().to_string(),
        correct: entry.is_correct,
        label: if entry.is_correct { "Correct" } else { "Incorrect" },
        revealed_answer: entry
            .revealed
            .then(|| question.correct_answer.clone())
            .flatten(),
    });
    let submitted = progress.map(|entry| (entry.value.as_str(), entry.is_correct));

    let section_label = match question.sub_section.as_deref() {
        Some(sub) => format!("{} · {sub}", question.section),
        None => question.section.clone(),
    };

    let free_response = match &question.format {
        AnswerFormat::Choices { .. } => None,
        AnswerFormat::FreeResponse { schema } => Some(FreeResponseVm {
            placeholder: schema
                .placeholder
                .clone()
                .unwrap_or_else(|| "Your answer".to_string()),
            max_length: schema.max_length,
            input_mode: match schema.kind {
                FreeResponseKind::Numeric => "decimal",
                FreeResponseKind::Text => "text",
            },
        }),
    };

    Some(QuestionVm {
        id: question.id,
        position_label: format!("Question {} of {total}", index + 1),
        section_label,
        passage: question.passage.as_deref().map(|passage| {
            map_runs(&segment_text(
                passage,
                for_target(directives, DirectiveTarget::Passage),
            ))
        }),
        stem: map_runs(&segment_text(
            &question.stem,
            for_target(directives, DirectiveTarget::Stem),
        )),
        figures: question
            .stem_figures()
            .map(|figure| map_figure(figure, directives))
            .collect(),
        choices: map_choices(question, directives, selected, submitted),
        free_response,
        unavailable: question.unavailable_reason().map(|reason| reason.message()),
        status,
        can_previous: index > 0,
        can_next: index + 1 < total,
    })
}
