//! Seed data for offline mode.

use std::collections::BTreeMap;
use std::io::Cursor;

use base64::Engine as _;
use base64::engine::general_purpose::STANDARD;
use image::{ImageFormat, Rgb, RgbImage};

use prep_core::model::{
    AnswerFormat, AssignedQuestion, CaptureTarget, Choice, DirectiveAction, DirectiveTarget,
    DraftId, Explanation, ExplanationStep, Figure, FigureSource, FreeResponseKind,
    FreeResponseSchema, Narration, QuestionId, StepDirective,
};

use super::InMemoryApi;

pub const DEMO_PAGE_WIDTH: u32 = 800;
pub const DEMO_PAGE_HEIGHT: u32 = 500;

impl InMemoryApi {
    /// Server preloaded with a small question bank, explanations and a
    /// capturable source page for question 3 and draft 1.
    #[must_use]
    pub fn demo() -> Self {
        let page = demo_page_source();
        demo_explanations()
            .into_iter()
            .fold(Self::new(demo_questions()), |api, (id, explanation)| {
                api.with_explanation(id, explanation)
            })
            .with_quota(20)
            .with_source(CaptureTarget::Question(QuestionId::new(3)), page.clone())
            .with_source(CaptureTarget::Draft(DraftId::new(1)), page)
    }
}

fn choices(entries: &[(&str, &str)]) -> AnswerFormat {
    AnswerFormat::Choices {
        choices: entries
            .iter()
            .map(|(key, text)| Choice::new(*key, *text))
            .collect(),
    }
}

#[must_use]
pub fn demo_questions() -> Vec<AssignedQuestion> {
    vec![
        AssignedQuestion {
            id: QuestionId::new(1),
            section: "math".into(),
            sub_section: Some("algebra".into()),
            stem: "If 3x + 2 = 11, what is the value of x?".into(),
            passage: None,
            format: choices(&[("A", "2"), ("B", "3"), ("C", "4"), ("D", "9")]),
            figures: Vec::new(),
            correct_answer: Some("B".into()),
            unavailable_reason: None,
        },
        AssignedQuestion {
            id: QuestionId::new(2),
            section: "reading".into(),
            sub_section: Some("inference".into()),
            stem: "Which choice best describes the author's view of the river?".into(),
            passage: Some(
                "The river had always been a border for the town, but that spring it \
                 became a road. Boats carried news faster than any rider could."
                    .into(),
            ),
            format: choices(&[
                ("A", "It is a barrier that isolates the town."),
                ("B", "It becomes a means of connection."),
                ("C", "It is dangerous in the spring."),
                ("D", "It is less useful than riders."),
            ]),
            figures: Vec::new(),
            correct_answer: Some("B".into()),
            unavailable_reason: None,
        },
        AssignedQuestion {
            id: QuestionId::new(3),
            section: "math".into(),
            sub_section: Some("data".into()),
            stem: "The bar chart shows weekly sales. In which week were sales highest?".into(),
            passage: None,
            format: choices(&[("A", "Week 1"), ("B", "Week 2"), ("C", "Week 3"), ("D", "Week 4")]),
            figures: vec![Figure {
                id: "fig-sales".into(),
                url: "memory://figures/questions/3/sales.png".into(),
                choice_key: None,
                caption: Some("Weekly sales".into()),
            }],
            correct_answer: Some("C".into()),
            unavailable_reason: None,
        },
        AssignedQuestion {
            id: QuestionId::new(4),
            section: "math".into(),
            sub_section: Some("arithmetic".into()),
            stem: "What is 0.25 of 18?".into(),
            passage: None,
            format: AnswerFormat::FreeResponse {
                schema: FreeResponseSchema {
                    kind: FreeResponseKind::Numeric,
                    placeholder: Some("Enter a number".into()),
                    max_length: Some(8),
                },
            },
            figures: Vec::new(),
            correct_answer: Some("4.5".into()),
            unavailable_reason: None,
        },
        AssignedQuestion {
            id: QuestionId::new(5),
            section: "reading".into(),
            sub_section: None,
            stem: "This question is still being reviewed.".into(),
            passage: None,
            format: choices(&[]),
            figures: Vec::new(),
            correct_answer: None,
            unavailable_reason: None,
        },
    ]
}

fn localized(en: &str, ko: &str) -> Narration {
    Narration::Localized(BTreeMap::from([
        ("en".to_string(), en.to_string()),
        ("ko".to_string(), ko.to_string()),
    ]))
}

fn step(
    title: &str,
    narration: Narration,
    duration_ms: i64,
    directives: Vec<StepDirective>,
) -> ExplanationStep {
    ExplanationStep {
        title: title.into(),
        step_type: "focus".into(),
        narration,
        duration_ms,
        delay_ms: 300,
        directives,
        board_notes: Vec::new(),
    }
}

#[must_use]
pub fn demo_explanations() -> Vec<(QuestionId, Explanation)> {
    vec![
        (
            QuestionId::new(1),
            Explanation {
                language: Some("en".into()),
                steps: vec![
                    step(
                        "Isolate the variable",
                        localized("Subtract 2 from both sides.", "양변에서 2를 빼세요."),
                        2000,
                        vec![
                            StepDirective::new(DirectiveTarget::Stem, "3x + 2", DirectiveAction::Underline),
                            StepDirective::new(DirectiveTarget::Stem, "11", DirectiveAction::Circle),
                        ],
                    ),
                    step(
                        "Divide",
                        localized("3x = 9, so x = 3.", "3x = 9 이므로 x = 3 입니다."),
                        2000,
                        vec![
                            StepDirective::new(DirectiveTarget::Choices, "", DirectiveAction::Strike)
                                .with_choice("A"),
                            StepDirective::new(DirectiveTarget::Choices, "(B)", DirectiveAction::Highlight)
                                .with_emphasis("answer"),
                        ],
                    ),
                ],
                summary: Some("Undo addition first, then division.".into()),
            },
        ),
        (
            QuestionId::new(2),
            Explanation {
                language: Some("en".into()),
                steps: vec![
                    step(
                        "Find the turn",
                        localized(
                            "The word 'but' signals a change in how the river is seen.",
                            "'but'는 강을 보는 시각의 변화를 나타냅니다.",
                        ),
                        2500,
                        vec![
                            StepDirective::new(DirectiveTarget::Passage, "a border", DirectiveAction::Underline),
                            StepDirective::new(DirectiveTarget::Passage, "became a road", DirectiveAction::Highlight),
                        ],
                    ),
                    step(
                        "Match the choice",
                        localized("A road connects places.", "길은 장소를 연결합니다."),
                        2000,
                        vec![
                            StepDirective::new(DirectiveTarget::Choices, "connection", DirectiveAction::Highlight),
                            StepDirective::new(DirectiveTarget::Choices, "", DirectiveAction::Strike)
                                .with_choice("A"),
                        ],
                    ),
                ],
                summary: None,
            },
        ),
        (
            QuestionId::new(3),
            Explanation {
                language: Some("en".into()),
                steps: vec![step(
                    "Read the chart",
                    localized("The third bar is the tallest.", "세 번째 막대가 가장 높습니다."),
                    2500,
                    vec![
                        StepDirective::new(DirectiveTarget::Figure, "Week 3", DirectiveAction::Circle)
                            .with_figure("fig-sales"),
                        StepDirective::new(DirectiveTarget::Choices, "Option C", DirectiveAction::Highlight),
                    ],
                )],
                summary: Some("Compare bar heights directly.".into()),
            },
        ),
    ]
}

/// Source page with a simple four-bar chart drawn on it.
#[must_use]
pub fn demo_page_source() -> FigureSource {
    let heights = [160_u32, 240, 330, 200];
    let baseline = DEMO_PAGE_HEIGHT - 60;
    let image = RgbImage::from_fn(DEMO_PAGE_WIDTH, DEMO_PAGE_HEIGHT, |x, y| {
        let in_bar = heights.iter().enumerate().any(|(index, height)| {
            let left = 120 + u32::try_from(index).unwrap_or(0) * 150;
            (left..left + 90).contains(&x) && y <= baseline && y >= baseline - height
        });
        if in_bar {
            Rgb([52, 101, 164])
        } else if y == baseline || x == 100 {
            Rgb([40, 40, 40])
        } else {
            Rgb([250, 250, 247])
        }
    });

    let mut png = Cursor::new(Vec::new());
    let encoded = match image.write_to(&mut png, ImageFormat::Png) {
        Ok(()) => STANDARD.encode(png.into_inner()),
        Err(err) => {
            tracing::warn!(error = %err, "could not render demo page");
            String::new()
        }
    };

    FigureSource {
        page: 1,
        image: encoded,
        width: DEMO_PAGE_WIDTH,
        height: DEMO_PAGE_HEIGHT,
    }
}
