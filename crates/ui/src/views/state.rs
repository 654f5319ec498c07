use dioxus::prelude::*;

use services::{ApiError, FigureError, SessionError};

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ViewError {
    Unknown,
    Busy,
    StartStuck,
    NotFound,
    NoTarget,
    Transport,
    InvalidSelection,
}

impl ViewError {
    #[must_use]
    pub fn message(self) -> &'static str {
        match self {
            Self::Unknown => "Something went wrong. Please try again.",
            Self::Busy => "Still working on the previous request.",
            Self::StartStuck => {
                "Could not start a session because another one keeps getting in the way."
            }
            Self::NotFound => "Nothing to show here.",
            Self::NoTarget => "Pick a question or draft before capturing a figure.",
            Self::Transport => "The server could not be reached. Please try again.",
            Self::InvalidSelection => "That selection does not fit on the page.",
        }
    }

    #[must_use]
    pub fn from_session(err: &SessionError) -> Self {
        match err {
            SessionError::Busy => Self::Busy,
            SessionError::StartStuck { .. } => Self::StartStuck,
            SessionError::Api(api) => Self::from_api(api),
            _ => Self::Unknown,
        }
    }

    #[must_use]
    pub fn from_figure(err: &FigureError) -> Self {
        match err {
            FigureError::NoTarget => Self::NoTarget,
            FigureError::SelectionOutOfBounds { .. } | FigureError::Region(_) => {
                Self::InvalidSelection
            }
            FigureError::Api(api) => Self::from_api(api),
            _ => Self::Unknown,
        }
    }

    fn from_api(err: &ApiError) -> Self {
        match err {
            ApiError::NotFound => Self::NotFound,
            ApiError::Http(_) | ApiError::Status(_) => Self::Transport,
            _ => Self::Unknown,
        }
    }
}

#[derive(Clone, Debug, PartialEq)]
pub enum ViewState<T> {
    Idle,
    Loading,
    Ready(T),
    Error(ViewError),
}

#[must_use]
pub fn view_state_from_resource<T: Clone>(
    resource: &Resource<Result<T, ViewError>>,
) -> ViewState<T> {
    match resource.state().cloned() {
        UseResourceState::Pending => ViewState::Loading,
        UseResourceState::Ready => match resource.value().read().as_ref() {
            Some(Ok(data)) => ViewState::Ready(data.clone()),
            Some(Err(err)) => ViewState::Error(*err),
            None => ViewState::Error(ViewError::Unknown),
        },
        UseResourceState::Paused | UseResourceState::Stopped => ViewState::Idle,
    }
}
