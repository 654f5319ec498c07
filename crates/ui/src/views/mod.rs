mod activity;
mod annotated;
mod capture;
mod narration;
mod practice;
mod region;
mod state;

#[cfg(test)]
mod test_harness;
#[cfg(test)]
mod view_smoke;

pub use activity::ActivityView;
pub use capture::CaptureView;
pub use practice::PracticeView;
pub use state::{ViewError, ViewState, view_state_from_resource};
