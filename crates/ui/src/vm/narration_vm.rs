use services::NarrationFrame;

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct NarrationVm {
    pub step_label: String,
    pub title: String,
    pub subtitle: String,
    /// Shows the typing caret while the subtitle is still being revealed.
    pub typing: bool,
    pub play_label: &'static str,
    pub board_notes: Vec<String>,
    pub is_summary: bool,
    pub can_previous: bool,
    pub can_next: bool,
}

#[must_use]
pub fn map_narration(frame: &NarrationFrame) -> Option<NarrationVm> {
    if frame.total == 0 {
        return None;
    }
    Some(NarrationVm {
        step_label: format!("Step {} / {}", frame.index + 1, frame.total),
        title: frame.title.clone(),
        subtitle: frame.subtitle.clone(),
        typing: !frame.subtitle_complete,
        play_label: if frame.playing { "Pause" } else { "Play" },
        board_notes: frame.board_notes.clone(),
        is_summary: frame.step_type == prep_core::narration::SUMMARY_STEP_TYPE,
        can_previous: frame.has_previous(),
        can_next: frame.has_next(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_frame_has_no_panel() {
        assert!(map_narration(&NarrationFrame::default()).is_none());
    }

    #[test]
    fn labels_follow_frame() {
        let frame = NarrationFrame {
            index: 1,
            total: 3,
            playing: true,
            title: "Isolate x".into(),
            step_type: "step".into(),
            subtitle: "Subtract".into(),
            subtitle_complete: false,
            directives: Vec::new(),
            board_notes: vec!["3x = 9".into()],
        };
        let vm = map_narration(&frame).unwrap();
        assert_eq!(vm.step_label, "Step 2 / 3");
        assert_eq!(vm.play_label, "Pause");
        assert!(vm.typing);
        assert!(vm.can_previous);
        assert!(vm.can_next);
        assert!(!vm.is_summary);
    }
}
