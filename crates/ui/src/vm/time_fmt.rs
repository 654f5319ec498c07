/// `m:ss`, as shown next to the current question.
#[must_use]
pub fn format_elapsed(seconds: u32) -> String {
    let minutes = seconds / 60;
    let remainder = seconds % 60;
    format!("{minutes}:{remainder:02}")
}
