/// Renders milliseconds as `MM:SS:CC` (minutes, seconds, hundredths).
///
/// Minutes are not wrapped: past 99 minutes the field simply grows wider.
pub fn format_time(ms: u64) -> String {
    let minutes = ms / 60_000;
    let seconds = (ms / 1_000) % 60;
    let hundredths = (ms / 10) % 100;
    format!("{:02}:{:02}:{:02}", minutes, seconds, hundredths)
}
