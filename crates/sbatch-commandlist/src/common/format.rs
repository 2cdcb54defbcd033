pub fn human_duration(duration: chrono::Duration) -> String {
    // Truncate to reasonable precision
    if duration.num_hours() > 0 {
        chrono::Duration::minutes(duration.num_minutes())
    } else if duration.num_minutes() > 0 {
        chrono::Duration::seconds(duration.num_seconds())
    } else {
        chrono::Duration::milliseconds(duration.num_milliseconds())
    }
    .to_std()
    .map(|d| humantime::format_duration(d).to_string())
    .unwrap_or_else(|_| "Invalid duration".to_string())
}
