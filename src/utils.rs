use std::time::{Duration, Instant};

/// Time left before `deadline`, zero once it has passed
pub fn remaining_until(deadline: Instant) -> Duration {
    deadline.saturating_duration_since(Instant::now())
}

/// Stand-in deadline for budgets too large to represent
const FAR_FUTURE: Duration = Duration::from_secs(30 * 365 * 24 * 60 * 60);

/// Deadline `budget` from now, saturating for budgets an `Instant` cannot hold
pub fn deadline_after(budget: Duration) -> Instant {
    let now = Instant::now();
    now.checked_add(budget)
        .or_else(|| now.checked_add(FAR_FUTURE))
        .unwrap_or(now)
}

/// Convert a URL to a sanitized filename
pub fn sanitize_filename(url: &str) -> String {
    // Remove protocol and replace invalid filename characters
    let mut name = url.replace("http://", "").replace("https://", "");
    name = name.replace(['/', ':', '?', '&', '=', '#', '%'], "_");

    // Limit filename length on a character boundary
    match name.char_indices().nth(100) {
        Some((idx, _)) => name[..idx].to_string(),
        None => name,
    }
}
