/// Shorten text for log output, appending an ellipsis when cut.
pub fn preview(text: &str, max_chars: usize) -> String {
    let mut chars = text.chars();
    let head: String = chars.by_ref().take(max_chars).collect();
    if chars.next().is_some() {
        format!("{}…", head)
    } else {
        head
    }
}

pub fn format_tags(tags: &[String]) -> String {
    if tags.is_empty() {
        return "No tags".to_string();
    }

    tags.iter()
        .map(|tag| format!("#{}", tag))
        .collect::<Vec<_>>()
        .join(" • ")
}

/// Trimmed question, or `None` when nothing is left.
pub fn normalize_question(raw: &str) -> Option<&str> {
    let trimmed = raw.trim();
    if trimmed.is_empty() {
        None
    } else {
        Some(trimmed)
    }
}
