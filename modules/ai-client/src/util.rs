const FENCE: &str = "```";

/// Unwrap a markdown code fence Gemini sometimes puts around JSON output,
/// including any info string after the opening fence (`json`, `JSON`, ...).
/// Text without a leading fence is only trimmed.
pub fn strip_code_blocks(response: &str) -> &str {
    let text = response.trim();
    let Some(rest) = text.strip_prefix(FENCE) else {
        return text;
    };
    let body = match rest.split_once('\n') {
        Some((_info, body)) => body,
        None => rest.trim_start_matches(|c: char| c.is_ascii_alphabetic()),
    };
    body.trim_end().strip_suffix(FENCE).unwrap_or(body).trim()
}

/// Head of a model response for error messages. Cuts at the last char
/// boundary within `max_bytes` and notes the full length when it cuts.
pub fn response_preview(text: &str, max_bytes: usize) -> String {
    if text.len() <= max_bytes {
        return text.to_string();
    }
    let end = text
        .char_indices()
        .map(|(i, c)| i + c.len_utf8())
        .take_while(|&end| end <= max_bytes)
        .last()
        .unwrap_or(0);
    format!("{}... ({} bytes)", &text[..end], text.len())
}
