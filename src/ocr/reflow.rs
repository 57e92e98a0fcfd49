use super::classify::{
    char_len, ends_with_terminal, has_title_marker, is_list_item, is_numbered_title,
    is_quoted_option, is_signature,
};

pub const SHORT_LINE_CHARS: usize = 60;
pub const OPTION_MAX_CHARS: usize = 80;

// Text LLMs tend to reintroduce hard wraps and blank lines inside lists.
pub fn reflow_translation(text: &str) -> String {
    let joined = join_broken_lines(text);
    drop_blank_lines_in_lists(&joined).join("\n")
}

fn starts_new_item(current: &str, next: &str) -> bool {
    is_numbered_title(next)
        || is_list_item(next)
        || is_quoted_option(next)
        || has_title_marker(next)
        || is_signature(current)
}

fn join_broken_lines(text: &str) -> Vec<String> {
    let lines: Vec<&str> = text.lines().map(str::trim).collect();
    let mut out = Vec::new();
    let mut i = 0;
    while i < lines.len() {
        let line = lines[i];
        if line.is_empty() {
            out.push(String::new());
            i += 1;
            continue;
        }
        if let Some(next) = lines.get(i + 1).copied()
            && !next.is_empty()
            && !ends_with_terminal(line)
            && !starts_new_item(line, next)
        {
            let continues = next
                .chars()
                .next()
                .is_some_and(|ch| ch.is_lowercase() || ch == ',' || ch == ';');
            if continues
                || char_len(line) < SHORT_LINE_CHARS
                || char_len(next) < SHORT_LINE_CHARS
            {
                out.push(format!("{line} {next}"));
                i += 2;
                continue;
            }
        }
        out.push(line.to_string());
        i += 1;
    }
    out
}

fn looks_like_option(line: &str) -> bool {
    line.starts_with('"')
        || (char_len(line) < OPTION_MAX_CHARS && !line.ends_with(['?', '.', '!']))
}

fn drop_blank_lines_in_lists(lines: &[String]) -> Vec<String> {
    let mut out = Vec::new();
    for (idx, line) in lines.iter().enumerate() {
        if line.is_empty() {
            let prev = lines[..idx].iter().rev().find(|l| !l.is_empty());
            let next = lines[idx + 1..].iter().find(|l| !l.is_empty());
            if let (Some(prev), Some(next)) = (prev, next) {
                let both_items = is_list_item(prev) && is_list_item(next);
                let both_options = looks_like_option(prev) && looks_like_option(next);
                if both_items || both_options {
                    continue;
                }
            }
        }
        out.push(line.clone());
    }
    out
}
