use super::classify::{
    char_len, ends_with_terminal, has_word_char, is_bullet, is_garbage_line, is_quoted_option,
    is_scale_artifact, is_title, starts_as_continuation, strip_symbol_noise,
};

pub const QUESTION_OPTION_MAX_CHARS: usize = 80;

pub fn reconstruct(raw: &str) -> String {
    let normalized = collapse_blank_lines(raw);
    let denoised = strip_symbol_noise(&normalized);
    let kept = filter_lines(&denoised);
    group_paragraphs(&kept).join("\n").trim().to_string()
}

fn collapse_blank_lines(raw: &str) -> String {
    let mut lines: Vec<&str> = Vec::new();
    let mut prev_empty = false;
    for line in raw.lines() {
        let trimmed = line.trim();
        if !trimmed.is_empty() {
            lines.push(trimmed);
            prev_empty = false;
        } else if !prev_empty {
            lines.push("");
            prev_empty = true;
        }
    }
    lines.join("\n").trim().to_string()
}

pub fn filter_lines(text: &str) -> Vec<String> {
    let mut kept = Vec::new();
    for line in text.lines() {
        let line = line.trim();
        if line.is_empty() {
            kept.push(String::new());
            continue;
        }
        if !has_word_char(line) || is_scale_artifact(line) || is_garbage_line(line) {
            continue;
        }
        kept.push(line.to_string());
    }
    kept
}

pub fn group_paragraphs(lines: &[String]) -> Vec<String> {
    let mut out: Vec<String> = Vec::new();
    let mut i = 0;
    while i < lines.len() {
        let line = &lines[i];
        if line.is_empty() {
            out.push(String::new());
            i += 1;
            continue;
        }
        if is_title(line) {
            if out.last().is_some_and(|last| !last.is_empty()) {
                out.push(String::new());
            }
            out.push(line.clone());
            i += 1;
            continue;
        }
        if is_bullet(line) {
            out.push(line.clone());
            i += 1;
            continue;
        }
        if i > 0
            && lines[i - 1].ends_with('?')
            && char_len(line) < QUESTION_OPTION_MAX_CHARS
        {
            out.push(line.clone());
            i += 1;
            continue;
        }

        let mut paragraph = line.clone();
        let mut j = i + 1;
        while let Some(next) = lines.get(j) {
            if next.is_empty() || is_title(next) || is_bullet(next) {
                break;
            }
            let join = if ends_with_terminal(&paragraph) {
                starts_as_continuation(next)
            } else {
                !is_quoted_option(next)
            };
            if !join {
                break;
            }
            paragraph.push(' ');
            paragraph.push_str(next);
            j += 1;
        }
        out.push(paragraph);
        i = j;
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rejoins_wrapped_sentences() {
        let raw = "El verano es alegria\nde los viajes en familia.\nOtra frase aqui.";
        insta::assert_snapshot!(reconstruct(raw), @r"
        El verano es alegria de los viajes en familia.
        Otra frase aqui.
        ");
    }

    #[test]
    fn drops_noise_and_keeps_structure() {
        let raw = "Intro al estudio\n1 2 3 4 5 6 7\n\n\n\n- primera opcion\n- segunda opcion\n~|=\nEl texto sigue\ndespues de la lista";
        insta::assert_snapshot!(reconstruct(raw), @r"
        Intro al estudio

        - primera opcion
        - segunda opcion
        El texto sigue despues de la lista
        ");
    }

    #[test]
    fn titles_get_a_blank_line_before_them() {
        let lines = vec![
            "Texto previo.".to_string(),
            "14- Suplemento (Scale)".to_string(),
        ];
        assert_eq!(
            group_paragraphs(&lines),
            vec!["Texto previo.", "", "14- Suplemento (Scale)"]
        );
    }

    #[test]
    fn question_options_stay_separate() {
        let lines: Vec<String> = ["Con quien vive?", "Solo", "En pareja"]
            .iter()
            .map(|s| s.to_string())
            .collect();
        assert_eq!(
            group_paragraphs(&lines),
            vec!["Con quien vive?", "Solo", "En pareja"]
        );
    }

    #[test]
    fn quoted_options_break_an_open_sentence() {
        let lines: Vec<String> = ["Elija una respuesta", "\"Si\"", "\"No\""]
            .iter()
            .map(|s| s.to_string())
            .collect();
        assert_eq!(group_paragraphs(&lines).len(), 3);
    }

    #[test]
    fn punctuated_line_joins_only_continuations() {
        let lines: Vec<String> = ["Primera frase.", "luego sigue aqui", "Nueva idea"]
            .iter()
            .map(|s| s.to_string())
            .collect();
        assert_eq!(
            group_paragraphs(&lines),
            vec!["Primera frase. luego sigue aqui Nueva idea"]
        );
        let lines: Vec<String> = ["Primera frase.", "Segunda frase."]
            .iter()
            .map(|s| s.to_string())
            .collect();
        assert_eq!(group_paragraphs(&lines).len(), 2);
    }

    #[test]
    fn empty_input_stays_empty() {
        assert_eq!(reconstruct(""), "");
        assert_eq!(reconstruct("\n\n  \n"), "");
        assert_eq!(reconstruct("★ ✓"), "");
    }
}
