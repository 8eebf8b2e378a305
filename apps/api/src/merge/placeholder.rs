//! Placeholder tokenizer shared by discovery and substitution.
//!
//! A placeholder is `{name}` where `name` is one or more characters other
//! than `{` and `}`. Scanning is leftmost and non-overlapping: a `{` that
//! meets another `{` before any `}` is literal text and the scan resumes at
//! the second brace, so `{a{b}` yields the literal `{a` and the placeholder
//! `b`. `{}` and an unterminated `{a` are literal text.

/// A placeholder occurrence inside a larger text.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Placeholder<'a> {
    /// The name between the braces.
    pub name: &'a str,
    /// The full token including braces.
    pub raw: &'a str,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Segment<'a> {
    Literal(&'a str),
    Placeholder(Placeholder<'a>),
}

/// Splits `text` into literal and placeholder segments. Concatenating the
/// segments' source text reproduces `text` exactly.
pub fn tokenize(text: &str) -> Vec<Segment<'_>> {
    let bytes = text.as_bytes();
    let mut segments = Vec::new();
    let mut literal_start = 0;
    let mut i = 0;

    // Braces are ASCII, so every index compared against them is a char boundary.
    while i < bytes.len() {
        if bytes[i] != b'{' {
            i += 1;
            continue;
        }

        let mut j = i + 1;
        while j < bytes.len() && bytes[j] != b'{' && bytes[j] != b'}' {
            j += 1;
        }

        if j < bytes.len() && bytes[j] == b'}' && j > i + 1 {
            if literal_start < i {
                segments.push(Segment::Literal(&text[literal_start..i]));
            }
            segments.push(Segment::Placeholder(Placeholder {
                name: &text[i + 1..j],
                raw: &text[i..=j],
            }));
            i = j + 1;
            literal_start = i;
        } else {
            // Nothing between i and j can open a token; resume at j.
            i = j;
        }
    }

    if literal_start < bytes.len() {
        segments.push(Segment::Literal(&text[literal_start..]));
    }

    segments
}

/// Placeholder names in order of appearance, duplicates included.
pub fn placeholder_names(text: &str) -> impl Iterator<Item = &str> + '_ {
    tokenize(text).into_iter().filter_map(|segment| match segment {
        Segment::Placeholder(p) => Some(p.name),
        Segment::Literal(_) => None,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn names(text: &str) -> Vec<&str> {
        placeholder_names(text).collect()
    }

    fn rebuild(segments: &[Segment<'_>]) -> String {
        segments
            .iter()
            .map(|s| match s {
                Segment::Literal(l) => *l,
                Segment::Placeholder(p) => p.raw,
            })
            .collect()
    }

    #[test]
    fn test_simple_placeholders() {
        assert_eq!(names("Name: {name}, Date: {date}"), vec!["name", "date"]);
    }

    #[test]
    fn test_adjacent_placeholders_found_independently() {
        assert_eq!(names("{a}{b}"), vec!["a", "b"]);
    }

    #[test]
    fn test_empty_braces_are_literal() {
        assert!(names("{}").is_empty());
        assert_eq!(tokenize("x{}y"), vec![Segment::Literal("x{}y")]);
    }

    #[test]
    fn test_unbalanced_open_brace_restarts_at_next_brace() {
        let segments = tokenize("{a{b}");
        assert_eq!(
            segments,
            vec![
                Segment::Literal("{a"),
                Segment::Placeholder(Placeholder {
                    name: "b",
                    raw: "{b}"
                }),
            ]
        );
    }

    #[test]
    fn test_double_braces_yield_inner_token() {
        assert_eq!(names("{{a}}"), vec!["a"]);
        assert_eq!(rebuild(&tokenize("{{a}}")), "{{a}}");
    }

    #[test]
    fn test_unterminated_and_stray_braces_are_literal() {
        assert!(names("{open").is_empty());
        assert!(names("close}").is_empty());
        assert!(names("}{").is_empty());
    }

    #[test]
    fn test_names_are_opaque_and_case_sensitive() {
        assert_eq!(names("{Goal} {goal} {实训 目标} {a.b-c}"), vec!["Goal", "goal", "实训 目标", "a.b-c"]);
    }

    #[test]
    fn test_duplicates_are_reported_each_time() {
        assert_eq!(names("{x} and {x}"), vec!["x", "x"]);
    }

    #[test]
    fn test_segments_reproduce_input() {
        for text in ["", "plain", "{a}", "a{b}c{", "{{}}{x}}", "多字节{名}文本"] {
            assert_eq!(rebuild(&tokenize(text)), text, "input: {text:?}");
        }
    }
}
