//! Heading-delimited section replacement.
//!
//! A section is the span between a heading line whose text equals the
//! configured name and the next heading line (or end of document).  Only that
//! span is regenerated; the heading line and everything outside the span are
//! kept as they are.

use regex::Regex;

use crate::frontmatter;

fn heading_matcher(name: &str) -> Option<Regex> {
    Regex::new(&format!(r"^#{{1,6}}[ \t]+{}[ \t]*\r?$", regex::escape(name))).ok()
}

fn is_heading_line(line: &str) -> bool {
    let hashes = line.chars().take_while(|ch| *ch == '#').count();
    if hashes == 0 || hashes > 6 {
        return false;
    }
    matches!(line[hashes..].chars().next(), None | Some(' ' | '\t' | '\n' | '\r'))
}

/// Byte range of the body under `heading`, plus whether another heading
/// follows it.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SectionSpan {
    pub heading_end: usize,
    pub body_end: usize,
    pub followed_by_heading: bool,
}

/// Find the first section named `heading`, ignoring the frontmatter block.
pub fn find_section(content: &str, heading: &str) -> Option<SectionSpan> {
    if heading.trim().is_empty() {
        return None;
    }
    let matcher = heading_matcher(heading)?;
    let mut offset = frontmatter::body_offset(content);
    let mut heading_end = None;

    for line in content[offset..].split_inclusive('\n') {
        let next = offset + line.len();
        match heading_end {
            None => {
                if matcher.is_match(line.trim_end_matches('\n')) {
                    heading_end = Some(next);
                }
            }
            Some(start) if is_heading_line(line) => {
                return Some(SectionSpan {
                    heading_end: start,
                    body_end: offset,
                    followed_by_heading: true,
                });
            }
            Some(_) => {}
        }
        offset = next;
    }

    heading_end.map(|start| SectionSpan {
        heading_end: start,
        body_end: content.len(),
        followed_by_heading: false,
    })
}

/// Replace the body of the section named `heading` with `body`.
///
/// Returns `None` when no such heading exists; the caller treats that as a
/// no-op.  `body` is spliced verbatim, so `$1` or `\` sequences in it appear
/// literally in the output.
pub fn rewrite_section(content: &str, heading: &str, body: &str) -> Option<String> {
    let span = find_section(content, heading)?;
    let body = body.trim_end_matches(['\n', '\r']);

    let mut out = String::with_capacity(content.len() + body.len() + 2);
    out.push_str(&content[..span.heading_end]);
    if !out.ends_with('\n') {
        out.push('\n');
    }
    if !body.is_empty() {
        out.push_str(body);
        out.push('\n');
    }
    if span.followed_by_heading {
        out.push('\n');
    }
    out.push_str(&content[span.body_end..]);
    Some(out)
}

/// Current body of a section, without the heading line.
pub fn section_body<'a>(content: &'a str, heading: &str) -> Option<&'a str> {
    find_section(content, heading).map(|span| &content[span.heading_end..span.body_end])
}

#[cfg(test)]
mod tests {
    use super::*;

    const DOC: &str = "---\nsteps: 10\n---\n# 2024-01-20\n\nMorning notes.\n\n## Exercise\n- old entry\n\n## Journal\nFelt fine.\n";

    #[test]
    fn replaces_body_between_headings() {
        let updated = rewrite_section(DOC, "Exercise", "- 30 min — Running").unwrap();
        assert_eq!(
            updated,
            "---\nsteps: 10\n---\n# 2024-01-20\n\nMorning notes.\n\n## Exercise\n- 30 min — Running\n\n## Journal\nFelt fine.\n"
        );
    }

    #[test]
    fn bytes_outside_the_span_are_untouched() {
        let span = find_section(DOC, "Exercise").unwrap();
        let updated = rewrite_section(DOC, "Exercise", "new body").unwrap();
        assert!(updated.starts_with(&DOC[..span.heading_end]));
        assert!(updated.ends_with(&DOC[span.body_end..]));
    }

    #[test]
    fn missing_heading_is_none() {
        assert!(rewrite_section(DOC, "Sleep", "x").is_none());
        assert!(rewrite_section(DOC, "", "x").is_none());
    }

    #[test]
    fn section_at_end_of_document() {
        let updated = rewrite_section(DOC, "Journal", "Replaced.").unwrap();
        assert!(updated.ends_with("## Journal\nReplaced.\n"));
        assert!(updated.contains("## Exercise\n- old entry\n\n## Journal"));
    }

    #[test]
    fn heading_without_trailing_newline() {
        let updated = rewrite_section("# Day\n## Heart rate", "Heart rate", "| a |").unwrap();
        assert_eq!(updated, "# Day\n## Heart rate\n| a |\n");
    }

    #[test]
    fn second_rewrite_leaves_only_latest_body() {
        let first = rewrite_section(DOC, "Exercise", "X").unwrap();
        let second = rewrite_section(&first, "Exercise", "Y").unwrap();
        assert_eq!(second, rewrite_section(DOC, "Exercise", "Y").unwrap());
        assert!(!second.contains("\nX\n"));
        assert!(second.contains("## Exercise\nY\n\n## Journal\nFelt fine.\n"));
    }

    #[test]
    fn rewrite_is_idempotent() {
        let once = rewrite_section(DOC, "Exercise", "- 5 min — Walk\n").unwrap();
        let twice = rewrite_section(&once, "Exercise", "- 5 min — Walk\n").unwrap();
        assert_eq!(once, twice);
    }

    #[test]
    fn replacement_syntax_is_literal() {
        let updated = rewrite_section(DOC, "Exercise", "cost $1 and $$ and \\1").unwrap();
        assert!(updated.contains("## Exercise\ncost $1 and $$ and \\1\n"));
    }

    #[test]
    fn heading_text_is_matched_literally() {
        let doc = "## Blood oxygen (SpO2)\nold\n## Blood oxygen\nkeep\n";
        let updated = rewrite_section(doc, "Blood oxygen (SpO2)", "new").unwrap();
        assert_eq!(updated, "## Blood oxygen (SpO2)\nnew\n\n## Blood oxygen\nkeep\n");
    }

    #[test]
    fn partial_heading_names_do_not_match() {
        let doc = "## Exercise log\nkeep\n";
        assert!(rewrite_section(doc, "Exercise", "x").is_none());
    }

    #[test]
    fn any_heading_level_matches_and_bounds() {
        let doc = "#### Exercise\nold\n# Next\n";
        let updated = rewrite_section(doc, "Exercise", "new").unwrap();
        assert_eq!(updated, "#### Exercise\nnew\n\n# Next\n");
    }

    #[test]
    fn tags_are_not_headings() {
        let doc = "## Exercise\nold\n#tag line\n## Next\n";
        let updated = rewrite_section(doc, "Exercise", "new").unwrap();
        assert_eq!(updated, "## Exercise\nnew\n\n## Next\n");
    }

    #[test]
    fn frontmatter_comments_are_not_headings() {
        let doc = "---\n# Exercise\n---\nbody\n## Exercise\nold\n";
        let updated = rewrite_section(doc, "Exercise", "new").unwrap();
        assert_eq!(updated, "---\n# Exercise\n---\nbody\n## Exercise\nnew\n");
    }

    #[test]
    fn empty_body_clears_section() {
        let updated = rewrite_section(DOC, "Exercise", "").unwrap();
        assert!(updated.contains("## Exercise\n\n## Journal"));
        assert_eq!(section_body(&updated, "Exercise"), Some("\n"));
    }
}
