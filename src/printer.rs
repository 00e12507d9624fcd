//! Conflict-marker text rendering (§4.9.1): accumulates a merged file as a
//! sequence of agreed sections and content conflicts, then renders it
//! honoring `DisplaySettings`.

use regex::Regex;

use crate::settings::DisplaySettings;

/// A merged file represented as a sequence of sections, some successfully
/// merged and others still conflicting.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct MergedText {
    sections: Vec<MergeSection>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
enum MergeSection {
    Merged(String),
    Conflict { base: String, left: String, right: String },
}

impl MergedText {
    pub fn new() -> Self {
        Self::default()
    }

    /// Appends text that is not (or no longer) in conflict.
    pub fn push_merged(&mut self, contents: impl Into<String>) {
        self.sections.push(MergeSection::Merged(contents.into()));
    }

    /// Appends a three-way content conflict. Collapses to a merged section
    /// when left and right happen to agree, since that's not really a
    /// conflict (§4.6).
    pub fn push_conflict(&mut self, base: impl Into<String>, left: impl Into<String>, right: impl Into<String>) {
        let (left, right) = (left.into(), right.into());
        if left == right {
            self.push_merged(left);
        } else {
            self.sections.push(MergeSection::Conflict { base: base.into(), left, right });
        }
    }

    /// Whether any unresolved conflict remains.
    pub fn has_conflicts(&self) -> bool {
        self.sections.iter().any(|s| matches!(s, MergeSection::Conflict { .. }))
    }

    /// The number of unresolved conflict sections.
    pub fn conflict_count(&self) -> usize {
        self.sections.iter().filter(|s| matches!(s, MergeSection::Conflict { .. })).count()
    }

    /// Renders the full file according to `settings`.
    pub fn render(&self, settings: &DisplaySettings) -> String {
        if settings.compact {
            self.render_compact(settings)
        } else {
            self.render_full_lines(settings)
        }
    }

    fn render_full_lines(&self, settings: &DisplaySettings) -> String {
        let mut output = String::new();
        let mut base_buffer = String::new();
        let mut left_buffer = String::new();
        let mut right_buffer = String::new();
        let mut gathering_conflict = false;
        for section in &self.sections {
            match section {
                MergeSection::Merged(contents) => {
                    if gathering_conflict {
                        match contents.find('\n') {
                            Some(newline_idx) => {
                                let to_append = &contents[..=newline_idx];
                                left_buffer.push_str(to_append);
                                base_buffer.push_str(to_append);
                                right_buffer.push_str(to_append);
                                Self::render_conflict(&base_buffer, &left_buffer, &right_buffer, settings, &mut output);
                                output.push_str(&contents[(newline_idx + 1)..]);
                                gathering_conflict = false;
                            }
                            None => {
                                left_buffer.push_str(contents);
                                base_buffer.push_str(contents);
                                right_buffer.push_str(contents);
                            }
                        }
                    } else {
                        output.push_str(contents);
                    }
                }
                MergeSection::Conflict { base, left, right } => {
                    if !gathering_conflict {
                        if !output.ends_with('\n') && !output.is_empty() {
                            let last_newline_index = output.rfind('\n');
                            let last_line = output.split_off(match last_newline_index {
                                Some(idx) => idx + 1,
                                None => 0,
                            });
                            base_buffer = last_line.clone();
                            left_buffer = last_line.clone();
                            right_buffer = last_line;
                        } else {
                            base_buffer.clear();
                            left_buffer.clear();
                            right_buffer.clear();
                        }
                    }
                    base_buffer.push_str(base);
                    left_buffer.push_str(left);
                    right_buffer.push_str(right);
                    let all_end_with_newline = (base_buffer.ends_with('\n') || base_buffer.trim().is_empty())
                        && (left_buffer.ends_with('\n') || left_buffer.trim().is_empty())
                        && (right_buffer.ends_with('\n') || right_buffer.trim().is_empty());
                    if all_end_with_newline {
                        Self::render_conflict(&base_buffer, &left_buffer, &right_buffer, settings, &mut output);
                    }
                    gathering_conflict = !all_end_with_newline;
                }
            }
        }
        if gathering_conflict {
            Self::render_conflict(&base_buffer, &left_buffer, &right_buffer, settings, &mut output);
        }
        output
    }

    fn render_conflict(base: &str, left: &str, right: &str, settings: &DisplaySettings, output: &mut String) {
        Self::maybe_add_newline(output);
        output.push_str(&settings.left_marker());
        output.push('\n');
        if !left.trim().is_empty() {
            output.push_str(left);
        }
        if settings.diff3 {
            Self::maybe_add_newline(output);
            output.push_str(&settings.base_marker());
            output.push('\n');
            if !base.trim().is_empty() {
                output.push_str(base);
            }
        }
        Self::maybe_add_newline(output);
        output.push_str(&settings.middle_marker());
        output.push('\n');
        if !right.trim().is_empty() {
            output.push_str(right);
        }
        Self::maybe_add_newline(output);
        output.push_str(&settings.right_marker());
        output.push('\n');
    }

    fn render_compact(&self, settings: &DisplaySettings) -> String {
        let mut output = String::new();
        let mut last_was_conflict = false;
        let leading_whitespace_pattern = Regex::new("^[\t ]*\n").expect("static regex");
        let trailing_whitespace_pattern = Regex::new("[\t ]+$").expect("static regex");
        for section in &self.sections {
            match section {
                MergeSection::Merged(contents) => {
                    if last_was_conflict {
                        output.push_str(&leading_whitespace_pattern.replace(contents, ""));
                    } else {
                        output.push_str(contents);
                    }
                    last_was_conflict = false;
                }
                MergeSection::Conflict { base, left, right } => {
                    if let Some(occurrence) = trailing_whitespace_pattern.find(&output) {
                        let whitespace_to_prepend = output.split_off(occurrence.start());
                        let new_base = if base.is_empty() { base.clone() } else { whitespace_to_prepend.clone() + base };
                        let new_left = if left.is_empty() { left.clone() } else { whitespace_to_prepend.clone() + left };
                        let new_right = if right.is_empty() { right.clone() } else { whitespace_to_prepend + right };
                        Self::render_conflict(&new_base, &new_left, &new_right, settings, &mut output);
                    } else {
                        Self::render_conflict(base, left, right, settings, &mut output);
                    }
                    last_was_conflict = true;
                }
            }
        }
        output
    }

    fn maybe_add_newline(output: &mut String) {
        if !output.ends_with('\n') && !output.is_empty() {
            output.push('\n');
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn spurious_conflict_collapses_to_merged() {
        let mut text = MergedText::new();
        text.push_merged("let's start ");
        text.push_conflict("tomorrow", "now", "now");
        text.push_merged(", as it seems we all agree");
        assert!(!text.has_conflicts());
        assert_eq!(text.render(&DisplaySettings::default()), "let's start now, as it seems we all agree");
    }

    #[test]
    fn genuine_conflict_is_marked() {
        let mut text = MergedText::new();
        text.push_merged("int x = ");
        text.push_conflict("1", "2", "3");
        text.push_merged(";");
        assert!(text.has_conflicts());
        let rendered = text.render(&DisplaySettings::default());
        assert!(rendered.contains("<<<<<<< LEFT"));
        assert!(rendered.contains(">>>>>>> RIGHT"));
    }
}
