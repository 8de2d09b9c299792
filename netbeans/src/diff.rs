//! Minimal edit scripts between two versions of a report buffer

use similar::{ChangeTag, TextDiff};

/// A netbeans edit, offsets are byte offsets in the buffer being edited
/// after the previous edits have been applied
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Edit {
    Insert { offset: usize, text: String },
    Remove { offset: usize, len: usize },
}

/// Return the line edits that transform `old` into `new`
pub fn line_edits(old: &str, new: &str) -> Vec<Edit> {
    let mut edits = Vec::new();
    let mut offset = 0;

    let diff = TextDiff::from_lines(old, new);
    for change in diff.iter_all_changes() {
        let line = change.value();
        match change.tag() {
            ChangeTag::Equal => offset += line.len(),
            ChangeTag::Delete => edits.push(Edit::Remove {
                offset,
                len: line.len(),
            }),
            ChangeTag::Insert => {
                edits.push(Edit::Insert {
                    offset,
                    text: line.to_string(),
                });
                offset += line.len();
            }
        }
    }
    edits
}

/// Apply the edits to `content`
pub fn apply_edits(content: &str, edits: &[Edit]) -> String {
    let mut result = content.to_string();
    for edit in edits {
        match edit {
            Edit::Insert { offset, text } => result.insert_str(*offset, text),
            Edit::Remove { offset, len } => {
                result.replace_range(*offset..*offset + *len, "");
            }
        }
    }
    result
}
