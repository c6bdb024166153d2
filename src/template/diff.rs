//! Structural diff between two templates.
//!
//! [`TemplateDiff`] is an iterator: each call to `next` walks only as much
//! of the two trees as is needed to produce the following record. Records
//! come out in document order, mapping keys of the current template first,
//! then keys that only exist in the candidate.

use serde::Serialize;
use serde_yaml::{Mapping, Value};
use std::fmt;
use std::iter::FusedIterator;

use super::model::{RESOURCES_SECTION, Template};
use super::path::{ChangePath, PathToken};

/// A single difference between the current and candidate templates.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum ChangeRecord {
    /// A node present only in the candidate template.
    Added {
        /// Location of the new node.
        path: ChangePath,
        /// The new value.
        rhs: Value,
    },
    /// A node present only in the current template.
    Removed {
        /// Location of the removed node.
        path: ChangePath,
        /// The removed value.
        lhs: Value,
    },
    /// A node present in both templates with a different value.
    Edited {
        /// Location of the edited node.
        path: ChangePath,
        /// Current value.
        lhs: Value,
        /// Candidate value.
        rhs: Value,
    },
    /// A sequence grew or shrank at the given index.
    ArrayElement {
        /// Location of the sequence.
        path: ChangePath,
        /// Index of the element within the sequence.
        index: usize,
        /// What happened to the element.
        change: ElementChange,
    },
}

/// Change to a single sequence element.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "op", content = "value", rename_all = "snake_case")]
pub enum ElementChange {
    /// Element appended in the candidate.
    Added(Value),
    /// Element missing from the candidate.
    Removed(Value),
}

impl ChangeRecord {
    /// Returns the location of the change.
    #[must_use]
    pub const fn path(&self) -> &ChangePath {
        match self {
            Self::Added { path, .. }
            | Self::Removed { path, .. }
            | Self::Edited { path, .. }
            | Self::ArrayElement { path, .. } => path,
        }
    }

    /// Returns the logical identifier when the change sits under `Resources`.
    #[must_use]
    pub fn resource_id(&self) -> Option<&str> {
        let path = self.path();
        if path.key_at(0) == Some(RESOURCES_SECTION) {
            path.key_at(1)
        } else {
            None
        }
    }

    /// Returns the candidate-side value of an edit.
    #[must_use]
    pub const fn rhs(&self) -> Option<&Value> {
        match self {
            Self::Added { rhs, .. } | Self::Edited { rhs, .. } => Some(rhs),
            Self::Removed { .. } | Self::ArrayElement { .. } => None,
        }
    }

    /// Short kind marker used in listings.
    #[must_use]
    pub const fn kind_symbol(&self) -> &'static str {
        match self {
            Self::Added { .. } => "+",
            Self::Removed { .. } => "-",
            Self::Edited { .. } => "~",
            Self::ArrayElement { .. } => "[]",
        }
    }
}

impl fmt::Display for ChangeRecord {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::ArrayElement { path, index, change } => {
                let op = match change {
                    ElementChange::Added(_) => "added",
                    ElementChange::Removed(_) => "removed",
                };
                write!(f, "[] {path}[{index}] {op}")
            }
            other => write!(f, "{} {}", other.kind_symbol(), other.path()),
        }
    }
}

/// Pending comparison work.
#[derive(Debug)]
enum Work<'a> {
    Compare {
        path: ChangePath,
        lhs: &'a Value,
        rhs: &'a Value,
    },
    Added {
        path: ChangePath,
        rhs: &'a Value,
    },
    Removed {
        path: ChangePath,
        lhs: &'a Value,
    },
    Element {
        path: ChangePath,
        index: usize,
        value: &'a Value,
        added: bool,
    },
}

/// Lazy, single-pass diff between two templates.
#[derive(Debug)]
pub struct TemplateDiff<'a> {
    /// Work stack; the next item to process is at the end.
    stack: Vec<Work<'a>>,
}

impl<'a> TemplateDiff<'a> {
    /// Starts a diff of `current` against `candidate`.
    #[must_use]
    pub fn between(current: &'a Template, candidate: &'a Template) -> Self {
        let mut diff = Self { stack: Vec::new() };
        diff.push_mapping(&ChangePath::root(), current.root(), candidate.root());
        diff
    }

    /// Schedules the children of two mappings, preserving document order.
    fn push_mapping(&mut self, path: &ChangePath, lhs: &'a Mapping, rhs: &'a Mapping) {
        let mut children = Vec::with_capacity(lhs.len().max(rhs.len()));

        for (key, lhs_value) in lhs {
            let child = path.child(key_token(key));
            match rhs.get(key) {
                Some(rhs_value) => children.push(Work::Compare {
                    path: child,
                    lhs: lhs_value,
                    rhs: rhs_value,
                }),
                None => children.push(Work::Removed {
                    path: child,
                    lhs: lhs_value,
                }),
            }
        }

        for (key, rhs_value) in rhs {
            if !lhs.contains_key(key) {
                children.push(Work::Added {
                    path: path.child(key_token(key)),
                    rhs: rhs_value,
                });
            }
        }

        self.stack.extend(children.into_iter().rev());
    }

    /// Schedules position-wise comparison of two sequences.
    fn push_sequence(&mut self, path: &ChangePath, lhs: &'a [Value], rhs: &'a [Value]) {
        let common = lhs.len().min(rhs.len());
        let mut children = Vec::with_capacity(lhs.len().max(rhs.len()));

        for index in 0..common {
            children.push(Work::Compare {
                path: path.child(PathToken::Index(index)),
                lhs: &lhs[index],
                rhs: &rhs[index],
            });
        }
        for (index, value) in lhs.iter().enumerate().skip(common) {
            children.push(Work::Element {
                path: path.clone(),
                index,
                value,
                added: false,
            });
        }
        for (index, value) in rhs.iter().enumerate().skip(common) {
            children.push(Work::Element {
                path: path.clone(),
                index,
                value,
                added: true,
            });
        }

        self.stack.extend(children.into_iter().rev());
    }

    /// Compares two nodes, either emitting a record or scheduling children.
    fn compare(&mut self, path: ChangePath, lhs: &'a Value, rhs: &'a Value) -> Option<ChangeRecord> {
        if lhs == rhs {
            return None;
        }

        match (lhs, rhs) {
            (Value::Mapping(l), Value::Mapping(r)) => {
                self.push_mapping(&path, l, r);
                None
            }
            (Value::Sequence(l), Value::Sequence(r)) => {
                self.push_sequence(&path, l, r);
                None
            }
            (Value::Tagged(l), Value::Tagged(r)) if l.tag == r.tag => {
                self.stack.push(Work::Compare {
                    path,
                    lhs: &l.value,
                    rhs: &r.value,
                });
                None
            }
            _ => Some(ChangeRecord::Edited {
                path,
                lhs: lhs.clone(),
                rhs: rhs.clone(),
            }),
        }
    }
}

impl Iterator for TemplateDiff<'_> {
    type Item = ChangeRecord;

    fn next(&mut self) -> Option<Self::Item> {
        while let Some(work) = self.stack.pop() {
            let record = match work {
                Work::Compare { path, lhs, rhs } => self.compare(path, lhs, rhs),
                Work::Added { path, rhs } => Some(ChangeRecord::Added {
                    path,
                    rhs: rhs.clone(),
                }),
                Work::Removed { path, lhs } => Some(ChangeRecord::Removed {
                    path,
                    lhs: lhs.clone(),
                }),
                Work::Element {
                    path,
                    index,
                    value,
                    added,
                } => Some(ChangeRecord::ArrayElement {
                    path,
                    index,
                    change: if added {
                        ElementChange::Added(value.clone())
                    } else {
                        ElementChange::Removed(value.clone())
                    },
                }),
            };

            if record.is_some() {
                return record;
            }
        }
        None
    }
}

impl FusedIterator for TemplateDiff<'_> {}

/// Converts a mapping key into a path token.
fn key_token(key: &Value) -> PathToken {
    match key {
        Value::String(s) => PathToken::Key(s.clone()),
        Value::Number(n) => PathToken::Key(n.to_string()),
        Value::Bool(b) => PathToken::Key(b.to_string()),
        other => PathToken::Key(format!("{other:?}")),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn template(yaml: &str) -> Template {
        Template::from_yaml_str(yaml).expect("test template should parse")
    }

    fn diff(current: &Template, candidate: &Template) -> Vec<ChangeRecord> {
        TemplateDiff::between(current, candidate).collect()
    }

    const BASE: &str = r"
Parameters:
  Stage:
    Type: String
Resources:
  Fn:
    Type: AWS::Serverless::Function
    Properties:
      CodeUri: s3://b/old.zip
      MemorySize: 128
      Layers:
        - !Ref SharedLayer
  Queue:
    Type: AWS::SQS::Queue
";

    #[test]
    fn test_identical_templates_produce_no_records() {
        let current = template(BASE);
        let candidate = template(BASE);
        assert!(diff(&current, &candidate).is_empty());
    }

    #[test]
    fn test_diff_against_self_is_empty() {
        let current = template(BASE);
        assert_eq!(TemplateDiff::between(&current, &current).count(), 0);
    }

    #[test]
    fn test_key_order_does_not_matter() {
        let current = template("Resources:\n  A: {Type: X, Properties: {p: 1, q: 2}}\n");
        let candidate = template("Resources:\n  A: {Properties: {q: 2, p: 1}, Type: X}\n");
        assert!(diff(&current, &candidate).is_empty());
    }

    #[test]
    fn test_scalar_edit_reports_both_sides() {
        let current = template(BASE);
        let candidate = template(&BASE.replace("old.zip", "new.zip"));

        let records = diff(&current, &candidate);
        assert_eq!(records.len(), 1);
        match &records[0] {
            ChangeRecord::Edited { path, lhs, rhs } => {
                assert_eq!(path.to_string(), "Resources.Fn.Properties.CodeUri");
                assert_eq!(lhs.as_str(), Some("s3://b/old.zip"));
                assert_eq!(rhs.as_str(), Some("s3://b/new.zip"));
            }
            other => panic!("expected edit, got {other:?}"),
        }
        assert_eq!(records[0].resource_id(), Some("Fn"));
    }

    #[test]
    fn test_strict_scalar_equality() {
        let current = template("Resources:\n  A: {Type: X, Properties: {Size: 1}}\n");
        let candidate = template("Resources:\n  A: {Type: X, Properties: {Size: '1'}}\n");
        assert_eq!(diff(&current, &candidate).len(), 1);
    }

    #[test]
    fn test_missing_vs_present_is_add_or_remove() {
        let current = template(BASE);
        let candidate = template(
            &BASE
                .replace("      MemorySize: 128\n", "")
                .replace("  Queue:\n    Type: AWS::SQS::Queue\n", "  Topic:\n    Type: AWS::SNS::Topic\n"),
        );

        let records = diff(&current, &candidate);
        let summary: Vec<String> = records.iter().map(ToString::to_string).collect();
        assert_eq!(
            summary,
            vec![
                "- Resources.Fn.Properties.MemorySize",
                "- Resources.Queue",
                "+ Resources.Topic",
            ]
        );
    }

    #[test]
    fn test_records_follow_document_order() {
        let current = template(BASE);
        let candidate = template(
            &BASE
                .replace("Type: String", "Type: Number")
                .replace("old.zip", "new.zip")
                .replace("AWS::SQS::Queue", "AWS::SQS::FifoQueue"),
        );

        let paths: Vec<String> = diff(&current, &candidate)
            .iter()
            .map(|r| r.path().to_string())
            .collect();
        assert_eq!(
            paths,
            vec![
                "Parameters.Stage.Type",
                "Resources.Fn.Properties.CodeUri",
                "Resources.Queue.Type",
            ]
        );
    }

    #[test]
    fn test_sequence_growth_is_array_element_change() {
        let current = template(BASE);
        let candidate = template(&BASE.replace(
            "        - !Ref SharedLayer\n",
            "        - !Ref SharedLayer\n        - !Ref ExtraLayer\n",
        ));

        let records = diff(&current, &candidate);
        assert_eq!(records.len(), 1);
        assert!(matches!(
            &records[0],
            ChangeRecord::ArrayElement { index: 1, change: ElementChange::Added(_), .. }
        ));
    }

    #[test]
    fn test_tagged_values_compare_inside_tag() {
        let current = template(BASE);
        let candidate = template(&BASE.replace("!Ref SharedLayer", "!Ref OtherLayer"));

        let records = diff(&current, &candidate);
        assert_eq!(records.len(), 1);
        assert_eq!(records[0].path().to_string(), "Resources.Fn.Properties.Layers[0]");
    }

    #[test]
    fn test_type_change_is_single_edit() {
        let current = template("Outputs:\n  Url: plain\n");
        let candidate = template("Outputs:\n  Url: {Value: plain}\n");

        let records = diff(&current, &candidate);
        assert_eq!(records.len(), 1);
        assert!(matches!(records[0], ChangeRecord::Edited { .. }));
    }

    #[test]
    fn test_diff_is_lazy() {
        let current = template(BASE);
        let candidate = template(&BASE.replace("Type: String", "Type: Number").replace("128", "256"));

        let mut records = TemplateDiff::between(&current, &candidate);
        let first = records.next().expect("first record");
        assert_eq!(first.path().to_string(), "Parameters.Stage.Type");
        // The resources subtree has not been expanded yet.
        assert_eq!(records.stack.len(), 1);
        assert!(matches!(
            &records.stack[0],
            Work::Compare { path, .. } if path.to_string() == "Resources"
        ));

        let second = records.next().expect("second record");
        assert_eq!(second.path().to_string(), "Resources.Fn.Properties.MemorySize");
        assert!(records.next().is_none());
        assert!(records.next().is_none());
    }
}
