//! `patch_file`: applies a Codex-style patch envelope.
//!
//! Envelope grammar:
//!
//! ```text
//! *** Begin Patch
//! *** Update File: relative/path
//! @@ optional locator
//!  context line
//! -removed line
//! +added line
//! *** Add File: other/path
//! +line 1
//! +line 2
//! *** Delete File: old/path
//! *** End Patch
//! ```
//!
//! Hunk context is matched against the file as a run of consecutive lines
//! compared under whitespace normalization (trim + collapse inner runs), so
//! indentation drift does not defeat a patch. All hunks apply to an
//! in-memory copy and the file is written once: a failing hunk leaves the
//! file untouched.

use async_trait::async_trait;
use serde_json::{Value, json};

use planter_core::schema::ToolSchema;

use crate::errors::ToolError;
use crate::traits::{PlanterTool, ToolContext, ToolOutcome};
use crate::utils::schema::SchemaBuilder;

/// One file operation parsed from the envelope.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum PatchOp {
    /// Create a file with the given lines.
    Add {
        /// Target path.
        path: String,
        /// File lines.
        lines: Vec<String>,
    },
    /// Delete a file.
    Delete {
        /// Target path.
        path: String,
    },
    /// Apply hunks to an existing file.
    Update {
        /// Target path.
        path: String,
        /// Hunks in order.
        hunks: Vec<Hunk>,
    },
}

impl PatchOp {
    /// The path this op touches.
    #[must_use]
    pub fn path(&self) -> &str {
        match self {
            Self::Add { path, .. } | Self::Delete { path } | Self::Update { path, .. } => path,
        }
    }
}

/// One `@@` hunk of an update.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct Hunk {
    /// Optional locator text after `@@` narrowing the search start.
    pub locator: Option<String>,
    /// Lines: `(kind, text)` where kind is ' ', '-', or '+'.
    pub lines: Vec<(char, String)>,
}

/// Collapse whitespace for drift-tolerant matching.
fn normalize_ws(s: &str) -> String {
    s.split_whitespace().collect::<Vec<_>>().join(" ")
}

/// Parse a full envelope into file ops.
pub fn parse_envelope(patch: &str) -> Result<Vec<PatchOp>, ToolError> {
    let mut lines = patch.lines().peekable();
    match lines.next().map(str::trim) {
        Some("*** Begin Patch") => {}
        _ => {
            return Err(ToolError::invalid(
                "patch must start with '*** Begin Patch'",
            ));
        }
    }

    let mut ops = Vec::new();
    while let Some(line) = lines.next() {
        let trimmed = line.trim_end();
        if trimmed.trim() == "*** End Patch" {
            if ops.is_empty() {
                return Err(ToolError::invalid("patch contains no file operations"));
            }
            return Ok(ops);
        }
        if let Some(path) = trimmed.strip_prefix("*** Add File: ") {
            let mut content = Vec::new();
            while let Some(next) = lines.peek() {
                if next.starts_with("*** ") {
                    break;
                }
                let body = lines.next().unwrap_or_default();
                content.push(body.strip_prefix('+').unwrap_or(body).to_owned());
            }
            ops.push(PatchOp::Add {
                path: path.trim().to_owned(),
                lines: content,
            });
        } else if let Some(path) = trimmed.strip_prefix("*** Delete File: ") {
            ops.push(PatchOp::Delete {
                path: path.trim().to_owned(),
            });
        } else if let Some(path) = trimmed.strip_prefix("*** Update File: ") {
            let mut hunks = Vec::new();
            let mut current: Option<Hunk> = None;
            while let Some(next) = lines.peek() {
                if next.starts_with("*** ") {
                    break;
                }
                let body = lines.next().unwrap_or_default();
                if let Some(locator) = body.strip_prefix("@@") {
                    if let Some(hunk) = current.take() {
                        hunks.push(hunk);
                    }
                    let locator = locator.trim();
                    current = Some(Hunk {
                        locator: if locator.is_empty() {
                            None
                        } else {
                            Some(locator.to_owned())
                        },
                        lines: Vec::new(),
                    });
                } else {
                    let hunk = current.get_or_insert_with(Hunk::default);
                    let (kind, text) = match body.chars().next() {
                        Some('+') => ('+', &body[1..]),
                        Some('-') => ('-', &body[1..]),
                        Some(' ') => (' ', &body[1..]),
                        None => (' ', ""),
                        _ => {
                            return Err(ToolError::invalid(format!(
                                "hunk line must start with ' ', '+' or '-': {body:?}"
                            )));
                        }
                    };
                    hunk.lines.push((kind, text.to_owned()));
                }
            }
            if let Some(hunk) = current.take() {
                hunks.push(hunk);
            }
            if hunks.is_empty() {
                return Err(ToolError::invalid(format!(
                    "update for {path} contains no hunks"
                )));
            }
            ops.push(PatchOp::Update {
                path: path.trim().to_owned(),
                hunks,
            });
        } else if !trimmed.trim().is_empty() {
            return Err(ToolError::invalid(format!(
                "unexpected line in patch envelope: {trimmed:?}"
            )));
        }
    }
    Err(ToolError::invalid("patch is missing '*** End Patch'"))
}

/// Apply hunks to file content, returning the new content.
pub fn apply_hunks(content: &str, hunks: &[Hunk]) -> Result<String, ToolError> {
    let mut lines: Vec<String> = content.lines().map(str::to_owned).collect();
    let mut search_from = 0usize;

    for (hunk_no, hunk) in hunks.iter().enumerate() {
        // The locator narrows where matching starts.
        if let Some(locator) = &hunk.locator {
            let normalized = normalize_ws(locator);
            if let Some(at) = lines[search_from.min(lines.len())..]
                .iter()
                .position(|l| normalize_ws(l).contains(&normalized))
            {
                search_from += at;
            }
        }

        let old: Vec<&(char, String)> =
            hunk.lines.iter().filter(|(k, _)| *k != '+').collect();
        let replacement: Vec<String> = hunk
            .lines
            .iter()
            .filter(|(k, _)| *k != '-')
            .map(|(_, t)| t.clone())
            .collect();

        if old.is_empty() {
            // Pure insertion: append at the search position.
            let at = search_from.min(lines.len());
            let tail = lines.split_off(at);
            lines.extend(replacement);
            lines.extend(tail);
            continue;
        }

        let at = find_run(&lines, search_from, &old).ok_or_else(|| {
            ToolError::invalid(format!(
                "hunk {} does not match the file (context drifted?)",
                hunk_no + 1
            ))
        })?;

        // Splice: keep context lines as patched, drop removed ones.
        let tail = lines.split_off(at + old.len());
        lines.truncate(at);
        let inserted = replacement.len();
        lines.extend(replacement);
        lines.extend(tail);
        search_from = at + inserted;
    }

    let mut out = lines.join("\n");
    if content.ends_with('\n') {
        out.push('\n');
    }
    Ok(out)
}

/// Find the first run of `old` lines at or after `from`, comparing under
/// whitespace normalization.
fn find_run(lines: &[String], from: usize, old: &[&(char, String)]) -> Option<usize> {
    if old.is_empty() || lines.len() < old.len() {
        return None;
    }
    (from..=lines.len() - old.len()).find(|&start| {
        old.iter()
            .enumerate()
            .all(|(i, (_, text))| normalize_ws(&lines[start + i]) == normalize_ws(text))
    })
}

/// Apply a Codex-style patch to a single file.
pub struct PatchFileTool;

#[async_trait]
impl PlanterTool for PatchFileTool {
    fn name(&self) -> &str {
        "patch_file"
    }

    fn definition(&self) -> ToolSchema {
        SchemaBuilder::new(
            "patch_file",
            "Apply a patch to a file. The patch uses the '*** Begin Patch' envelope with \
             Add/Update/Delete operations and @@ hunks; context lines are matched \
             whitespace-insensitively. The patch applies atomically or not at all.",
        )
        .required("path", json!({"type": "string", "description": "The file the patch targets"}))
        .required("patch", json!({"type": "string", "description": "The patch envelope"}))
        .build()
    }

    async fn execute(&self, args: Value, ctx: &ToolContext) -> Result<ToolOutcome, ToolError> {
        let raw_path = args
            .get("path")
            .and_then(Value::as_str)
            .ok_or_else(|| ToolError::invalid("missing required parameter: path"))?;
        let patch_text = args
            .get("patch")
            .and_then(Value::as_str)
            .ok_or_else(|| ToolError::invalid("missing required parameter: patch"))?;

        let ops = if patch_text.trim_start().starts_with("*** Begin Patch") {
            parse_envelope(patch_text)?
        } else {
            // Bare hunk text: treat as an update of the named file.
            let envelope = format!(
                "*** Begin Patch\n*** Update File: {raw_path}\n{patch_text}\n*** End Patch"
            );
            parse_envelope(&envelope)?
        };

        let op = ops
            .iter()
            .find(|op| op.path() == raw_path)
            .ok_or_else(|| {
                ToolError::invalid(format!("patch contains no operation for {raw_path}"))
            })?;
        let path = ctx.workspace.confine(op.path())?;

        match op {
            PatchOp::Add { lines, .. } => {
                // Claim first so a racing sibling reports write_conflict.
                ctx.write_guard.claim(&path, &ctx.claimant)?;
                if path.exists() {
                    return Err(ToolError::invalid(format!(
                        "cannot add {raw_path}: file already exists"
                    )));
                }
                if let Some(parent) = path.parent() {
                    tokio::fs::create_dir_all(parent).await?;
                }
                let mut content = lines.join("\n");
                content.push('\n');
                tokio::fs::write(&path, content).await?;
                Ok(ToolOutcome::observation(format!(
                    "added {raw_path} ({} lines)",
                    lines.len()
                )))
            }
            PatchOp::Delete { .. } => {
                tokio::fs::remove_file(&path).await.map_err(|e| {
                    ToolError::internal(format!("cannot delete {raw_path}: {e}"))
                })?;
                Ok(ToolOutcome::observation(format!("deleted {raw_path}")))
            }
            PatchOp::Update { hunks, .. } => {
                ctx.write_guard.claim(&path, &ctx.claimant)?;
                let content = tokio::fs::read_to_string(&path).await.map_err(|e| {
                    ToolError::internal(format!("cannot read {raw_path}: {e}"))
                })?;
                let patched = apply_hunks(&content, hunks)?;
                tokio::fs::write(&path, patched).await?;
                Ok(ToolOutcome::observation(format!(
                    "patched {raw_path} ({} hunks)",
                    hunks.len()
                )))
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testutil::{test_context, write_fixture};

    // ── Envelope parsing ────────────────────────────────────────────────

    #[test]
    fn parses_all_three_op_kinds() {
        let ops = parse_envelope(
            "*** Begin Patch\n\
             *** Add File: new.txt\n\
             +line one\n\
             *** Delete File: gone.txt\n\
             *** Update File: src/lib.rs\n\
             @@ fn main\n\
             -    old();\n\
             +    new();\n\
             *** End Patch",
        )
        .unwrap();
        assert_eq!(ops.len(), 3);
        assert_eq!(ops[0].path(), "new.txt");
        assert!(matches!(&ops[1], PatchOp::Delete { .. }));
        let PatchOp::Update { hunks, .. } = &ops[2] else {
            panic!()
        };
        assert_eq!(hunks[0].locator.as_deref(), Some("fn main"));
    }

    #[test]
    fn rejects_missing_markers() {
        assert!(parse_envelope("not a patch").is_err());
        assert!(parse_envelope("*** Begin Patch\n*** Update File: x\n x\n").is_err());
    }

    #[test]
    fn rejects_garbage_hunk_lines() {
        let err = parse_envelope(
            "*** Begin Patch\n*** Update File: x\n@@\nbad line\n*** End Patch",
        )
        .unwrap_err();
        assert_eq!(err.kind(), "tool_argument");
    }

    // ── Hunk application ────────────────────────────────────────────────

    #[test]
    fn replaces_matched_run() {
        let content = "alpha\nbeta\ngamma\n";
        let hunks = vec![Hunk {
            locator: None,
            lines: vec![
                (' ', "alpha".into()),
                ('-', "beta".into()),
                ('+', "BETA".into()),
                (' ', "gamma".into()),
            ],
        }];
        assert_eq!(apply_hunks(content, &hunks).unwrap(), "alpha\nBETA\ngamma\n");
    }

    #[test]
    fn whitespace_drift_tolerated() {
        // File is tab-indented; the hunk came from a space-indented copy.
        let content = "fn main() {\n\t\tdo_work();\n}\n";
        let hunks = vec![Hunk {
            locator: None,
            lines: vec![
                ('-', "  do_work();".into()),
                ('+', "    do_better();".into()),
            ],
        }];
        let out = apply_hunks(content, &hunks).unwrap();
        assert!(out.contains("do_better();"));
        assert!(!out.contains("do_work"));
    }

    #[test]
    fn locator_narrows_match() {
        let content = "fn a() {\n    x();\n}\nfn b() {\n    x();\n}\n";
        let hunks = vec![Hunk {
            locator: Some("fn b".into()),
            lines: vec![('-', "x();".into()), ('+', "y();".into())],
        }];
        let out = apply_hunks(content, &hunks).unwrap();
        // Only the occurrence inside fn b changes.
        assert_eq!(out.matches("x();").count(), 1);
        assert!(out.find("y();").unwrap() > out.find("fn b").unwrap());
    }

    #[test]
    fn unmatched_hunk_fails() {
        let hunks = vec![Hunk {
            locator: None,
            lines: vec![('-', "never present".into())],
        }];
        assert!(apply_hunks("line\n", &hunks).is_err());
    }

    #[test]
    fn sequential_hunks_advance_position() {
        let content = "one\ntwo\nthree\nfour\n";
        let hunks = vec![
            Hunk {
                locator: None,
                lines: vec![('-', "one".into()), ('+', "ONE".into())],
            },
            Hunk {
                locator: None,
                lines: vec![('-', "three".into()), ('+', "THREE".into())],
            },
        ];
        assert_eq!(
            apply_hunks(content, &hunks).unwrap(),
            "ONE\ntwo\nTHREE\nfour\n"
        );
    }

    // ── Tool behavior ───────────────────────────────────────────────────

    #[tokio::test]
    async fn update_applies_atomically() {
        let (ctx, dir) = test_context();
        write_fixture(dir.path(), "src/lib.rs", "fn old() {}\nfn keep() {}\n");
        let patch = "*** Begin Patch\n\
                     *** Update File: src/lib.rs\n\
                     @@\n\
                     -fn old() {}\n\
                     +fn new() {}\n\
                     *** End Patch";
        let outcome = PatchFileTool
            .execute(json!({"path": "src/lib.rs", "patch": patch}), &ctx)
            .await
            .unwrap();
        assert!(outcome.observation.contains("patched"));
        let content = std::fs::read_to_string(dir.path().join("src/lib.rs")).unwrap();
        assert!(content.contains("fn new()"));
        assert!(content.contains("fn keep()"));
    }

    #[tokio::test]
    async fn failing_hunk_leaves_file_untouched() {
        let (ctx, dir) = test_context();
        write_fixture(dir.path(), "a.txt", "original\n");
        let patch = "*** Begin Patch\n\
                     *** Update File: a.txt\n\
                     @@\n\
                     -no such line\n\
                     +replacement\n\
                     *** End Patch";
        let err = PatchFileTool
            .execute(json!({"path": "a.txt", "patch": patch}), &ctx)
            .await
            .unwrap_err();
        assert_eq!(err.kind(), "tool_argument");
        assert_eq!(
            std::fs::read_to_string(dir.path().join("a.txt")).unwrap(),
            "original\n"
        );
    }

    #[tokio::test]
    async fn add_and_delete_ops() {
        let (ctx, dir) = test_context();
        write_fixture(dir.path(), "old.txt", "bye\n");
        let add = "*** Begin Patch\n*** Add File: fresh.txt\n+hello\n*** End Patch";
        let _ = PatchFileTool
            .execute(json!({"path": "fresh.txt", "patch": add}), &ctx)
            .await
            .unwrap();
        assert_eq!(
            std::fs::read_to_string(dir.path().join("fresh.txt")).unwrap(),
            "hello\n"
        );

        let delete = "*** Begin Patch\n*** Delete File: old.txt\n*** End Patch";
        let _ = PatchFileTool
            .execute(json!({"path": "old.txt", "patch": delete}), &ctx)
            .await
            .unwrap();
        assert!(!dir.path().join("old.txt").exists());
    }

    #[tokio::test]
    async fn bare_hunk_treated_as_update() {
        let (ctx, dir) = test_context();
        write_fixture(dir.path(), "b.txt", "aaa\nbbb\n");
        let outcome = PatchFileTool
            .execute(json!({"path": "b.txt", "patch": "-aaa\n+AAA"}), &ctx)
            .await
            .unwrap();
        assert!(outcome.observation.contains("patched"));
        assert_eq!(
            std::fs::read_to_string(dir.path().join("b.txt")).unwrap(),
            "AAA\nbbb\n"
        );
    }

    #[tokio::test]
    async fn path_must_match_an_op() {
        let (ctx, _dir) = test_context();
        let patch = "*** Begin Patch\n*** Add File: other.txt\n+x\n*** End Patch";
        let err = PatchFileTool
            .execute(json!({"path": "mine.txt", "patch": patch}), &ctx)
            .await
            .unwrap_err();
        assert_eq!(err.kind(), "tool_argument");
    }
}
