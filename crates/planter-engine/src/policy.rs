//! Runtime policy screening, applied before dispatch.
//!
//! Violations never reach the tool: the dispatcher synthesizes an error
//! result explaining the rejection so the model can adjust.

use std::collections::HashMap;
use std::sync::LazyLock;

use regex::Regex;

use planter_core::config::EngineConfig;
use planter_tools::ToolError;

/// Heredoc openers (`<< TOKEN`, `<<-TOKEN`, quoted forms) and herestrings.
static HEREDOC: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r#"<<-?\s*["']?\w"#).expect("static regex"));

/// Per-depth tracker of identical shell commands.
#[derive(Debug, Default)]
pub struct RepetitionTracker {
    counts: HashMap<String, u32>,
}

impl RepetitionTracker {
    /// Empty tracker.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Record one invocation and return how many times the exact command
    /// has now been issued.
    pub fn record(&mut self, command: &str) -> u32 {
        let count = self.counts.entry(command.to_owned()).or_insert(0);
        *count += 1;
        *count
    }
}

/// Screen a shell command against the policy. Returns the rejection when
/// the command must not run.
pub fn check_shell_command(
    config: &EngineConfig,
    command: &str,
    repetitions: &mut RepetitionTracker,
) -> Result<(), ToolError> {
    if config.shell_heredoc_forbidden && (HEREDOC.is_match(command) || command.contains("<<<")) {
        return Err(ToolError::ShellPolicy {
            message: "heredoc syntax is not allowed; write the content with write_file instead"
                .into(),
        });
    }

    for word in command.split(|c: char| c.is_whitespace() || "|;&()".contains(c)) {
        let basename = word.rsplit('/').next().unwrap_or(word);
        if !basename.is_empty() && config.shell_bans.contains(basename) {
            return Err(ToolError::ShellPolicy {
                message: format!("'{basename}' is banned (interactive or unbounded program)"),
            });
        }
    }

    if repetitions.record(command) > config.repetition_limit {
        return Err(ToolError::RepetitionLimit {
            command: command.to_owned(),
        });
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use assert_matches::assert_matches;

    fn config() -> EngineConfig {
        EngineConfig::default()
    }

    #[test]
    fn heredoc_rejected() {
        let mut reps = RepetitionTracker::new();
        assert_matches!(
            check_shell_command(&config(), "cat <<EOF\nx\nEOF", &mut reps),
            Err(ToolError::ShellPolicy { .. })
        );
        assert_matches!(
            check_shell_command(&config(), "cat << 'END'", &mut reps),
            Err(ToolError::ShellPolicy { .. })
        );
        assert_matches!(
            check_shell_command(&config(), "cat <<- TAB", &mut reps),
            Err(ToolError::ShellPolicy { .. })
        );
        assert_matches!(
            check_shell_command(&config(), "bc <<< '1+2'", &mut reps),
            Err(ToolError::ShellPolicy { .. })
        );
    }

    #[test]
    fn heredoc_allowed_when_flag_off() {
        let mut cfg = config();
        cfg.shell_heredoc_forbidden = false;
        let mut reps = RepetitionTracker::new();
        check_shell_command(&cfg, "cat <<EOF", &mut reps).unwrap();
    }

    #[test]
    fn redirection_is_not_a_heredoc() {
        let mut reps = RepetitionTracker::new();
        check_shell_command(&config(), "echo hi > out.txt 2> err.txt", &mut reps).unwrap();
        check_shell_command(&config(), "sort < input.txt", &mut reps).unwrap();
    }

    #[test]
    fn banned_program_rejected_anywhere_in_pipeline() {
        let mut reps = RepetitionTracker::new();
        assert_matches!(
            check_shell_command(&config(), "vim notes.txt", &mut reps),
            Err(ToolError::ShellPolicy { .. })
        );
        assert_matches!(
            check_shell_command(&config(), "cat log | less", &mut reps),
            Err(ToolError::ShellPolicy { .. })
        );
        assert_matches!(
            check_shell_command(&config(), "/usr/bin/top -b", &mut reps),
            Err(ToolError::ShellPolicy { .. })
        );
    }

    #[test]
    fn banned_substring_inside_word_is_fine() {
        let mut reps = RepetitionTracker::new();
        // "topic" contains "top" but is not the banned basename.
        check_shell_command(&config(), "grep topic notes.txt", &mut reps).unwrap();
    }

    #[test]
    fn third_identical_command_rejected() {
        let mut reps = RepetitionTracker::new();
        check_shell_command(&config(), "ls -la", &mut reps).unwrap();
        check_shell_command(&config(), "ls -la", &mut reps).unwrap();
        assert_matches!(
            check_shell_command(&config(), "ls -la", &mut reps),
            Err(ToolError::RepetitionLimit { .. })
        );
        // A different command still passes.
        check_shell_command(&config(), "ls -l", &mut reps).unwrap();
    }

    #[test]
    fn repetition_tracked_per_tracker_instance() {
        let mut depth0 = RepetitionTracker::new();
        let mut depth1 = RepetitionTracker::new();
        for _ in 0..2 {
            check_shell_command(&config(), "pwd", &mut depth0).unwrap();
            check_shell_command(&config(), "pwd", &mut depth1).unwrap();
        }
        assert!(check_shell_command(&config(), "pwd", &mut depth0).is_err());
        assert!(check_shell_command(&config(), "pwd", &mut depth1).is_err());
    }
}
