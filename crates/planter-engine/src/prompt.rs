//! Deterministic system-prompt assembly.
//!
//! The prompt *texts* come from the embedder via [`PromptPack`]; the engine
//! owns only the assembly order: base, then the recursive, acceptance, and
//! demo sections when the matching configuration flags are set.

use planter_core::config::EngineConfig;

/// The injectable prompt sections.
#[derive(Clone, Debug)]
pub struct PromptPack {
    /// Always included.
    pub base: String,
    /// Included when `recursive_mode` is on.
    pub recursive: String,
    /// Included when `acceptance_criteria_mode` is on.
    pub acceptance: String,
    /// Included when `demo_mode` is on.
    pub demo: String,
    /// System prompt for the acceptance judge (used alone, not assembled).
    pub judge: String,
}

impl Default for PromptPack {
    fn default() -> Self {
        Self {
            base: "You are an autonomous investigation agent working in a sandboxed \
                   workspace. Use the available tools to inspect data, run commands, and \
                   gather evidence. Ground every claim in observations. When you are done, \
                   call finish with your answer."
                .into(),
            recursive: "You may delegate with subtask (named model at your tier or cheaper) \
                        and execute (cheapest leaf executor). Delegate mechanical work; keep \
                        synthesis for yourself."
                .into(),
            acceptance: "Sub-agent results are judged against acceptance criteria when you \
                         provide them. Write criteria as a short verifiable checklist."
                .into(),
            demo: "Demo session: keep output concise and avoid quoting raw personal data."
                .into(),
            judge: "You judge whether a result satisfies the given acceptance criteria. \
                    Reply with exactly PASS or FAIL on the first line, then one sentence of \
                    justification."
                .into(),
        }
    }
}

/// Assemble the system prompt for a configuration. Deterministic: equal
/// configs and packs produce byte-equal prompts.
#[must_use]
pub fn assemble(pack: &PromptPack, config: &EngineConfig) -> String {
    let mut sections = vec![pack.base.as_str()];
    if config.recursive_mode {
        sections.push(pack.recursive.as_str());
    }
    if config.acceptance_criteria_mode {
        sections.push(pack.acceptance.as_str());
    }
    if config.demo_mode {
        sections.push(pack.demo.as_str());
    }
    sections.join("\n\n")
}
