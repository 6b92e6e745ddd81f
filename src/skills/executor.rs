//! Skill execution.
//!
//! Dispatches one (skill, action, args) invocation to either a discovered
//! script or a shell command synthesized from the manifest body, under a
//! timeout, in the skill's directory, with an isolated environment. The
//! strategy is chosen once per invocation as a two-variant enum, not
//! re-derived mid-flight.
//!
//! Command synthesis is best-effort text mining with fixed precedence:
//! fenced code blocks whose text or nearest heading matches the action
//! (or a synonym), then unfenced lines starting with a known command
//! prefix. When nothing relevant is found the invocation degrades to an
//! inert `echo` of the action name and still reports success; callers
//! can detect the echo from the content.

use std::collections::HashMap;
use std::process::Stdio;
use std::time::Duration;

use lazy_static::lazy_static;
use regex::Regex;
use serde_json::Value;
use tokio::io::AsyncWriteExt;
use tokio::process::Command;

use super::skill::{Skill, SkillScript};
use crate::tools::tool::ToolResult;

/// Default wall-clock bound for one skill invocation.
pub const DEFAULT_EXEC_TIMEOUT: Duration = Duration::from_secs(30);

/// Environment variable carrying the invoked skill's name.
pub const ENV_SKILL_NAME: &str = "SKILLHOST_SKILL_NAME";
/// Environment variable carrying the invoked skill's directory.
pub const ENV_SKILL_DIR: &str = "SKILLHOST_SKILL_DIR";

/// Command prefixes recognized when scanning unfenced manifest lines.
const COMMAND_PREFIXES: &[&str] = &[
    "curl", "http", "python", "python3", "node", "bash", "sh", "jq", "git", "gh", "aws",
    "ffmpeg", "osascript",
];

// ---------------------------------------------------------------------------
// Strategy
// ---------------------------------------------------------------------------

/// How an action will be executed, chosen once per invocation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ExecutionStrategy {
    /// Run a discovered script.
    Script(SkillScript),
    /// Run a shell command synthesized from the manifest body.
    Synthesized(String),
}

/// Pick the execution strategy for an action.
///
/// Scripts win when any exist: exact name match, then substring match,
/// then a sole script as the default. A skill with scripts but no match
/// is a dispatch failure rather than falling back to synthesis.
pub fn choose_strategy(skill: &Skill, action: &str) -> Result<ExecutionStrategy, String> {
    if skill.scripts.is_empty() {
        return Ok(ExecutionStrategy::Synthesized(synthesize_command(
            skill, action,
        )));
    }

    let action_lower = action.to_lowercase();

    if let Some(script) = skill
        .scripts
        .iter()
        .find(|s| s.name.to_lowercase() == action_lower)
    {
        return Ok(ExecutionStrategy::Script(script.clone()));
    }

    if let Some(script) = skill.scripts.iter().find(|s| {
        let name = s.name.to_lowercase();
        name.contains(&action_lower) || action_lower.contains(&name)
    }) {
        return Ok(ExecutionStrategy::Script(script.clone()));
    }

    if skill.scripts.len() == 1 {
        return Ok(ExecutionStrategy::Script(skill.scripts[0].clone()));
    }

    Err(format!("no script found for action '{}'", action))
}

// ---------------------------------------------------------------------------
// Command synthesis
// ---------------------------------------------------------------------------

lazy_static! {
    /// A `secrets.sh` path mentioned anywhere in the body.
    static ref SECRETS_PATH: Regex =
        Regex::new(r"([~$A-Za-z0-9_./-]*secrets\.sh)").expect("secrets regex");
    /// Literal export lines to forward verbatim.
    static ref EXPORT_LINE: Regex =
        Regex::new(r"(?m)^\s*(export\s+[A-Za-z_][A-Za-z0-9_]*=\S.*)$").expect("export regex");
}

lazy_static! {
    /// Synonyms consulted when matching body text against an action.
    static ref ACTION_SYNONYMS: HashMap<&'static str, &'static [&'static str]> = {
        let mut m: HashMap<&'static str, &'static [&'static str]> = HashMap::new();
        m.insert("search", &["query", "find", "lookup"]);
        m.insert("current", &["now", "today", "conditions"]);
        m.insert("forecast", &["weather", "outlook", "tomorrow"]);
        m.insert("send", &["post", "message", "notify"]);
        m.insert("list", &["show", "all", "enumerate"]);
        m.insert("status", &["health", "state", "ping"]);
        m.insert("read", &["cat", "view", "open"]);
        m.insert("get", &["fetch", "retrieve"]);
        m
    };
}

/// Build the shell command for an action from the manifest body.
pub fn synthesize_command(skill: &Skill, action: &str) -> String {
    let body = &skill.body;
    let mut parts: Vec<String> = Vec::new();

    if let Some(cap) = SECRETS_PATH.captures(body) {
        parts.push(format!("source {}", &cap[1]));
    }

    for cap in EXPORT_LINE.captures_iter(body) {
        parts.push(cap[1].trim().to_string());
    }

    let command = find_relevant_command(body, action)
        .unwrap_or_else(|| format!("echo '{}'", action));
    parts.push(command);

    parts.join("\n")
}

/// Whether a chunk of text is relevant to the action (keyword or
/// synonym match, case-insensitive).
fn matches_action(text: &str, action: &str) -> bool {
    let text = text.to_lowercase();
    let action = action.to_lowercase();
    if text.contains(&action) {
        return true;
    }
    ACTION_SYNONYMS
        .get(action.as_str())
        .map(|syns| syns.iter().any(|s| text.contains(s)))
        .unwrap_or(false)
}

/// Scan the body for a command relevant to the action: fenced code
/// blocks first, then unfenced known-prefix lines. Chosen commands
/// extend across indented continuation lines.
fn find_relevant_command(body: &str, action: &str) -> Option<String> {
    let lines: Vec<&str> = body.lines().collect();

    // Pass 1: fenced code blocks, matched against block text or the
    // nearest preceding heading.
    let mut heading = "";
    let mut i = 0;
    while i < lines.len() {
        let line = lines[i];
        if line.trim_start().starts_with('#') {
            heading = line;
            i += 1;
            continue;
        }
        if line.trim_start().starts_with("```") {
            let start = i + 1;
            let mut end = start;
            while end < lines.len() && !lines[end].trim_start().starts_with("```") {
                end += 1;
            }
            let block = &lines[start..end];
            let block_text = block.join("\n");
            if matches_action(&block_text, action) || matches_action(heading, action) {
                if let Some(command) = first_command_in(block) {
                    return Some(command);
                }
            }
            i = end + 1;
            continue;
        }
        i += 1;
    }

    // Pass 2: unfenced lines starting with a known command prefix.
    // Relevant lines win over the first prefix line found.
    let mut fallback: Option<String> = None;
    let mut in_fence = false;
    for (idx, line) in lines.iter().enumerate() {
        if line.trim_start().starts_with("```") {
            in_fence = !in_fence;
            continue;
        }
        if in_fence || !has_command_prefix(line) {
            continue;
        }
        let command = extend_continuations(&lines, idx);
        if matches_action(line, action) {
            return Some(command);
        }
        if fallback.is_none() {
            fallback = Some(command);
        }
    }
    fallback
}

/// First usable command line inside a fenced block, with continuations.
fn first_command_in(block: &[&str]) -> Option<String> {
    for (idx, line) in block.iter().enumerate() {
        let trimmed = line.trim();
        if trimmed.is_empty()
            || trimmed.starts_with('#')
            || trimmed.starts_with("export ")
            || trimmed.starts_with("source ")
        {
            continue;
        }
        // Skip continuation lines; they get picked up with their head.
        if line.starts_with(char::is_whitespace) && idx > 0 {
            continue;
        }
        return Some(extend_continuations(block, idx));
    }
    None
}

fn has_command_prefix(line: &str) -> bool {
    let trimmed = line.trim_start();
    COMMAND_PREFIXES.iter().any(|p| {
        trimmed.starts_with(p)
            && trimmed[p.len()..]
                .chars()
                .next()
                .map(|c| c.is_whitespace())
                .unwrap_or(true)
    })
}

/// A command plus any indented continuation lines that follow it.
fn extend_continuations(lines: &[&str], start: usize) -> String {
    let mut command = lines[start].trim().to_string();
    let mut i = start + 1;
    while i < lines.len() {
        let line = lines[i];
        let continues = !line.trim().is_empty()
            && line.starts_with(char::is_whitespace)
            && !line.trim_start().starts_with("```");
        if !continues {
            break;
        }
        command.push('\n');
        command.push_str(line.trim_end());
        i += 1;
    }
    command
}

// ---------------------------------------------------------------------------
// SkillExecutor
// ---------------------------------------------------------------------------

/// Executes skill actions under a timeout with an isolated environment.
#[derive(Debug, Clone)]
pub struct SkillExecutor {
    timeout: Duration,
}

impl Default for SkillExecutor {
    fn default() -> Self {
        Self {
            timeout: DEFAULT_EXEC_TIMEOUT,
        }
    }
}

impl SkillExecutor {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_timeout(timeout: Duration) -> Self {
        Self { timeout }
    }

    /// Execute one action. Failures come back as failed results, never
    /// as panics or process faults; a timeout is reported distinctly
    /// from a non-zero exit.
    pub async fn execute(
        &self,
        skill: &Skill,
        action: &str,
        args: &HashMap<String, Value>,
    ) -> ToolResult {
        let strategy = match choose_strategy(skill, action) {
            Ok(strategy) => strategy,
            Err(reason) => return ToolResult::fail(reason),
        };

        let mut command = match &strategy {
            ExecutionStrategy::Script(script) => {
                log::debug!(
                    "skill '{}' action '{}' -> script {}",
                    skill.name,
                    action,
                    script.path.display()
                );
                let mut cmd = Command::new(script.interpreter.program());
                cmd.arg(skill.script_path(script));
                cmd
            }
            ExecutionStrategy::Synthesized(shell) => {
                log::debug!(
                    "skill '{}' action '{}' -> synthesized command",
                    skill.name,
                    action
                );
                let mut cmd = Command::new("bash");
                cmd.arg("-c").arg(shell);
                cmd
            }
        };

        command
            .current_dir(&skill.dir)
            .envs(&skill.env)
            .env(ENV_SKILL_NAME, &skill.name)
            .env(ENV_SKILL_DIR, &skill.dir)
            .stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true);

        let mut child = match command.spawn() {
            Ok(child) => child,
            Err(e) => {
                return ToolResult::fail(format!(
                    "failed to start skill '{}' action '{}': {}",
                    skill.name, action, e
                ))
            }
        };

        // Arguments travel as JSON on stdin when non-empty.
        if let Some(mut stdin) = child.stdin.take() {
            if !args.is_empty() {
                let payload = serde_json::to_vec(args).unwrap_or_default();
                if let Err(e) = stdin.write_all(&payload).await {
                    log::debug!("could not write args to skill stdin: {}", e);
                }
            }
            drop(stdin);
        }

        let output = match tokio::time::timeout(self.timeout, child.wait_with_output()).await {
            Ok(Ok(output)) => output,
            Ok(Err(e)) => {
                return ToolResult::fail(format!(
                    "skill '{}' action '{}' failed: {}",
                    skill.name, action, e
                ))
            }
            // Dropping the timed-out future kills the child (kill_on_drop).
            Err(_) => {
                return ToolResult::fail(format!(
                    "skill '{}' action '{}' timed out after {}s",
                    skill.name,
                    action,
                    self.timeout.as_secs()
                ))
            }
        };

        let mut combined = String::from_utf8_lossy(&output.stdout).into_owned();
        let stderr = String::from_utf8_lossy(&output.stderr);
        if !stderr.trim().is_empty() {
            if !combined.is_empty() {
                combined.push('\n');
            }
            combined.push_str(stderr.trim_end());
        }
        let combined = combined.trim().to_string();

        if !output.status.success() {
            return ToolResult::fail(format!(
                "skill '{}' action '{}' exited with {}: {}",
                skill.name, action, output.status, combined
            ));
        }

        let content = if combined.is_empty() {
            "(no output)".to_string()
        } else {
            combined.clone()
        };

        // Structured output is opportunistic; plain text is equally valid.
        match serde_json::from_str::<Value>(&combined) {
            Ok(data) if data.is_object() || data.is_array() => {
                ToolResult::ok_with_data(content, data)
            }
            _ => ToolResult::ok(content),
        }
    }
}
