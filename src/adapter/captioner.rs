//! Screenshot captioning through an external command.

use super::template::{TemplateVars, render_argv};
use crate::error::{GuiAgentError, Result};
use crate::process::{SubprocessRegistry, run_tracked};
use anyhow::{Context, bail};
use serde_json::json;
use std::process::Command;
use std::sync::Arc;

pub trait Captioner: Send + Sync {
    /// Describe what `screenshot_b64` shows in the context of `task`.
    fn caption(&self, task: &str, screenshot_b64: &str) -> anyhow::Result<String>;
}

/// Runs `output.caption_command` with `{"task", "screenshot_b64"}` on stdin
/// and uses its trimmed stdout as the caption.
pub struct CommandCaptioner {
    argv: Vec<String>,
    registry: Arc<SubprocessRegistry>,
}

impl CommandCaptioner {
    pub fn new(template: &str, registry: Arc<SubprocessRegistry>) -> Result<Self> {
        let argv = render_argv(template, &TemplateVars::new())
            .map_err(|e| GuiAgentError::Config(format!("invalid output.caption_command: {}", e)))?;
        Ok(Self { argv, registry })
    }
}

impl Captioner for CommandCaptioner {
    fn caption(&self, task: &str, screenshot_b64: &str) -> anyhow::Result<String> {
        let input = serde_json::to_vec(&json!({
            "task": task,
            "screenshot_b64": screenshot_b64,
        }))?;

        let mut command = Command::new(&self.argv[0]);
        command.args(&self.argv[1..]);
        let output = run_tracked(&self.registry, command, Some(input))
            .context("caption command")?;
        if !output.success() {
            bail!(
                "caption command '{}' exited with {}: {}",
                self.argv[0],
                output.status,
                output.stderr_text()
            );
        }

        let caption = output.stdout_text().trim().to_string();
        if caption.is_empty() {
            bail!("caption command '{}' produced no output", self.argv[0]);
        }
        Ok(caption)
    }
}

#[cfg(all(test, unix))]
mod tests {
    use super::*;

    fn captioner(template: &str) -> CommandCaptioner {
        CommandCaptioner::new(template, Arc::new(SubprocessRegistry::new())).unwrap()
    }

    #[test]
    fn caption_is_trimmed_stdout() {
        let c = captioner("sh -c 'cat > /dev/null; echo \"  Settings screen, Wi-Fi on  \"'");
        assert_eq!(
            c.caption("open settings", "AAAA").unwrap(),
            "Settings screen, Wi-Fi on"
        );
    }

    #[test]
    fn caption_receives_task_and_screenshot() {
        let c = captioner("cat");
        let echoed = c.caption("open settings", "iVBORw0KGgo=").unwrap();
        let parsed: serde_json::Value = serde_json::from_str(&echoed).unwrap();
        assert_eq!(parsed["task"], "open settings");
        assert_eq!(parsed["screenshot_b64"], "iVBORw0KGgo=");
    }

    #[test]
    fn empty_output_is_an_error() {
        let c = captioner("sh -c 'cat > /dev/null'");
        assert!(c.caption("t", "AAAA").is_err());
    }

    #[test]
    fn failing_command_is_an_error() {
        let c = captioner("sh -c 'cat > /dev/null; echo no model >&2; exit 1'");
        let err = c.caption("t", "AAAA").unwrap_err();
        assert!(err.to_string().contains("no model"));
    }

    #[test]
    fn placeholders_are_rejected() {
        let err = CommandCaptioner::new("caption {model}", Arc::new(SubprocessRegistry::new()))
            .err()
            .unwrap();
        assert_eq!(err.code(), "config_error");
    }
}
