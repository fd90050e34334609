// Pipeline command configuration
// One external command per job kind; args may contain placeholders.

use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::path::Path;

/// Environment variables a child inherits unless the pipeline overrides the list
pub const DEFAULT_ENV_ALLOWLIST: &[&str] = &["PATH", "HOME", "USER", "LANG", "TMPDIR"];

/// Env var carrying the job's settings object as JSON
pub const SETTINGS_ENV_VAR: &str = "VERBA_JOB_SETTINGS";

fn default_output_ext() -> String {
    "txt".to_string()
}

/// `pipelines.<kind>` config entry
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PipelineCommand {
    pub command: String,
    #[serde(default)]
    pub args: Vec<String>,
    #[serde(default)]
    pub timeout_secs: Option<u64>,
    #[serde(default)]
    pub env_allowlist: Option<Vec<String>>,
    /// Extension of the file written to `{output}`
    #[serde(default = "default_output_ext")]
    pub output_ext: String,
}

impl PipelineCommand {
    pub fn new(command: impl Into<String>, args: Vec<String>) -> Self {
        Self {
            command: command.into(),
            args,
            timeout_secs: None,
            env_allowlist: None,
            output_ext: default_output_ext(),
        }
    }

    pub fn allowlist(&self) -> Vec<String> {
        match &self.env_allowlist {
            Some(list) => list.clone(),
            None => DEFAULT_ENV_ALLOWLIST.iter().map(|s| s.to_string()).collect(),
        }
    }
}

/// Values substituted into `{input}`, `{output}`, `{stem}`, `{output_dir}`
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Placeholders {
    pub input: String,
    pub output: String,
    pub stem: String,
    pub output_dir: String,
}

impl Placeholders {
    pub fn for_input(input: &str, output_dir: &Path, output_ext: &str) -> Self {
        let stem = Path::new(input)
            .file_stem()
            .and_then(|stem| stem.to_str())
            .unwrap_or("output")
            .to_string();
        let output = output_dir.join(format!("{stem}.{output_ext}"));
        Self {
            input: input.to_string(),
            output: output.to_string_lossy().into_owned(),
            stem,
            output_dir: output_dir.to_string_lossy().into_owned(),
        }
    }

    pub fn render(&self, arg: &str) -> String {
        arg.replace("{input}", &self.input)
            .replace("{output_dir}", &self.output_dir)
            .replace("{output}", &self.output)
            .replace("{stem}", &self.stem)
    }
}

/// Keep only allowlisted variables
pub fn filter_env<I>(vars: I, allowlist: &[String]) -> HashMap<String, String>
where
    I: IntoIterator<Item = (String, String)>,
{
    vars.into_iter()
        .filter(|(key, _)| allowlist.contains(key))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::PathBuf;

    #[test]
    fn test_render_all_placeholders() {
        let ph = Placeholders::for_input("/in/Meeting 1.mp3", &PathBuf::from("/out"), "md");
        assert_eq!(ph.stem, "Meeting 1");
        assert_eq!(ph.render("{input}"), "/in/Meeting 1.mp3");
        assert_eq!(ph.render("--out={output}"), "--out=/out/Meeting 1.md");
        assert_eq!(ph.render("{output_dir}/{stem}.json"), "/out/Meeting 1.json");
        assert_eq!(ph.render("plain"), "plain");
    }

    #[test]
    fn test_filter_env_keeps_allowlist_only() {
        let vars = vec![
            ("PATH".to_string(), "/bin".to_string()),
            ("API_KEY".to_string(), "secret".to_string()),
        ];
        let filtered = filter_env(vars, &["PATH".to_string()]);
        assert_eq!(filtered.len(), 1);
        assert!(filtered.contains_key("PATH"));
        assert!(!filtered.contains_key("API_KEY"));
    }

    #[test]
    fn test_deserialize_defaults() {
        let cmd: PipelineCommand =
            serde_json::from_value(serde_json::json!({"command": "whisper"})).unwrap();
        assert!(cmd.args.is_empty());
        assert_eq!(cmd.output_ext, "txt");
        assert!(cmd.allowlist().contains(&"PATH".to_string()));
    }
}
