use anyhow::{Context, Result};
use std::collections::HashMap;
use std::fs;
use std::path::Path;

/// Key of the storyteller instruction, `system_instruction.md` on disk.
pub const SYSTEM_INSTRUCTION_KEY: &str = "system_instruction";

/// Used when the prompts directory has no storyteller instruction.
pub const DEFAULT_SYSTEM_INSTRUCTION: &str = include_str!("../prompts/system_instruction.md");

pub fn load_prompts(dir_path: &Path) -> Result<HashMap<String, String>> {
    let mut prompts = HashMap::new();

    for entry in fs::read_dir(dir_path)
        .with_context(|| format!("Failed to read prompts directory: {}", dir_path.display()))?
    {
        let entry = entry?;
        let path = entry.path();

        if path.is_file() && path.extension().and_then(|s| s.to_str()) == Some("md") {
            let prompt_key = path
                .file_stem()
                .and_then(|s| s.to_str())
                .context("Could not get file stem for prompt file")?
                .to_string();

            let content = fs::read_to_string(&path)
                .with_context(|| format!("Failed to read prompt file: {}", path.display()))?;

            prompts.insert(prompt_key, content);
        }
    }

    Ok(prompts)
}

/// The storyteller instruction, preferring a non-blank override from `prompts`.
pub fn system_instruction(prompts: &HashMap<String, String>) -> String {
    prompts
        .get(SYSTEM_INSTRUCTION_KEY)
        .map(|prompt| prompt.trim())
        .filter(|prompt| !prompt.is_empty())
        .unwrap_or_else(|| DEFAULT_SYSTEM_INSTRUCTION.trim())
        .to_string()
}
