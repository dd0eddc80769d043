//! Nudger: a pure templating facility mapping error atoms to short recovery
//! hints loaded from an external YAML table. Adding or changing
//! a hint requires no code change — only an edit to `nudges.yaml`.

use std::collections::HashMap;
use std::path::Path;
use std::sync::OnceLock;

use serde::Deserialize;

/// Flat map `error_atom -> template_string`. Deserializes directly from
/// `nudges.yaml`'s top-level mapping.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct NudgeTable(HashMap<String, String>);

impl NudgeTable {
    /// Loads the table from `path`. A missing file yields an empty table
    /// (every error atom then passes through unchanged), matching the
    /// project's "unknown atoms silently pass through" philosophy.
    pub fn load(path: &Path) -> anyhow::Result<Self> {
        if !path.exists() {
            tracing::debug!(path = %path.display(), "nudges file not found, using empty table");
            return Ok(Self::default());
        }
        let raw = std::fs::read_to_string(path)?;
        let table: HashMap<String, String> = serde_yaml::from_str(&raw)?;
        Ok(Self(table))
    }

    /// Formats `base_message` with a rendered hint appended, if `error_atom`
    /// has an entry. `details` supplies the EEx-style `<%= key %>`
    /// placeholders; unknown keys are left verbatim rather than erroring.
    pub fn format_error(&self, base_message: &str, error_atom: &str, details: &HashMap<String, String>) -> String {
        match self.0.get(error_atom) {
            Some(template) => {
                let hint = render_template(template, details);
                format!("{base_message}\n\nHint: {hint}")
            }
            None => base_message.to_string(),
        }
    }
}

/// Renders `<%= key %>` placeholders against `details`. A placeholder whose
/// key is absent from `details` is left in the output verbatim.
fn render_template(template: &str, details: &HashMap<String, String>) -> String {
    let mut out = String::with_capacity(template.len());
    let mut rest = template;
    loop {
        match rest.find("<%=") {
            None => {
                out.push_str(rest);
                break;
            }
            Some(start) => {
                out.push_str(&rest[..start]);
                let after = &rest[start + 3..];
                match after.find("%>") {
                    None => {
                        // Unterminated placeholder: emit verbatim.
                        out.push_str(&rest[start..]);
                        break;
                    }
                    Some(end) => {
                        let key = after[..end].trim();
                        match details.get(key) {
                            Some(value) => out.push_str(value),
                            None => {
                                out.push_str("<%= ");
                                out.push_str(key);
                                out.push_str(" %>");
                            }
                        }
                        rest = &after[end + 2..];
                    }
                }
            }
        }
    }
    out
}

/// Process-wide singleton, loaded once at startup and shared read-only
/// across engine and sub-agent workers — same snapshot pattern as the tool
/// definition cache in `conductor-context`.
static GLOBAL: OnceLock<NudgeTable> = OnceLock::new();

/// Installs the process-wide nudge table. Call once during startup; later
/// calls are ignored (the first table wins).
pub fn install(table: NudgeTable) {
    let _ = GLOBAL.set(table);
}

/// Returns the installed table, or an empty one if `install` was never
/// called.
pub fn global() -> &'static NudgeTable {
    GLOBAL.get_or_init(NudgeTable::default)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    fn table_with(atom: &str, template: &str) -> NudgeTable {
        let mut m = HashMap::new();
        m.insert(atom.to_string(), template.to_string());
        NudgeTable(m)
    }

    #[test]
    fn unknown_atom_passes_through_unchanged() {
        let t = NudgeTable::default();
        let out = t.format_error("boom", "circuit_breaker_open", &HashMap::new());
        assert_eq!(out, "boom");
    }

    #[test]
    fn known_atom_appends_rendered_hint() {
        let t = table_with("circuit_breaker_open", "try a different skill than <%= skill %>");
        let mut details = HashMap::new();
        details.insert("skill".to_string(), "email.send".to_string());
        let out = t.format_error("circuit open", "circuit_breaker_open", &details);
        assert_eq!(out, "circuit open\n\nHint: try a different skill than email.send");
    }

    #[test]
    fn unknown_placeholder_is_left_verbatim() {
        let t = table_with("limit_exceeded", "used <%= used %> of <%= max %>");
        let mut details = HashMap::new();
        details.insert("used".to_string(), "5".to_string());
        let out = t.format_error("nope", "limit_exceeded", &details);
        assert_eq!(out, "nope\n\nHint: used 5 of <%= max %>");
    }

    #[test]
    fn load_missing_file_yields_empty_table() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nudges.yaml");
        let t = NudgeTable::load(&path).unwrap();
        assert_eq!(t.format_error("x", "anything", &HashMap::new()), "x");
    }

    #[test]
    fn load_parses_yaml_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nudges.yaml");
        let mut f = std::fs::File::create(&path).unwrap();
        writeln!(f, "circuit_breaker_open: \"try again later\"").unwrap();
        let t = NudgeTable::load(&path).unwrap();
        let out = t.format_error("base", "circuit_breaker_open", &HashMap::new());
        assert_eq!(out, "base\n\nHint: try again later");
    }
}
