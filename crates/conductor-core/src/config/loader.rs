//! Centralized environment variable loading.
//!
//! Business code never calls `std::env::var` directly — it goes through
//! `env_or` / `env_optional` / `env_bool` so a primary/alias fallback chain
//! only has to be written once per variable.

use std::env;

/// Load a `.env` file from the current directory into the process environment,
/// without overwriting variables that are already set. Idempotent.
pub fn load_dotenv() {
    use std::sync::Once;
    static INIT: Once = Once::new();
    INIT.call_once(|| {
        let path = env::current_dir()
            .map(|d| d.join(".env"))
            .unwrap_or_else(|_| std::path::PathBuf::from(".env"));
        if let Ok(content) = std::fs::read_to_string(&path) {
            for line in content.lines() {
                let line = line.trim();
                if line.is_empty() || line.starts_with('#') {
                    continue;
                }
                let Some(eq_pos) = line.find('=') else { continue };
                let key = line[..eq_pos].trim();
                let mut value = line[eq_pos + 1..].trim();
                if let Some(hash_pos) = value.find('#') {
                    let before_hash = value[..hash_pos].trim_end();
                    if !before_hash.contains('"') && !before_hash.contains('\'') {
                        value = before_hash;
                    }
                }
                if (value.starts_with('"') && value.ends_with('"'))
                    || (value.starts_with('\'') && value.ends_with('\''))
                {
                    value = &value[1..value.len() - 1];
                }
                if !key.is_empty() && env::var(key).is_err() {
                    // SAFETY: single-threaded call site guarded by `Once`, before any
                    // other thread in this process can plausibly read these keys.
                    #[allow(unsafe_code)]
                    unsafe {
                        env::set_var(key, value);
                    }
                }
            }
        }
    });
}

/// Read a primary variable, falling back through `aliases`, then `default`.
pub fn env_or<F>(primary: &str, aliases: &[&str], default: F) -> String
where
    F: FnOnce() -> String,
{
    env::var(primary)
        .ok()
        .or_else(|| aliases.iter().find_map(|a| env::var(a).ok()))
        .filter(|s| !s.is_empty())
        .unwrap_or_else(default)
}

/// Read a primary variable or alias chain; `None` if unset or empty.
pub fn env_optional(primary: &str, aliases: &[&str]) -> Option<String> {
    env::var(primary)
        .ok()
        .or_else(|| aliases.iter().find_map(|a| env::var(a).ok()))
        .map(|s| s.trim().to_string())
        .filter(|s| !s.is_empty())
}

/// Read a boolean env var ("1"/"true"/"yes"/"on" → true; everything else → `default`).
pub fn env_bool(key: &str, default: bool) -> bool {
    match env::var(key) {
        Ok(v) => matches!(v.to_lowercase().as_str(), "1" | "true" | "yes" | "on"),
        Err(_) => default,
    }
}

/// Read a numeric env var, falling back to `default` on missing/invalid values.
pub fn env_num<T: std::str::FromStr>(key: &str, default: T) -> T {
    env::var(key).ok().and_then(|v| v.parse().ok()).unwrap_or(default)
}
