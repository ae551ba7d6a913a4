//! Config validation: unknown-key detection with Levenshtein suggestions
//! and operational sanity checks.
//!
//! Raw TOML is first parsed into `toml::Value` and its key tree compared
//! against the known field names; mismatches become warnings with a
//! "did you mean" hint. Serde deserialization runs afterwards. Warnings never
//! reject a config.

use std::collections::HashSet;

/// A non-fatal config warning (typo, suspicious value).
#[derive(Debug, Clone)]
pub struct ValidationWarning {
    pub field: String,
    pub message: String,
    pub suggestion: Option<String>,
}

impl std::fmt::Display for ValidationWarning {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.message)?;
        if let Some(ref s) = self.suggestion {
            write!(f, " (did you mean '{s}'?)")?;
        }
        Ok(())
    }
}

// ============================================================================
// Known Config Keys
// ============================================================================

/// Returns the complete set of valid dotted key paths for `ReadinessConfig`.
///
/// Kept in step with the struct hierarchy in `readiness_config.rs`.
pub fn known_config_keys() -> HashSet<&'static str> {
    let keys: &[&str] = &[
        // [pipeline]
        "pipeline",
        "pipeline.run_timeout_secs",
        "pipeline.max_concurrent_runs",
        "pipeline.intake_delay_ms",
        "pipeline.queue_capacity",
        "pipeline.stuck_after_secs",
        "pipeline.reaper_interval_secs",
        // [merge]
        "merge",
        "merge.recommendation_log_cap",
        // [analyzer]
        "analyzer",
        "analyzer.seed",
        // [storage]
        "storage",
        "storage.backend",
        "storage.data_dir",
        // [server]
        "server",
        "server.addr",
        "server.max_upload_bytes",
        // [logging]
        "logging",
        "logging.level",
        "logging.format",
    ];
    keys.iter().copied().collect()
}

// ============================================================================
// TOML Key Walking
// ============================================================================

/// Recursively walks a `toml::Value` tree and collects all dotted key paths.
///
/// A table `{ a = { b = 1, c = 2 } }` yields `["a", "a.b", "a.c"]`.
pub fn walk_toml_keys(value: &toml::Value, prefix: &str) -> Vec<String> {
    let mut keys = Vec::new();
    if let Some(table) = value.as_table() {
        for (k, v) in table {
            let path = if prefix.is_empty() {
                k.clone()
            } else {
                format!("{prefix}.{k}")
            };
            keys.push(path.clone());
            if v.is_table() {
                keys.extend(walk_toml_keys(v, &path));
            }
        }
    }
    keys
}

// ============================================================================
// Levenshtein Distance
// ============================================================================

fn levenshtein(a: &str, b: &str) -> usize {
    let b_chars: Vec<char> = b.chars().collect();
    let b_len = b_chars.len();
    if a.is_empty() {
        return b_len;
    }
    if b_len == 0 {
        return a.chars().count();
    }

    let mut prev: Vec<usize> = (0..=b_len).collect();
    let mut curr = vec![0; b_len + 1];

    for (i, ca) in a.chars().enumerate() {
        curr[0] = i + 1;
        for (j, cb) in b_chars.iter().enumerate() {
            let cost = usize::from(ca != *cb);
            curr[j + 1] = (prev[j + 1] + 1).min(curr[j] + 1).min(prev[j] + cost);
        }
        std::mem::swap(&mut prev, &mut curr);
    }

    prev[b_len]
}

/// Suggest the closest known key for an unknown key, if within edit distance 3.
pub fn suggest_correction(unknown: &str, known: &HashSet<&str>) -> Option<String> {
    known
        .iter()
        .map(|k| (*k, levenshtein(unknown, k)))
        .filter(|(_, dist)| *dist <= 3)
        .min_by(|(ka, da), (kb, db)| da.cmp(db).then_with(|| ka.cmp(kb)))
        .map(|(k, _)| k.to_string())
}

// ============================================================================
// Unknown Key Validation (entry point)
// ============================================================================

/// Parse a raw TOML string and return warnings for any unknown config keys.
pub fn validate_unknown_keys(raw_toml: &str) -> Vec<ValidationWarning> {
    let Ok(value) = raw_toml.parse::<toml::Value>() else {
        // parse errors surface from serde
        return Vec::new();
    };

    let known = known_config_keys();
    walk_toml_keys(&value, "")
        .into_iter()
        .filter(|key| !known.contains(key.as_str()))
        .map(|key| {
            let suggestion = suggest_correction(&key, &known);
            ValidationWarning {
                message: format!("Unknown config key '{key}'"),
                field: key,
                suggestion,
            }
        })
        .collect()
}

// ============================================================================
// Operational Sanity Checks
// ============================================================================

/// Flag values that are legal but likely mistakes.
pub fn operational_warnings(config: &super::ReadinessConfig) -> Vec<ValidationWarning> {
    let mut warnings = Vec::new();
    let p = &config.pipeline;

    if p.max_concurrent_runs > 256 {
        warnings.push(ValidationWarning {
            field: "pipeline.max_concurrent_runs".to_string(),
            message: format!(
                "pipeline.max_concurrent_runs = {} is unusually high",
                p.max_concurrent_runs
            ),
            suggestion: None,
        });
    }

    if p.intake_delay_ms > 60_000 {
        warnings.push(ValidationWarning {
            field: "pipeline.intake_delay_ms".to_string(),
            message: format!(
                "pipeline.intake_delay_ms = {} delays every upload by over a minute",
                p.intake_delay_ms
            ),
            suggestion: None,
        });
    }

    if p.stuck_after_secs < p.run_timeout_secs.saturating_mul(2) {
        warnings.push(ValidationWarning {
            field: "pipeline.stuck_after_secs".to_string(),
            message: format!(
                "pipeline.stuck_after_secs = {} leaves little margin over run_timeout_secs = {}",
                p.stuck_after_secs, p.run_timeout_secs
            ),
            suggestion: None,
        });
    }

    if config.storage.backend == "memory" {
        warnings.push(ValidationWarning {
            field: "storage.backend".to_string(),
            message: "storage.backend = 'memory' loses all state on restart".to_string(),
            suggestion: None,
        });
    }

    warnings
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_levenshtein_identical() {
        assert_eq!(levenshtein("merge", "merge"), 0);
    }

    #[test]
    fn test_levenshtein_one_edit() {
        assert_eq!(levenshtein("storage", "storge"), 1);
    }

    #[test]
    fn test_levenshtein_empty() {
        assert_eq!(levenshtein("", "abc"), 3);
        assert_eq!(levenshtein("abc", ""), 3);
    }

    #[test]
    fn test_walk_toml_keys_nested() {
        let value: toml::Value = "[pipeline]\nrun_timeout_secs = 5\n".parse().unwrap();
        let keys = walk_toml_keys(&value, "");
        assert_eq!(keys, vec!["pipeline", "pipeline.run_timeout_secs"]);
    }

    #[test]
    fn test_typo_key_produces_warning_with_suggestion() {
        let warnings = validate_unknown_keys("[pipeline]\nrun_timout_secs = 5\n");
        assert_eq!(warnings.len(), 1);
        assert_eq!(warnings[0].field, "pipeline.run_timout_secs");
        assert_eq!(
            warnings[0].suggestion.as_deref(),
            Some("pipeline.run_timeout_secs")
        );
        assert!(warnings[0].to_string().contains("did you mean"));
    }

    #[test]
    fn test_all_valid_keys_produce_zero_warnings() {
        let toml = super::super::ReadinessConfig::default().to_toml().unwrap();
        assert!(validate_unknown_keys(&toml).is_empty());
    }

    #[test]
    fn test_unknown_section_produces_warning() {
        let warnings = validate_unknown_keys("[telemetry]\nenabled = true\n");
        assert!(warnings.iter().any(|w| w.field == "telemetry"));
    }

    #[test]
    fn test_suggest_correction_no_match_for_garbage() {
        let known = known_config_keys();
        assert!(suggest_correction("zzzzzzzzzzzzzzzz", &known).is_none());
    }

    #[test]
    fn test_defaults_raise_no_operational_warnings() {
        let config = super::super::ReadinessConfig::default();
        assert!(operational_warnings(&config).is_empty());
    }

    #[test]
    fn test_memory_backend_warns() {
        let mut config = super::super::ReadinessConfig::default();
        config.storage.backend = "memory".to_string();
        let warnings = operational_warnings(&config);
        assert!(warnings.iter().any(|w| w.field == "storage.backend"));
    }
}
