//! Rendering recalled memories into a prompt-context block

use std::fmt::Write as _;
use std::time::Duration;

use crate::config::ContextConfig;
use crate::lifecycle::{StrengthTier, TierThresholds};
use crate::orchestrator::RecalledMemory;

/// Header line of a rendered context block
pub const CONTEXT_HEADER: &str = "# Relevant context from memory:";

/// Closing instruction of a rendered context block
pub const CONTEXT_FOOTER: &str = "Please consider this context when responding.";

/// Render memories as a numbered block with a tier marker per item.
///
/// At most `config.max_items` memories are rendered, in the given order.
/// Returns an empty string when there is nothing to render.
pub fn render_memory_context(memories: &[RecalledMemory], config: &ContextConfig) -> String {
    if memories.is_empty() || config.max_items == 0 {
        return String::new();
    }

    let thresholds = TierThresholds::from(config);
    let mut out = String::new();
    out.push_str(CONTEXT_HEADER);
    out.push('\n');

    for (i, memory) in memories.iter().take(config.max_items).enumerate() {
        let tier = StrengthTier::classify(memory.strength, &thresholds);
        // Writing to a String cannot fail
        let _ = writeln!(out, "{}. {} {}", i + 1, tier.marker(), memory.content);
    }

    out.push('\n');
    out.push_str(CONTEXT_FOOTER);
    out.push('\n');
    out
}

/// Compact human-readable elapsed time: `45s`, `12m`, `3.5h`, `2.1d`
pub fn format_elapsed(elapsed: Duration) -> String {
    let seconds = elapsed.as_secs_f64();
    if seconds < 60.0 {
        format!("{:.0}s", seconds)
    } else if seconds < 3600.0 {
        format!("{:.0}m", seconds / 60.0)
    } else if seconds < 86400.0 {
        format!("{:.1}h", seconds / 3600.0)
    } else {
        format!("{:.1}d", seconds / 86400.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::memory::Metadata;
    use chrono::Utc;

    fn recalled(content: &str, strength: f64) -> RecalledMemory {
        let now = Utc::now();
        RecalledMemory {
            id: content.to_string(),
            content: content.to_string(),
            strength,
            metadata: Metadata::new(),
            distance: 0.1,
            created_at: now,
            last_accessed_at: now,
            access_count: 1,
        }
    }

    #[test]
    fn test_render_marks_tiers() {
        let memories = vec![
            recalled("likes tea", 0.9),
            recalled("lives in Oslo", 0.5),
            recalled("owned a cat", 0.3),
        ];
        let rendered = render_memory_context(&memories, &ContextConfig::default());

        let expected = "# Relevant context from memory:\n\
                        1. [hot] likes tea\n\
                        2. [warm] lives in Oslo\n\
                        3. [cold] owned a cat\n\
                        \n\
                        Please consider this context when responding.\n";
        assert_eq!(rendered, expected);
    }

    #[test]
    fn test_render_respects_max_items() {
        let memories: Vec<_> = (0..10).map(|i| recalled(&format!("fact {}", i), 0.8)).collect();
        let config = ContextConfig {
            max_items: 2,
            ..Default::default()
        };
        let rendered = render_memory_context(&memories, &config);
        assert!(rendered.contains("2. [hot] fact 1"));
        assert!(!rendered.contains("fact 2"));
    }

    #[test]
    fn test_render_empty() {
        assert_eq!(render_memory_context(&[], &ContextConfig::default()), "");
    }

    #[test]
    fn test_format_elapsed() {
        assert_eq!(format_elapsed(Duration::from_secs(45)), "45s");
        assert_eq!(format_elapsed(Duration::from_secs(12 * 60)), "12m");
        assert_eq!(format_elapsed(Duration::from_secs(3 * 3600 + 1800)), "3.5h");
        assert_eq!(format_elapsed(Duration::from_secs(2 * 86400 + 8640)), "2.1d");
    }
}
