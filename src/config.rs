//! Configuration of the runtime, the generator and the event loop.

use std::path::PathBuf;

use crate::runner::plugin::types::DEFAULT_MAX_CALL_DEPTH;

pub const ENV_SEED: &str = "MOKAPI_SEED";
pub const ENV_OPTIONAL_PROPERTIES: &str = "MOKAPI_OPTIONAL_PROPERTIES";

#[derive(Debug, Clone)]
pub struct LoopConfig {
    pub thread_name: String,
    /// Bound of the work queue; `None` for unbounded.
    pub queue_capacity: Option<usize>,
}

impl Default for LoopConfig {
    fn default() -> Self {
        LoopConfig {
            thread_name: "mokapi-loop".to_string(),
            queue_capacity: None,
        }
    }
}

impl LoopConfig {
    pub fn with_thread_name(mut self, name: impl Into<String>) -> Self {
        self.thread_name = name.into();
        self
    }

    pub fn with_queue_capacity(mut self, capacity: usize) -> Self {
        self.queue_capacity = Some(capacity);
        self
    }
}

#[derive(Debug, Clone)]
pub struct GeneratorConfig {
    /// Fixed seed for reproducible output; random when `None`.
    pub seed: Option<u64>,
    /// Probability that a non-required property is generated.
    pub optional_properties: f64,
    /// Probability that a nullable schema yields `null` directly.
    pub nullable_probability: f64,
    /// How often one schema may be entered again on the same path.
    pub recursion_depth: usize,
    /// Attempts for object generation and `oneOf` branches.
    pub attempt_limit: usize,
    pub default_min_items: usize,
    pub default_max_items: usize,
}

impl Default for GeneratorConfig {
    fn default() -> Self {
        GeneratorConfig {
            seed: None,
            optional_properties: 0.5,
            nullable_probability: 0.05,
            recursion_depth: 1,
            attempt_limit: 10,
            default_min_items: 0,
            default_max_items: 5,
        }
    }
}

impl GeneratorConfig {
    pub fn with_seed(mut self, seed: u64) -> Self {
        self.seed = Some(seed);
        self
    }

    pub fn with_optional_properties(mut self, probability: f64) -> Self {
        self.optional_properties = probability.clamp(0.0, 1.0);
        self
    }

    pub fn with_nullable_probability(mut self, probability: f64) -> Self {
        self.nullable_probability = probability.clamp(0.0, 1.0);
        self
    }

    pub fn with_recursion_depth(mut self, depth: usize) -> Self {
        self.recursion_depth = depth;
        self
    }

    pub fn with_attempt_limit(mut self, limit: usize) -> Self {
        self.attempt_limit = limit.max(1);
        self
    }

    pub fn with_array_bounds(mut self, min: usize, max: usize) -> Self {
        self.default_min_items = min;
        self.default_max_items = max.max(min);
        self
    }
}

#[derive(Debug, Clone)]
pub struct RuntimeConfig {
    /// Name reported for the main script, usually its file name.
    pub script_name: String,
    /// Directory relative module specifiers of the main script resolve from.
    pub working_dir: PathBuf,
    pub max_call_depth: usize,
    pub generator: GeneratorConfig,
    pub event_loop: LoopConfig,
}

impl Default for RuntimeConfig {
    fn default() -> Self {
        RuntimeConfig {
            script_name: "<script>".to_string(),
            working_dir: std::env::current_dir().unwrap_or_else(|_| PathBuf::from(".")),
            max_call_depth: DEFAULT_MAX_CALL_DEPTH,
            generator: GeneratorConfig::default(),
            event_loop: LoopConfig::default(),
        }
    }
}

impl RuntimeConfig {
    /// Defaults overridden by `MOKAPI_SEED` and `MOKAPI_OPTIONAL_PROPERTIES`.
    pub fn from_env() -> Self {
        let mut config = RuntimeConfig::default();
        if let Ok(seed) = std::env::var(ENV_SEED) {
            match seed.trim().parse::<u64>() {
                Ok(s) => config.generator.seed = Some(s),
                Err(e) => log::warn!("ignoring {}={:?}: {}", ENV_SEED, seed, e),
            }
        }
        if let Ok(p) = std::env::var(ENV_OPTIONAL_PROPERTIES) {
            match p.trim().parse::<f64>() {
                Ok(v) if (0.0..=1.0).contains(&v) => config.generator.optional_properties = v,
                _ => log::warn!("ignoring {}={:?}: expected a probability", ENV_OPTIONAL_PROPERTIES, p),
            }
        }
        config
    }

    pub fn with_script_name(mut self, name: impl Into<String>) -> Self {
        self.script_name = name.into();
        self
    }

    pub fn with_working_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.working_dir = dir.into();
        self
    }

    pub fn with_max_call_depth(mut self, depth: usize) -> Self {
        self.max_call_depth = depth;
        self
    }

    pub fn with_generator(mut self, generator: GeneratorConfig) -> Self {
        self.generator = generator;
        self
    }

    pub fn with_loop(mut self, event_loop: LoopConfig) -> Self {
        self.event_loop = event_loop;
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_builders_clamp_probabilities() {
        let c = GeneratorConfig::default()
            .with_optional_properties(3.0)
            .with_array_bounds(4, 2)
            .with_attempt_limit(0);
        assert_eq!(c.optional_properties, 1.0);
        assert_eq!(c.default_max_items, 4);
        assert_eq!(c.attempt_limit, 1);
    }
}
