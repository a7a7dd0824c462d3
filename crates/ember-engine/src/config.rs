//! Engine configuration.
//!
//! Selects the code generation pipeline and which TAC optimization passes run.
//! The defaults can be overridden from the environment with
//! [`EngineConfig::from_env`]:
//!
//! - `EMBER_PIPELINE` = `direct` | `tac`
//! - `EMBER_OPTIMIZE` = `0` | `1` (also accepts `false`/`true`, `off`/`on`)

use std::fmt;
use std::str::FromStr;

use tracing::warn;

use crate::Error;

/// Environment variable selecting the pipeline.
pub const PIPELINE_ENV: &str = "EMBER_PIPELINE";
/// Environment variable toggling the optimizer.
pub const OPTIMIZE_ENV: &str = "EMBER_OPTIMIZE";

/// Which code generator turns the syntax tree into bytecode.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Pipeline {
    /// Recursive tree walk that patches forward jumps from body lengths.
    Direct,
    /// Lowering to three-address code, optional passes, then emission.
    #[default]
    Tac,
}

impl FromStr for Pipeline {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "direct" => Ok(Pipeline::Direct),
            "tac" => Ok(Pipeline::Tac),
            other => Err(Error::CompileError(format!(
                "unknown pipeline '{}' (expected 'direct' or 'tac')",
                other
            ))),
        }
    }
}

impl fmt::Display for Pipeline {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Pipeline::Direct => write!(f, "direct"),
            Pipeline::Tac => write!(f, "tac"),
        }
    }
}

/// Switches for the individual TAC optimization passes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct OptimizationPasses {
    /// Remove temporaries that are never read (calls are always kept).
    pub dead_temporaries: bool,
    /// Collapse returns that can never be reached or repeat the previous one.
    pub redundant_returns: bool,
    /// Rewrite `x*0` to `0` and `x+0` to `x` when `x` is statically numeric.
    pub algebraic: bool,
    /// Forward single-definition copies to their uses.
    pub copy_propagation: bool,
}

impl OptimizationPasses {
    /// Every pass enabled.
    pub fn all() -> Self {
        Self {
            dead_temporaries: true,
            redundant_returns: true,
            algebraic: true,
            copy_propagation: true,
        }
    }

    /// Every pass disabled.
    pub fn none() -> Self {
        Self {
            dead_temporaries: false,
            redundant_returns: false,
            algebraic: false,
            copy_propagation: false,
        }
    }

    /// Returns true if at least one pass is enabled.
    pub fn any(&self) -> bool {
        self.dead_temporaries || self.redundant_returns || self.algebraic || self.copy_propagation
    }
}

impl Default for OptimizationPasses {
    fn default() -> Self {
        Self::all()
    }
}

/// Configuration shared by the compiler and the engine facade.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct EngineConfig {
    /// The code generation pipeline.
    pub pipeline: Pipeline,
    /// TAC optimization passes; ignored by the direct pipeline.
    pub passes: OptimizationPasses,
}

impl EngineConfig {
    /// Builds a configuration from the defaults plus environment overrides.
    ///
    /// Unrecognized values are logged and ignored.
    pub fn from_env() -> Self {
        let mut config = Self::default();

        if let Ok(value) = std::env::var(PIPELINE_ENV) {
            match value.parse() {
                Ok(pipeline) => config.pipeline = pipeline,
                Err(err) => warn!(%err, "ignoring {}", PIPELINE_ENV),
            }
        }

        if let Ok(value) = std::env::var(OPTIMIZE_ENV) {
            match parse_switch(&value) {
                Some(true) => config.passes = OptimizationPasses::all(),
                Some(false) => config.passes = OptimizationPasses::none(),
                None => warn!(value = %value, "ignoring {}", OPTIMIZE_ENV),
            }
        }

        config
    }

    /// Sets the pipeline.
    pub fn with_pipeline(mut self, pipeline: Pipeline) -> Self {
        self.pipeline = pipeline;
        self
    }

    /// Sets the optimization passes.
    pub fn with_passes(mut self, passes: OptimizationPasses) -> Self {
        self.passes = passes;
        self
    }
}

fn parse_switch(value: &str) -> Option<bool> {
    match value.trim().to_ascii_lowercase().as_str() {
        "1" | "true" | "on" | "yes" => Some(true),
        "0" | "false" | "off" | "no" => Some(false),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = EngineConfig::default();
        assert_eq!(config.pipeline, Pipeline::Tac);
        assert_eq!(config.passes, OptimizationPasses::all());
    }

    #[test]
    fn test_pipeline_from_str() {
        assert_eq!("direct".parse::<Pipeline>().unwrap(), Pipeline::Direct);
        assert_eq!(" TAC ".parse::<Pipeline>().unwrap(), Pipeline::Tac);
        assert!("jit".parse::<Pipeline>().is_err());
    }

    #[test]
    fn test_pipeline_display_round_trips() {
        for pipeline in [Pipeline::Direct, Pipeline::Tac] {
            assert_eq!(pipeline.to_string().parse::<Pipeline>().unwrap(), pipeline);
        }
    }

    #[test]
    fn test_parse_switch() {
        assert_eq!(parse_switch("ON"), Some(true));
        assert_eq!(parse_switch("0"), Some(false));
        assert_eq!(parse_switch("maybe"), None);
    }

    #[test]
    fn test_builders() {
        let config = EngineConfig::default()
            .with_pipeline(Pipeline::Direct)
            .with_passes(OptimizationPasses::none());
        assert_eq!(config.pipeline, Pipeline::Direct);
        assert!(!config.passes.any());
    }
}
