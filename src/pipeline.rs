//! Pipeline: Loader -> Resolver -> Merger -> Validator -> Materializer.
//!
//! A forward-only state machine. Any stage failure ends in `Failed` and no
//! partial result is exposed.

use crate::error::EngineError;
use crate::fragment::{Fragment, FragmentId, FragmentSource};
use crate::key::OptionKey;
use crate::materialize::{Materializer, ResolvedSettings};
use crate::merge::{MergedTree, Merger};
use crate::resolve::{Resolution, Resolver};
use crate::schema::Schema;
use crate::validate::{ValidationReport, Validator};
use crate::value::OptionValue;
use std::fmt;
use tracing::{debug, warn};

/// Identity of the in-memory fragment holding command-line overrides
pub const OVERRIDES_FRAGMENT: &str = "<command line>";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Stage {
    Loading,
    Resolving,
    Merging,
    Validating,
    Materializing,
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Stage::Loading => "loading",
            Stage::Resolving => "resolving",
            Stage::Merging => "merging",
            Stage::Validating => "validating",
            Stage::Materializing => "materializing",
        };
        f.write_str(name)
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PipelineState {
    Unloaded,
    Loading,
    Resolving,
    Merging,
    Validating,
    Materialized,
    Failed { stage: Stage, reason: String },
}

impl PipelineState {
    pub fn is_terminal(&self) -> bool {
        matches!(self, PipelineState::Materialized | PipelineState::Failed { .. })
    }

    fn rank(&self) -> u8 {
        match self {
            PipelineState::Unloaded => 0,
            PipelineState::Loading => 1,
            PipelineState::Resolving => 2,
            PipelineState::Merging => 3,
            PipelineState::Validating => 4,
            PipelineState::Materialized | PipelineState::Failed { .. } => 5,
        }
    }
}

impl fmt::Display for PipelineState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PipelineState::Unloaded => f.write_str("unloaded"),
            PipelineState::Loading => f.write_str("loading"),
            PipelineState::Resolving => f.write_str("resolving"),
            PipelineState::Merging => f.write_str("merging"),
            PipelineState::Validating => f.write_str("validating"),
            PipelineState::Materialized => f.write_str("materialized"),
            PipelineState::Failed { stage, reason } => write!(f, "failed while {}: {}", stage, reason),
        }
    }
}

/// Everything up to and including validation; used by `check` and `explain`
#[derive(Debug, Clone)]
pub struct Inspection {
    pub resolution: Resolution,
    pub tree: MergedTree,
    pub report: ValidationReport,
}

/// One pipeline invocation. Not reusable: a finished pipeline stays in its terminal state.
pub struct Pipeline<'s, S: FragmentSource + ?Sized> {
    source: &'s S,
    schema: Schema,
    overrides: Vec<(OptionKey, OptionValue)>,
    state: PipelineState,
}

impl<'s, S: FragmentSource + ?Sized> Pipeline<'s, S> {
    pub fn new(source: &'s S, schema: Schema) -> Self {
        Self {
            source,
            schema,
            overrides: Vec::new(),
            state: PipelineState::Unloaded,
        }
    }

    /// Assignments merged after every fragment
    pub fn with_overrides(mut self, overrides: Vec<(OptionKey, OptionValue)>) -> Self {
        self.overrides = overrides;
        self
    }

    pub fn state(&self) -> &PipelineState {
        &self.state
    }

    pub fn schema(&self) -> &Schema {
        &self.schema
    }

    /// Resolve only; no schema involved
    pub fn resolve(&mut self, root: &str) -> Result<Resolution, EngineError> {
        self.advance(PipelineState::Loading)?;
        let root = self.stage(Stage::Loading, |p| p.load_root(root))?;
        self.advance(PipelineState::Resolving)?;
        self.stage(Stage::Resolving, |p| Resolver::new(p.source).resolve(root))
    }

    /// Run through validation and return the report without materializing.
    ///
    /// A report with hard errors leaves the pipeline `Failed`; a clean one
    /// stays in `Validating` so `run` can continue to materialization.
    pub fn check(&mut self, root: &str) -> Result<Inspection, EngineError> {
        let resolution = self.resolve(root)?;

        self.advance(PipelineState::Merging)?;
        let fragments = self.with_override_fragment(&resolution.fragments);
        let tree = self.stage(Stage::Merging, |p| Merger::new(&p.schema).merge(&fragments))?;

        self.advance(PipelineState::Validating)?;
        let report = Validator::new(&self.schema).validate(&tree);
        for warning in report.warnings() {
            warn!(key = %warning.key, "{}", warning);
        }
        debug!(
            errors = report.error_count(),
            warnings = report.warnings().count(),
            "Validated merged tree"
        );
        if report.has_errors() {
            let reason = EngineError::ValidationFailed {
                report: report.clone(),
            }
            .to_string();
            debug!(stage = %Stage::Validating, error = %reason, "Pipeline failed");
            self.state = PipelineState::Failed {
                stage: Stage::Validating,
                reason,
            };
        }

        Ok(Inspection {
            resolution,
            tree,
            report,
        })
    }

    /// Full run to `Materialized`
    pub fn run(&mut self, root: &str) -> Result<ResolvedSettings, EngineError> {
        let inspection = self.check(root)?;
        if inspection.report.has_errors() {
            return Err(EngineError::ValidationFailed {
                report: inspection.report,
            });
        }
        let fragments = self.with_override_fragment(&inspection.resolution.fragments);
        let settings = self.stage(Stage::Materializing, |p| {
            Materializer::new(&p.schema).materialize(&inspection.tree, &inspection.report, &fragments)
        })?;
        self.advance(PipelineState::Materialized)?;
        Ok(settings)
    }

    fn load_root(&self, root: &str) -> Result<Fragment, EngineError> {
        let id = self.source.locate(None, root)?;
        self.source.load(&id)
    }

    fn with_override_fragment(&self, fragments: &[Fragment]) -> Vec<Fragment> {
        let mut all = fragments.to_vec();
        if !self.overrides.is_empty() {
            all.push(Fragment::from_assignments(
                FragmentId::new(OVERRIDES_FRAGMENT),
                self.overrides.clone(),
            ));
        }
        all
    }

    fn advance(&mut self, next: PipelineState) -> Result<(), EngineError> {
        if self.state.is_terminal() || next.rank() <= self.state.rank() {
            return Err(EngineError::Config(format!(
                "invalid pipeline transition from {} to {}",
                self.state, next
            )));
        }
        debug!(from = %self.state, to = %next, "Pipeline transition");
        self.state = next;
        Ok(())
    }

    /// Run a stage; on error, move to `Failed` and propagate
    fn stage<T>(
        &mut self,
        stage: Stage,
        f: impl FnOnce(&Self) -> Result<T, EngineError>,
    ) -> Result<T, EngineError> {
        f(self).map_err(|err| {
            debug!(%stage, error = %err, "Pipeline failed");
            self.state = PipelineState::Failed {
                stage,
                reason: err.to_string(),
            };
            err
        })
    }
}
