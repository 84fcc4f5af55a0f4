//! Ordered, fail-fast execution of transform steps.
//!
//! Both the compound transform and the top-level pipeline run their steps
//! through [`Chain::run`]:
//!
//! 1. The working set starts as the single input event.
//! 2. Each step processes every event of the working set, in order, and the
//!    concatenated emissions become the next working set.
//! 3. An error aborts the traversal at once, tagged with the step's index and
//!    kind. Nothing is emitted.
//! 4. An empty working set ends the traversal early. Later steps never run.
//!
//! An event whose datatype a step does not accept is dropped before that step
//! and counted. A step that emits a datatype outside its declared output fails
//! the traversal.

use super::{Step, TransformError};
use crate::config::ConfigError;
use crate::event::{DataTypeSet, Event};
use crate::telemetry;

/// An ordered list of built transform steps.
#[derive(Debug, Default)]
pub struct Chain {
    steps: Vec<Step>,
}

impl Chain {
    /// Creates a chain from built steps.
    #[must_use]
    pub fn new(steps: Vec<Step>) -> Self {
        Self { steps }
    }

    /// The steps, in execution order.
    #[must_use]
    pub fn steps(&self) -> &[Step] {
        &self.steps
    }

    /// Number of steps.
    #[must_use]
    pub fn len(&self) -> usize {
        self.steps.len()
    }

    /// Returns true if the chain has no steps.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.steps.is_empty()
    }

    /// Datatypes accepted by the first step. An empty chain accepts anything.
    #[must_use]
    pub fn input(&self) -> DataTypeSet {
        self.steps
            .first()
            .map_or(DataTypeSet::ALL, |step| step.transform().input())
    }

    /// Datatypes emitted by the last step. An empty chain emits what it gets.
    #[must_use]
    pub fn output(&self) -> DataTypeSet {
        self.steps
            .last()
            .map_or(DataTypeSet::ALL, |step| step.transform().output())
    }

    /// Checks that every step can receive something its predecessor emits.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::InconsistentTypes`] for the first pair of
    /// adjacent steps whose output and input sets are disjoint.
    pub fn check_types(&self) -> Result<(), ConfigError> {
        self.steps
            .windows(2)
            .enumerate()
            .try_for_each(|(index, pair)| {
                let produced = pair[0].transform().output();
                let accepted = pair[1].transform().input();
                if produced.intersects(accepted) {
                    Ok(())
                } else {
                    Err(ConfigError::InconsistentTypes {
                        index,
                        produced,
                        accepted,
                    })
                }
            })
    }

    /// Runs one event through every step.
    ///
    /// # Errors
    ///
    /// Returns the first step error, tagged with the step's index and kind.
    pub fn run(&self, event: Event) -> Result<Vec<Event>, TransformError> {
        let mut working = vec![event];

        for (index, step) in self.steps.iter().enumerate() {
            if working.is_empty() {
                break;
            }
            working = run_step(index, step, working)?;
        }

        Ok(working)
    }
}

fn run_step(index: usize, step: &Step, events: Vec<Event>) -> Result<Vec<Event>, TransformError> {
    let transform = step.transform();
    let accepts = transform.input();
    let declared = transform.output();
    let mut emitted = Vec::with_capacity(events.len());

    for event in events {
        if !accepts.contains(event.data_type()) {
            telemetry::type_mismatch_dropped(step.kind());
            tracing::debug!(
                step = index,
                kind = step.kind(),
                data_type = %event.data_type(),
                "Dropped event not accepted by step"
            );
            continue;
        }

        let outputs = transform
            .process(event)
            .map_err(|error| tag(error, index, step.kind()))?;

        if let Some(found) = outputs
            .iter()
            .map(Event::data_type)
            .find(|data_type| !declared.contains(*data_type))
        {
            let error = TransformError::DatatypeChanged {
                kind: step.kind().to_string(),
                found,
                declared,
            };
            return Err(tag(error, index, step.kind()));
        }

        emitted.extend(outputs);
    }

    Ok(emitted)
}

fn tag(error: TransformError, index: usize, kind: &str) -> TransformError {
    if error.step().is_none() {
        telemetry::transform_error(kind, index);
    }
    error.at_step(index, kind)
}
