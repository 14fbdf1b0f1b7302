//! Script emission with per-object failure isolation

use std::collections::HashSet;

use tracing::{debug, warn};

use crate::domain::{ObjectFailure, ObjectKind, PhaseKind, RenderOptions};
use crate::error::CoreError;
use crate::object::SchemaObject;
use crate::scheduler::Phase;
use crate::script::ScriptBuffer;

/// Renders scheduled objects into a [`ScriptBuffer`].
///
/// Each object's statements form one batch. A failing object is logged and
/// recorded, never fatal. Sub-objects whose owner failed are skipped, since
/// their statements could not be replayed without it.
#[derive(Debug, Default)]
pub struct ScriptEmitter {
    buffer: ScriptBuffer,
    failures: Vec<ObjectFailure>,
    failed: HashSet<String>,
}

impl ScriptEmitter {
    pub fn new() -> Self {
        Self::default()
    }

    /// Emit every object of `phase` in order
    pub fn emit_phase(&mut self, phase: &Phase<'_>) {
        debug!("Emitting {} objects in {} phase", phase.objects.len(), phase.kind);
        for object in &phase.objects {
            if !self.emit_object(phase.kind, *object, &phase.options) {
                continue;
            }
            for attachment in object.attachments() {
                if includes_inline(&phase.options, attachment.kind()) {
                    self.emit_object(phase.kind, attachment, &phase.options);
                }
            }
        }
    }

    /// Render one object and append it as a batch. Returns whether the
    /// object rendered.
    pub fn emit_object(
        &mut self,
        phase: PhaseKind,
        object: &dyn SchemaObject,
        options: &RenderOptions,
    ) -> bool {
        let rendered = match object.owner() {
            Some(owner) if self.failed.contains(&owner) => Err(CoreError::render(
                object.identity(),
                format!("owner {} was not emitted", owner),
            )),
            _ => object.render(options),
        };

        match rendered {
            Ok(statements) if statements.is_empty() => {
                debug!("{} {} renders nothing in {} phase", object.kind(), object.identity(), phase);
                true
            }
            Ok(statements) => {
                debug!("Emitted {} {}", object.kind(), object.identity());
                self.buffer.add_batch(&statements);
                true
            }
            Err(e) => {
                warn!(
                    "Skipping {} {} in {} phase: {}",
                    object.kind(),
                    object.identity(),
                    phase,
                    failure_cause(&e)
                );
                self.failed.insert(object.identity());
                self.failures.push(ObjectFailure {
                    identity: object.identity(),
                    kind: object.kind(),
                    phase,
                    cause: failure_cause(&e),
                });
                false
            }
        }
    }

    /// Append a literal statement as its own batch
    pub fn emit_statement(&mut self, statement: &str) {
        self.buffer.add_batch(&[statement]);
    }

    pub fn buffer(&self) -> &ScriptBuffer {
        &self.buffer
    }

    pub fn failures(&self) -> &[ObjectFailure] {
        &self.failures
    }

    pub fn finish(self) -> (ScriptBuffer, Vec<ObjectFailure>) {
        (self.buffer, self.failures)
    }
}

fn includes_inline(options: &RenderOptions, kind: ObjectKind) -> bool {
    match kind {
        ObjectKind::Index => options.include_indexes,
        ObjectKind::Trigger => options.include_triggers,
        ObjectKind::Statistic => options.include_statistics,
        _ => false,
    }
}

fn failure_cause(err: &CoreError) -> String {
    match err {
        CoreError::Render { cause, .. } => cause.clone(),
        other => other.to_string(),
    }
}
