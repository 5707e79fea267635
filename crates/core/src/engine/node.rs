//! Process tree nodes.

use super::context::ProcessContext;
use super::step::ProcessStep;
use std::fmt::Write;
use std::sync::Arc;

/// A node in the process tree.
///
/// The id doubles as the completion-flag key. Completion itself lives in
/// the context, so the tree is immutable once built and can be shared
/// between runs.
pub struct ProcessNode<C: ProcessContext> {
    id: String,
    step: Option<Arc<dyn ProcessStep<C>>>,
    state_label: Option<String>,
    message: Option<String>,
    children: Vec<Arc<ProcessNode<C>>>,
}

impl<C: ProcessContext> ProcessNode<C> {
    /// A grouping node without a step.
    pub fn new(id: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            step: None,
            state_label: None,
            message: None,
            children: Vec::new(),
        }
    }

    pub fn with_step(mut self, step: impl ProcessStep<C> + 'static) -> Self {
        self.step = Some(Arc::new(step));
        self
    }

    pub fn with_shared_step(mut self, step: Arc<dyn ProcessStep<C>>) -> Self {
        self.step = Some(step);
        self
    }

    pub fn with_state(mut self, label: impl Into<String>) -> Self {
        self.state_label = Some(label.into());
        self
    }

    pub fn with_message(mut self, message: impl Into<String>) -> Self {
        self.message = Some(message.into());
        self
    }

    pub fn add_child(mut self, child: ProcessNode<C>) -> Self {
        self.children.push(Arc::new(child));
        self
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    pub fn step(&self) -> Option<&Arc<dyn ProcessStep<C>>> {
        self.step.as_ref()
    }

    pub fn state_label(&self) -> Option<&str> {
        self.state_label.as_deref()
    }

    pub fn message(&self) -> Option<&str> {
        self.message.as_deref()
    }

    pub fn children(&self) -> &[Arc<ProcessNode<C>>] {
        &self.children
    }

    pub fn is_completed(&self, ctx: &C) -> bool {
        ctx.is_completed(&self.id)
    }

    /// First node in pre-order that has a step, is not completed and whose
    /// step accepts the context.
    ///
    /// A node that is completed or ineligible does not hide its children.
    pub fn find_next(self: &Arc<Self>, ctx: &C) -> Option<(Arc<Self>, Arc<dyn ProcessStep<C>>)> {
        if let Some(step) = &self.step {
            if !self.is_completed(ctx) && step.can_execute(ctx) {
                return Some((Arc::clone(self), Arc::clone(step)));
            }
        }
        self.children.iter().find_map(|child| child.find_next(ctx))
    }

    /// Node ids in pre-order.
    pub fn ids(&self) -> Vec<String> {
        let mut ids = vec![self.id.clone()];
        for child in &self.children {
            ids.extend(child.ids());
        }
        ids
    }

    /// Indented one-line-per-node rendering: `id [label] "message" (step)`.
    pub fn outline(&self) -> String {
        let mut out = String::new();
        self.write_outline(&mut out, 0);
        out
    }

    fn write_outline(&self, out: &mut String, depth: usize) {
        let _ = write!(out, "{}{}", "  ".repeat(depth), self.id);
        if let Some(label) = &self.state_label {
            let _ = write!(out, " [{label}]");
        }
        if let Some(message) = &self.message {
            let _ = write!(out, " \"{message}\"");
        }
        if let Some(step) = &self.step {
            let _ = write!(out, " ({})", step.name());
        }
        out.push('\n');
        for child in &self.children {
            child.write_outline(out, depth + 1);
        }
    }
}
