//! The step-wise execution engine.
//!
//! A [`Run`] walks one node's compiled program through an explicit stack of
//! (program, position) frames: entering a conditional branch or shortcut
//! block pushes a frame, exhausting one pops back to the enclosing context,
//! and a node link replaces the whole stack (links are tail transfers, so
//! node-to-node depth stays flat). The engine suspends after yielding each
//! text line and at every options prompt, and resumes only when the embedder
//! pulls again or selects.

use std::collections::HashMap;
use std::rc::Rc;

use crate::ast::{Program, Stmt};
use crate::error::{Error, Result};
use crate::eval::{self, Evaluated};
use crate::parser;
use crate::types::{CommandCall, Document, Step};
use crate::value::VariableStore;

/// Host-tunable behavior, defaults matching the original engine.
#[derive(Debug, Clone)]
pub struct RunnerOptions {
    /// Jump through a single-member link group without prompting.
    pub auto_advance_single_link: bool,
    /// Fail on commands with no registered handler instead of skipping them.
    pub strict_commands: bool,
}

impl Default for RunnerOptions {
    fn default() -> Self {
        RunnerOptions {
            auto_advance_single_link: true,
            strict_commands: true,
        }
    }
}

/// What a command handler wants the engine to do after it ran.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CommandAction {
    /// Keep executing; nothing is surfaced to the consumer.
    Continue,
    /// Yield the command as a [`Step::Command`] before continuing.
    Emit,
}

type CommandHandler = Box<dyn FnMut(&CommandCall, &mut VariableStore) -> Result<CommandAction>>;

/// Owns a document, its compiled programs, the variable store, and the
/// registered command handlers. Each node body is compiled at most once per
/// Runner lifetime, on the first run or link transfer that reaches it.
#[derive(Default)]
pub struct Runner {
    document: Document,
    programs: HashMap<String, Rc<Program>>,
    pub variables: VariableStore,
    handlers: HashMap<String, CommandHandler>,
    options: RunnerOptions,
}

impl Runner {
    pub fn new() -> Self {
        Runner::default()
    }

    pub fn with_options(options: RunnerOptions) -> Self {
        Runner {
            options,
            ..Runner::default()
        }
    }

    /// Install a document, dropping programs compiled from the previous one.
    /// Variables and command handlers are kept.
    pub fn load(&mut self, document: Document) {
        self.document = document;
        self.programs.clear();
    }

    /// Register the handler dispatched for `<<name …>>` statements.
    pub fn register_command<F>(&mut self, name: impl Into<String>, handler: F)
    where
        F: FnMut(&CommandCall, &mut VariableStore) -> Result<CommandAction> + 'static,
    {
        self.handlers.insert(name.into(), Box::new(handler));
    }

    /// Start executing at `title`. Fails with [`Error::NodeNotFound`] if the
    /// node is absent, or with the node's [`Error::Parse`] on first compile.
    ///
    /// The returned [`Run`] is single-use and forward-only; a later `run`
    /// starts fresh but sees the same variable store.
    pub fn run(&mut self, title: &str) -> Result<Run<'_>> {
        let program = self.compile(title)?;
        Ok(Run {
            runner: self,
            stack: vec![Frame { program, pos: 0 }],
            pending: None,
        })
    }

    fn compile(&mut self, title: &str) -> Result<Rc<Program>> {
        if let Some(program) = self.programs.get(title) {
            return Ok(program.clone());
        }
        let node = self
            .document
            .get(title)
            .ok_or_else(|| Error::NodeNotFound(title.to_string()))?;
        let program = Rc::new(parser::compile(title, &node.body)?);
        self.programs.insert(title.to_string(), program.clone());
        Ok(program)
    }
}

struct Frame {
    program: Rc<Program>,
    pos: usize,
}

enum Choice {
    Block(Rc<Program>),
    Node(String),
}

/// A live cursor over one `run` call. Pull steps with [`Run::next`]; when a
/// [`Step::Options`] is yielded, resolve it with [`Run::select`] before
/// pulling again.
pub struct Run<'a> {
    runner: &'a mut Runner,
    stack: Vec<Frame>,
    pending: Option<Vec<Choice>>,
}

impl Run<'_> {
    /// The shared variable store, readable while the run is live.
    pub fn variables(&self) -> &VariableStore {
        &self.runner.variables
    }

    /// Mutable variable access mid-run, for host-side seeding between steps.
    pub fn variables_mut(&mut self) -> &mut VariableStore {
        &mut self.runner.variables
    }

    /// Advance to the next step. `Ok(None)` means the run completed.
    ///
    /// Script errors terminate the run; calling `next` again afterwards
    /// reports completion. Calling while an options prompt is unresolved is
    /// rejected with [`Error::PendingSelection`] and leaves the cursor
    /// intact.
    pub fn next(&mut self) -> Result<Option<Step>> {
        if self.pending.is_some() {
            return Err(Error::PendingSelection);
        }
        match self.advance() {
            Ok(step) => Ok(step),
            Err(e) => {
                self.stack.clear();
                Err(e)
            }
        }
    }

    /// Resolve the pending options prompt by index into the presented list.
    ///
    /// An out-of-range index or a call with nothing pending fails with
    /// [`Error::Selection`] without disturbing the cursor.
    pub fn select(&mut self, index: usize) -> Result<()> {
        let count = match &self.pending {
            None => {
                return Err(Error::Selection(
                    "no options prompt is awaiting selection".to_string(),
                ))
            }
            Some(choices) => choices.len(),
        };
        if index >= count {
            return Err(Error::Selection(format!(
                "index {index} is out of range for {count} options"
            )));
        }
        let mut choices = self.pending.take().unwrap_or_default();
        match choices.swap_remove(index) {
            Choice::Block(program) => {
                self.stack.push(Frame { program, pos: 0 });
                Ok(())
            }
            Choice::Node(target) => self.jump(&target).inspect_err(|_| self.stack.clear()),
        }
    }

    fn advance(&mut self) -> Result<Option<Step>> {
        loop {
            let Some(frame) = self.stack.last_mut() else {
                return Ok(None);
            };
            if frame.pos >= frame.program.stmts.len() {
                self.stack.pop();
                continue;
            }
            let program = frame.program.clone();
            let index = frame.pos;
            frame.pos += 1;

            match &program.stmts[index] {
                Stmt::Text(template) => {
                    let text = eval::render(template, &self.runner.variables)?;
                    return Ok(Some(Step::Text { text }));
                }
                Stmt::Set { name, expr } => {
                    match eval::evaluate(expr, &self.runner.variables)? {
                        Evaluated::Value(value) => self.runner.variables.set(name.clone(), value),
                        // Copying an unset variable unsets the target.
                        Evaluated::Undefined(_) => {
                            self.runner.variables.unset(name);
                        }
                    }
                }
                Stmt::If(branches) => {
                    for branch in branches {
                        let taken = match &branch.condition {
                            None => true,
                            Some(condition) => {
                                eval::evaluate_condition(condition, &self.runner.variables)?
                            }
                        };
                        if taken {
                            self.stack.push(Frame {
                                program: branch.block.clone(),
                                pos: 0,
                            });
                            break;
                        }
                    }
                }
                Stmt::Shortcuts(options) => {
                    let mut labels = Vec::new();
                    let mut choices = Vec::new();
                    for option in options {
                        let shown = match &option.guard {
                            None => true,
                            Some(guard) => {
                                eval::evaluate_condition(guard, &self.runner.variables)?
                            }
                        };
                        if shown {
                            labels.push(eval::render(&option.label, &self.runner.variables)?);
                            choices.push(Choice::Block(option.block.clone()));
                        }
                    }
                    if labels.is_empty() {
                        continue;
                    }
                    self.pending = Some(choices);
                    return Ok(Some(Step::Options { options: labels }));
                }
                Stmt::Links(links) => {
                    if links.len() == 1 && self.runner.options.auto_advance_single_link {
                        let target = links[0].target.clone();
                        self.jump(&target)?;
                        continue;
                    }
                    let labels = links
                        .iter()
                        .map(|link| link.label.clone().unwrap_or_else(|| link.target.clone()))
                        .collect();
                    self.pending = Some(
                        links
                            .iter()
                            .map(|link| Choice::Node(link.target.clone()))
                            .collect(),
                    );
                    return Ok(Some(Step::Options { options: labels }));
                }
                Stmt::Command(call) => {
                    if call.name == "stop" {
                        self.stack.clear();
                        return Ok(None);
                    }
                    let runner = &mut *self.runner;
                    match runner.handlers.get_mut(&call.name) {
                        Some(handler) => match handler(call, &mut runner.variables)? {
                            CommandAction::Emit => {
                                return Ok(Some(Step::Command {
                                    command: call.clone(),
                                }))
                            }
                            CommandAction::Continue => {}
                        },
                        None if runner.options.strict_commands => {
                            return Err(Error::UnknownCommand(call.name.clone()))
                        }
                        None => {}
                    }
                }
            }
        }
    }

    /// Tail transfer to another node: unwind every open block and install
    /// the target's program as the sole frame. The target is looked up (and
    /// compiled, if this is its first visit) at the moment the transfer
    /// fires.
    fn jump(&mut self, title: &str) -> Result<()> {
        let program = self.runner.compile(title)?;
        self.stack.clear();
        self.stack.push(Frame { program, pos: 0 });
        Ok(())
    }
}
