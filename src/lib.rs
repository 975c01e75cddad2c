//! Interpreter for a line-oriented branching-dialogue scripting language.
//!
//! A document maps node titles to markup bodies mixing plain dialogue lines,
//! `{expr}` interpolation, `<<if>>` conditionals, `->` shortcut options,
//! `[[links]]` between nodes, `<<set>>` assignments, and `<<command>>`
//! statements dispatched to host-registered handlers. The engine compiles a
//! node's body on first use and then walks it under external control: the
//! consumer pulls one [`Step`] at a time, and when a choice prompt comes
//! back, supplies the selected index before execution resumes.
//!
//! ```
//! use skein::{Document, Runner, Step};
//!
//! let document = Document::from_json(r#"[
//!     {"title": "Start",
//!      "body": "Hello there\n-> Wave back\n    You wave.\n-> Walk away\n    You leave.\nThe end"}
//! ]"#).unwrap();
//!
//! let mut runner = Runner::new();
//! runner.load(document);
//!
//! let mut run = runner.run("Start").unwrap();
//! assert_eq!(run.next().unwrap(), Some(Step::Text { text: "Hello there".into() }));
//!
//! let step = run.next().unwrap().unwrap();
//! assert_eq!(step, Step::Options {
//!     options: vec!["Wave back".into(), "Walk away".into()],
//! });
//!
//! run.select(0).unwrap();
//! assert_eq!(run.next().unwrap(), Some(Step::Text { text: "You wave.".into() }));
//! assert_eq!(run.next().unwrap(), Some(Step::Text { text: "The end".into() }));
//! assert_eq!(run.next().unwrap(), None);
//! ```

mod ast;
mod error;
mod eval;
mod expression;
mod parser;
mod runner;
mod types;
mod value;

pub use error::{Error, Result};
pub use runner::{CommandAction, Run, Runner, RunnerOptions};
pub use types::{CommandCall, Document, Node, Step};
pub use value::{Value, VariableStore};
