//! # definer-interpreter
//!
//! Interactive sessions over a concept graph. A [`Session`] owns its graph,
//! the current concept and a queue of [`Prompt`]s; each input line is built
//! into concepts under the current concept, and command concepts are run
//! through a [`CommandRegistry`] and then discarded.
//!
//! Built-in commands:
//!
//! | command | effect |
//! |---|---|
//! | `:enter_concept REF` | make the concept matching REF current |
//! | `:enter_partial REF` | as above, lifting a partial match into a concept first |
//! | `:leave_concept` | make the parent current |
//! | `:bind SYMBOL VALUE` | bind in the current concept's context |
//! | `:lookup NAME` | bindings of NAME visible from the current concept |
//! | `:define SCRIPT` | bind a scripted definition to the current concept |
//! | `:check [REF]` | well-definedness diagnostics |
//! | `:show [REF]` | subtree, bindings and definitions |
//! | `:name TEXT` | add a preferred, user-supplied representation |
//! | `:alias REF` | record the current concept as a representation of REF |

#![deny(unsafe_code)]

pub mod commands;
pub mod error;
pub mod prompt;
pub mod registry;
pub mod session;
pub mod state;

pub use error::{SessionError, SessionResult};
pub use prompt::{Prompt, PromptKind};
pub use registry::{CommandHandler, CommandInvocation, CommandOutcome, CommandRegistry};
pub use session::Session;
pub use state::{SessionSettings, SessionState};
