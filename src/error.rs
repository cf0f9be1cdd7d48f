//! Error taxonomy for the engine.
//!
//! Failures fall into three categories: configuration errors
//! ([`ConfigError`], fatal at setup, before generation 0), operator
//! contract violations ([`ContractError`], fatal programming errors), and
//! runtime degradations, which are logged at the quiet level and never
//! surface as `Err`.
//!
//! Every fatal path is routed through [`handle_failure`], so the reaction
//! to a fatal (return the error, panic, or exit) can be selected once per
//! process via [`set_failure_policy`].

use std::sync::atomic::{AtomicU8, Ordering};

use thiserror::Error;

/// Errors raised while assembling or configuring an algorithm.  Always
/// fatal: the run aborts before generation 0.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("unknown {family} operator `{name}`")]
    UnknownOperator { family: &'static str, name: String },

    #[error("operator `{name}` is not sound for {group} compositions")]
    IncompatibleComposition { group: &'static str, name: String },

    #[error("parameter `{key}` has the wrong type: expected {expected}")]
    WrongParameterType { key: String, expected: &'static str },

    #[error("shrinkage percentage must be non-negative, got {0}")]
    NegativeShrinkage(f64),

    #[error("variable `{label}` encodes to {bits} bit(s); binary crossover requires at least 2")]
    InsufficientPrecision { label: String, bits: u16 },

    #[error("no evaluation functor has been supplied")]
    MissingFunctor,

    #[error("initializer has an empty file set")]
    EmptyFileSet,

    #[error("cannot parse `{file}`: {reason}")]
    CannotParse { file: String, reason: String },

    #[error("roadmap `{file}`: unknown section header `{header}`")]
    UnknownRoadmapSection { file: String, header: String },

    #[error("{0}")]
    Invalid(String),
}

/// Violations of an operator contract.  These indicate a programming
/// error in an operator, not bad user input, and are always fatal.
#[derive(Debug, Error)]
pub enum ContractError {
    #[error("no fitness recorded for design #{design_id}")]
    MissingFitness { design_id: u64 },

    #[error("design group sorted views out of sync ({dv_len} vs {of_len} entries)")]
    ViewsOutOfSync { dv_len: usize, of_len: usize },

    #[error("{0}")]
    Violated(String),
}

/// Top-level error type for the engine.
#[derive(Debug, Error)]
pub enum Error {
    #[error("configuration error: {0}")]
    Config(#[from] ConfigError),

    #[error("operator contract violation: {0}")]
    Contract(#[from] ContractError),

    #[error("i/o error: {0}")]
    Io(#[from] std::io::Error),

    #[error("the algorithm has been finalized")]
    Finalized,
}

/// Reaction applied by [`handle_failure`] to every fatal error.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FailurePolicy {
    /// Propagate the error to the caller (the default).
    Return,
    /// Panic with the error message.
    Panic,
    /// Terminate the process with a non-zero exit code.
    Exit,
}

static FAILURE_POLICY: AtomicU8 = AtomicU8::new(0);

/// Selects the process-wide reaction to fatal errors.
pub fn set_failure_policy(policy: FailurePolicy) {
    let tag = match policy {
        FailurePolicy::Return => 0,
        FailurePolicy::Panic => 1,
        FailurePolicy::Exit => 2,
    };
    FAILURE_POLICY.store(tag, Ordering::SeqCst);
}

fn failure_policy() -> FailurePolicy {
    match FAILURE_POLICY.load(Ordering::SeqCst) {
        1 => FailurePolicy::Panic,
        2 => FailurePolicy::Exit,
        _ => FailurePolicy::Return,
    }
}

/// The single funnel for fatal errors.  Logs the failure and applies the
/// configured [`FailurePolicy`]; under the default policy the error is
/// handed back so the caller can `return Err(handle_failure(e))`.
pub fn handle_failure(error: Error) -> Error {
    log::error!("fatal: {error}");
    match failure_policy() {
        FailurePolicy::Return => error,
        FailurePolicy::Panic => panic!("fatal: {error}"),
        FailurePolicy::Exit => std::process::exit(1),
    }
}
