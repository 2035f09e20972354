// This module holds the knobs that control a compile. CompileOptions selects whether the
// peephole passes run, how many fixpoint rounds they get, and whether reading an undefined
// temporary is a hard error or a logged diagnostic. DebugFlags holds the dump switches
// (QIR listing, QPU words, shader-db counters); they are read from the QPUC_DEBUG
// environment variable as a comma separated list and routed through the log facade.

//! Compile options and debug switches.

use std::env;

/// Name of the environment variable read by [`DebugFlags::from_env`].
pub const DEBUG_ENV_VAR: &str = "QPUC_DEBUG";

/// Diagnostic output toggles.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct DebugFlags {
    /// Log the QIR before and after optimization.
    pub dump_qir: bool,
    /// Log the final instruction words.
    pub dump_qpu: bool,
    /// Log one summary line per shader with instruction and uniform counts.
    pub shaderdb: bool,
}

impl DebugFlags {
    /// Parse a comma separated flag list such as `"qir,qpu"`.
    ///
    /// Unknown names are logged and ignored.
    pub fn parse(list: &str) -> Self {
        let mut flags = DebugFlags::default();
        for name in list.split(',').map(str::trim).filter(|s| !s.is_empty()) {
            match name {
                "qir" => flags.dump_qir = true,
                "qpu" => flags.dump_qpu = true,
                "shaderdb" => flags.shaderdb = true,
                "all" => {
                    flags.dump_qir = true;
                    flags.dump_qpu = true;
                    flags.shaderdb = true;
                }
                other => log::warn!("ignoring unknown {} flag '{}'", DEBUG_ENV_VAR, other),
            }
        }
        flags
    }

    pub fn from_env() -> Self {
        match env::var(DEBUG_ENV_VAR) {
            Ok(list) => Self::parse(&list),
            Err(_) => Self::default(),
        }
    }
}

/// Options for a single compilation session.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CompileOptions {
    pub optimize: bool,
    /// Upper bound on optimizer fixpoint rounds.
    pub max_opt_iterations: usize,
    /// Reject reads of never-written temporaries instead of substituting r0.
    pub strict_undefined: bool,
    pub debug: DebugFlags,
}

impl Default for CompileOptions {
    fn default() -> Self {
        Self {
            optimize: true,
            max_opt_iterations: 64,
            strict_undefined: true,
            debug: DebugFlags::default(),
        }
    }
}

impl CompileOptions {
    /// Defaults with debug flags taken from the environment.
    pub fn from_env() -> Self {
        Self {
            debug: DebugFlags::from_env(),
            ..Self::default()
        }
    }

    pub fn with_optimize(mut self, optimize: bool) -> Self {
        self.optimize = optimize;
        self
    }

    pub fn with_strict_undefined(mut self, strict: bool) -> Self {
        self.strict_undefined = strict;
        self
    }

    pub fn with_debug(mut self, debug: DebugFlags) -> Self {
        self.debug = debug;
        self
    }
}
