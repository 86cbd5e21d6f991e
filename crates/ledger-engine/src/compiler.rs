//! Script compilation with caching
//!
//! Script text is turned into a syntax tree by a pluggable [`ScriptParser`]
//! and compiled once per distinct text. Compiled programs are immutable
//! and shared between executions.

use std::sync::Arc;

use ledger_numscript::{compile, syntax, CompileErrors, Program};
use tracing::debug;

use crate::hash::sha256_hex;
use crate::lfu::LfuCache;

/// Turns script text into a syntax tree
pub trait ScriptParser: Send + Sync {
    fn parse(&self, plain: &str) -> Result<syntax::Script, CompileErrors>;
}

pub struct ProgramCache {
    parser: Arc<dyn ScriptParser>,
    programs: LfuCache<String, Arc<Program>>,
}

impl ProgramCache {
    pub fn new(parser: Arc<dyn ScriptParser>, capacity: usize) -> Self {
        Self {
            parser,
            programs: LfuCache::new(capacity),
        }
    }

    /// Compile `plain`, reusing an earlier result for identical text.
    /// Failures are not cached.
    pub fn compile(&self, plain: &str) -> Result<Arc<Program>, CompileErrors> {
        let key = sha256_hex(plain.as_bytes());
        if let Some(program) = self.programs.get(&key) {
            return Ok(program);
        }

        let script = self.parser.parse(plain)?;
        let program = Arc::new(compile(&script)?);
        debug!(
            key = %key,
            instructions = program.instructions.len(),
            "script compiled"
        );
        self.programs.insert(key, Arc::clone(&program));
        Ok(program)
    }

    pub fn len(&self) -> usize {
        self.programs.len()
    }

    pub fn is_empty(&self) -> bool {
        self.programs.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ledger_numscript::syntax::{Destination, Expr, SendAmount, Source};
    use ledger_numscript::{CompileError, CompileErrorKind};
    use std::sync::atomic::{AtomicUsize, Ordering};

    /// Every text parses to the same mint, except "bad"
    #[derive(Default)]
    struct CountingParser {
        calls: AtomicUsize,
    }

    impl ScriptParser for CountingParser {
        fn parse(&self, plain: &str) -> Result<syntax::Script, CompileErrors> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            if plain == "bad" {
                return Err(CompileError::new(
                    CompileErrorKind::Syntax {
                        message: "unexpected token".into(),
                    },
                    syntax::Span::new(1, 1),
                )
                .into());
            }
            Ok(syntax::Script::new().send(
                SendAmount::Monetary(Expr::monetary("GEM", 100)),
                Source::account("world"),
                Destination::account("mint"),
            ))
        }
    }

    #[test]
    fn test_identical_text_compiles_once() {
        let parser = Arc::new(CountingParser::default());
        let cache = ProgramCache::new(parser.clone(), 8);

        let first = cache.compile("send mint").unwrap();
        let second = cache.compile("send mint").unwrap();
        assert!(Arc::ptr_eq(&first, &second));
        assert_eq!(parser.calls.load(Ordering::SeqCst), 1);

        cache.compile("send mint again").unwrap();
        assert_eq!(parser.calls.load(Ordering::SeqCst), 2);
        assert_eq!(cache.len(), 2);
    }

    #[test]
    fn test_failures_are_not_cached() {
        let parser = Arc::new(CountingParser::default());
        let cache = ProgramCache::new(parser.clone(), 8);

        assert!(cache.compile("bad").is_err());
        assert!(cache.compile("bad").is_err());
        assert_eq!(parser.calls.load(Ordering::SeqCst), 2);
        assert!(cache.is_empty());
    }
}
