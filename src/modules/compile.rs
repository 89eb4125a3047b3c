//! Process-wide cache of compiled sources.
//!
//! Entries are keyed by source name and carry the SHA-256 digest of the
//! text they were compiled from; a changed text recompiles. Failures are
//! cached like successes, so a broken file reports the same error on every
//! load without reparsing.

use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard};

use sha2::{Digest, Sha256};

use crate::parser::ast::ProgramData;
use crate::parser::{CompileError, JsParser};

use super::typescript::strip_types;

pub type CompileResult = Result<Arc<ProgramData>, CompileError>;

struct Entry {
    digest: [u8; 32],
    result: CompileResult,
}

lazy_static! {
    static ref CACHE: Mutex<HashMap<String, Entry>> = Mutex::new(HashMap::new());
}

fn cache() -> MutexGuard<'static, HashMap<String, Entry>> {
    match CACHE.lock() {
        Ok(guard) => guard,
        Err(poisoned) => poisoned.into_inner(),
    }
}

fn digest(source: &str) -> [u8; 32] {
    Sha256::digest(source.as_bytes()).into()
}

/// Compiles `source`, reusing the cached outcome when the text is unchanged.
pub fn compile(name: &str, source: &str) -> CompileResult {
    let digest = digest(source);
    if let Some(entry) = cache().get(name) {
        if entry.digest == digest {
            log::trace!("compile cache hit for {}", name);
            return entry.result.clone();
        }
    }
    let result = parse(name, source);
    cache().insert(
        name.to_string(),
        Entry {
            digest,
            result: result.clone(),
        },
    );
    result
}

/// Whether an outcome for `name` with exactly this text is cached.
pub fn is_cached(name: &str, source: &str) -> bool {
    cache()
        .get(name)
        .map(|entry| entry.digest == digest(source))
        .unwrap_or(false)
}

/// Parses as JavaScript; on failure retries once with TypeScript syntax
/// stripped. The original error is reported when both fail.
fn parse(name: &str, source: &str) -> CompileResult {
    let first = match JsParser::parse_to_ast_with_name(source, name) {
        Ok(program) => return Ok(Arc::new(program)),
        Err(e) => e,
    };
    let stripped = strip_types(source);
    if stripped == source {
        return Err(first);
    }
    match JsParser::parse_to_ast_with_name(&stripped, name) {
        Ok(program) => {
            log::debug!("compiled {} after removing type annotations", name);
            Ok(Arc::new(program))
        }
        Err(_) => Err(first),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn caches_both_outcomes() {
        let ok = compile("cache-test-ok.js", "var a = 1;").unwrap();
        let again = compile("cache-test-ok.js", "var a = 1;").unwrap();
        assert!(Arc::ptr_eq(&ok, &again));

        let err = compile("cache-test-bad.js", "var = ;").unwrap_err();
        assert!(is_cached("cache-test-bad.js", "var = ;"));
        assert_eq!(compile("cache-test-bad.js", "var = ;").unwrap_err(), err);
        assert_eq!(err.file, "cache-test-bad.js");
    }

    #[test]
    fn changed_text_recompiles() {
        compile("cache-test-change.js", "var a = 1;").unwrap();
        assert!(!is_cached("cache-test-change.js", "var a = 2;"));
        compile("cache-test-change.js", "var a = 2;").unwrap();
        assert!(is_cached("cache-test-change.js", "var a = 2;"));
    }

    #[test]
    fn typescript_falls_back_to_stripped_source() {
        let program = compile("cache-test.ts", "let n: number = 1;\nfunction f(a: string): string { return a }").unwrap();
        assert_eq!(program.body.len(), 2);
    }
}
