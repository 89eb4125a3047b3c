//! Strings matching a regular expression, sampled from its `regex-syntax`
//! HIR.

use regex_syntax::hir::{Class, Hir, HirKind};

use super::rng::Random;
use super::schema::SchemaError;
use super::GeneratorError;

/// Extra repetitions drawn for unbounded quantifiers (`*`, `+`, `{n,}`).
const MAX_EXTRA_REPEAT: usize = 8;
const ATTEMPTS: usize = 50;

const PRINTABLE_ASCII: (u32, u32) = (0x20, 0x7e);

pub struct PatternSampler {
    hir: Hir,
}

impl PatternSampler {
    pub fn new(pattern: &str) -> Result<Self, GeneratorError> {
        let hir = regex_syntax::Parser::new().parse(pattern).map_err(|e| {
            GeneratorError::Schema(SchemaError::InvalidPattern {
                pattern: pattern.to_string(),
                message: e.to_string(),
            })
        })?;
        Ok(PatternSampler { hir })
    }

    pub fn sample(&self, rng: &mut Random) -> String {
        let mut out = String::new();
        emit(&self.hir, rng, &mut out);
        out
    }

    /// Samples until the length (in chars) falls within the bounds.
    pub fn sample_len(&self, rng: &mut Random, min: Option<usize>, max: Option<usize>) -> Option<String> {
        for _ in 0..ATTEMPTS {
            let s = self.sample(rng);
            let len = s.chars().count();
            if min.map(|m| len >= m).unwrap_or(true) && max.map(|m| len <= m).unwrap_or(true) {
                return Some(s);
            }
        }
        None
    }
}

fn emit(hir: &Hir, rng: &mut Random, out: &mut String) {
    match hir.kind() {
        HirKind::Empty | HirKind::Look(_) => {}
        HirKind::Literal(lit) => out.push_str(&String::from_utf8_lossy(&lit.0)),
        HirKind::Class(class) => {
            if let Some(c) = pick_from_class(class, rng) {
                out.push(c);
            }
        }
        HirKind::Repetition(rep) => {
            let min = rep.min as usize;
            let max = match rep.max {
                Some(m) => m as usize,
                None => min + MAX_EXTRA_REPEAT,
            };
            let count = rng.usize_range(min, max);
            for _ in 0..count {
                emit(&rep.sub, rng, out);
            }
        }
        HirKind::Capture(cap) => emit(&cap.sub, rng, out),
        HirKind::Concat(items) => {
            for item in items {
                emit(item, rng, out);
            }
        }
        HirKind::Alternation(branches) => {
            if let Some(branch) = rng.pick(branches) {
                emit(branch, rng, out);
            }
        }
    }
}

/// Inclusive code point ranges of a class, narrowed to printable ASCII
/// when the class has any.
fn class_ranges(class: &Class) -> Vec<(u32, u32)> {
    let all: Vec<(u32, u32)> = match class {
        Class::Unicode(c) => c.ranges().iter().map(|r| (r.start() as u32, r.end() as u32)).collect(),
        Class::Bytes(c) => c.ranges().iter().map(|r| (r.start() as u32, r.end() as u32)).collect(),
    };
    let (plo, phi) = PRINTABLE_ASCII;
    let printable: Vec<(u32, u32)> = all
        .iter()
        .filter_map(|&(lo, hi)| {
            let lo = lo.max(plo);
            let hi = hi.min(phi);
            if lo <= hi {
                Some((lo, hi))
            } else {
                None
            }
        })
        .collect();
    if printable.is_empty() {
        all
    } else {
        printable
    }
}

fn pick_from_class(class: &Class, rng: &mut Random) -> Option<char> {
    let ranges = class_ranges(class);
    let total: u64 = ranges.iter().map(|(lo, hi)| (hi - lo) as u64 + 1).sum();
    if total == 0 {
        return None;
    }
    let mut n = rng.int_range(0, total as i64 - 1) as u64;
    for (lo, hi) in ranges {
        let size = (hi - lo) as u64 + 1;
        if n < size {
            return char::from_u32(lo + n as u32);
        }
        n -= size;
    }
    None
}

#[cfg(test)]
mod tests {
    use super::*;
    use regex::Regex;

    fn check(pattern: &str) {
        let sampler = PatternSampler::new(pattern).unwrap();
        let re = Regex::new(pattern).unwrap();
        let mut rng = Random::seeded(7);
        for _ in 0..50 {
            let s = sampler.sample(&mut rng);
            assert!(re.is_match(&s), "{:?} does not match {}", s, pattern);
        }
    }

    #[test]
    fn samples_match_their_pattern() {
        check("^[a-z]{3}-\\d{2,4}$");
        check("^(foo|bar)+baz?$");
        check("^\\w+@\\w+\\.com$");
        check("^.{5}$");
        check("^[A-F0-9]{8}(-[A-F0-9]{4}){3}-[A-F0-9]{12}$");
    }

    #[test]
    fn length_bounds() {
        let sampler = PatternSampler::new("^a+$").unwrap();
        let mut rng = Random::seeded(3);
        let s = sampler.sample_len(&mut rng, Some(3), Some(4)).unwrap();
        assert!((3..=4).contains(&s.len()));
    }
}
