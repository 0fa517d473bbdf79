//! Regex analysis for tag filters: literal-prefix extraction, finite OR-value
//! enumeration, and anchored byte matchers compiled from residual expressions.

use crate::error::FilterError;
use regex_syntax::hir::{Class, Hir, HirKind, Look, Repetition};
use regex_syntax::ParserBuilder;

/// Cap on enumerated OR-values. Alternation products beyond this are treated as
/// non-enumerable and fall back to the compiled matcher.
pub const DEFAULT_MAX_OR_VALUES: usize = 20;

/// A regex compiled for full matches against raw (unescaped) tag-value bytes,
/// together with the analysis results the filter layer keys off.
#[derive(Debug)]
pub struct CompiledRegexp {
    or_values: Option<Vec<String>>,
    matches_any: bool,
    accepts_empty_only: bool,
    re: regex::bytes::Regex,
}

impl CompiledRegexp {
    /// Compiles `expr` anchored to the whole value (`^(?:expr)$`) and records
    /// its enumerable OR-values (if any) and the structural flags the
    /// canonicalisation rules key off.
    pub fn compile(expr: &str, max_or_values: usize) -> Result<Self, FilterError> {
        let anchored = format!("^(?:{expr})$");
        let re = regex::bytes::Regex::new(&anchored).map_err(|e| FilterError::RegexParse {
            expr: expr.to_string(),
            reason: e.to_string(),
        })?;
        let (matches_any, accepts_empty_only) = match parse(expr) {
            Ok(hir) => {
                let simplified = simplify(&hir);
                let empty_only = or_values_ext(&simplified, 1)
                    .is_some_and(|vs| vs.len() == 1 && vs[0].is_empty());
                (matches_any_input(&simplified), empty_only)
            }
            Err(_) => (false, false),
        };
        Ok(CompiledRegexp {
            or_values: get_or_values(expr, max_or_values),
            matches_any,
            accepts_empty_only,
            re,
        })
    }

    /// The sorted, deduplicated set of strings `expr` accepts, when finite and
    /// within the configured cap.
    pub fn or_values(&self) -> Option<&[String]> {
        self.or_values.as_deref()
    }

    /// True when the expression structurally accepts every input (`.*`-like).
    pub(crate) fn matches_any(&self) -> bool {
        self.matches_any
    }

    /// True when the expression accepts the empty string and nothing else
    /// (after boundary anchors are stripped), e.g. `()`, `^$`, `(?:)`.
    pub(crate) fn accepts_empty_only(&self) -> bool {
        self.accepts_empty_only
    }

    /// Whole-value match against raw tag-value bytes.
    #[inline]
    pub fn is_match(&self, value: &[u8]) -> bool {
        self.re.is_match(value)
    }
}

/// Splits a regex into the longest byte prefix every accepted string starts
/// with and the residual expression matching the remainders.
///
/// Total function: an invalid (or non-UTF-8) pattern yields `(expr, "")`, i.e.
/// the caller treats the whole input as a literal. The residual satisfies
/// `full(expr) matches p ∥ t  ⇔  residual matches t` for every byte string `t`.
pub fn get_regexp_prefix(expr: &[u8]) -> (Vec<u8>, Vec<u8>) {
    let Ok(pattern) = std::str::from_utf8(expr) else {
        return (expr.to_vec(), Vec::new());
    };
    let Ok(hir) = parse(pattern) else {
        return (expr.to_vec(), Vec::new());
    };
    let (prefix, residual) = literal_prefix(&simplify(&hir));
    let suffix = match residual {
        None => Vec::new(),
        Some(r) => r.to_string().into_bytes(),
    };
    (prefix, suffix)
}

/// Enumerates every string `expr` accepts, when the accepted language is finite
/// and holds at most `max_values` strings.
///
/// The result is lexicographically sorted and deduplicated; the empty
/// expression yields `[""]`. Wildcards, repetitions, anchors, oversized
/// classes/products, and invalid patterns yield `None`.
pub fn get_or_values(expr: &str, max_values: usize) -> Option<Vec<String>> {
    let hir = parse(expr).ok()?;
    let mut values = or_values_ext(&hir, max_values)?;
    values.sort_unstable();
    values.dedup();
    Some(values)
}

fn parse(pattern: &str) -> Result<Hir, regex_syntax::Error> {
    ParserBuilder::new().utf8(false).build().parse(pattern)
}

/// Rewrites the parsed expression with capture groups dropped and `^`/`$`
/// anchors removed wherever they sit at the overall match boundary. Embedded
/// anchors are preserved and later serialised into the residual.
pub(crate) fn simplify(hir: &Hir) -> Hir {
    let mut cur = simplify_at(hir, true, true);
    // Removing an anchor can expose another one at the boundary ("^^foo").
    for _ in 0..8 {
        let next = simplify_at(&cur, true, true);
        if next.to_string() == cur.to_string() {
            break;
        }
        cur = next;
    }
    cur
}

fn simplify_at(hir: &Hir, at_start: bool, at_end: bool) -> Hir {
    match hir.kind() {
        HirKind::Empty => Hir::empty(),
        HirKind::Literal(lit) => Hir::literal(lit.0.clone()),
        HirKind::Class(class) => Hir::class(class.clone()),
        HirKind::Look(look) => match look {
            Look::Start if at_start => Hir::empty(),
            Look::End if at_end => Hir::empty(),
            _ => Hir::look(*look),
        },
        HirKind::Capture(cap) => simplify_at(&cap.sub, at_start, at_end),
        HirKind::Repetition(rep) => Hir::repetition(Repetition {
            min: rep.min,
            max: rep.max,
            greedy: rep.greedy,
            sub: Box::new(simplify_at(&rep.sub, false, false)),
        }),
        HirKind::Concat(parts) => {
            let last = parts.len().saturating_sub(1);
            let mut out: Vec<Hir> = Vec::with_capacity(parts.len());
            for (i, part) in parts.iter().enumerate() {
                let sub = simplify_at(part, at_start && i == 0, at_end && i == last);
                match sub.kind() {
                    HirKind::Empty => {}
                    HirKind::Concat(inner) => out.extend(inner.iter().cloned()),
                    _ => out.push(sub),
                }
            }
            Hir::concat(out)
        }
        HirKind::Alternation(parts) => {
            let mut out: Vec<Hir> = Vec::with_capacity(parts.len());
            for part in parts {
                let sub = simplify_at(part, at_start, at_end);
                match sub.kind() {
                    HirKind::Alternation(inner) => out.extend(inner.iter().cloned()),
                    _ => out.push(sub),
                }
            }
            Hir::alternation(out)
        }
    }
}

/// Returns the longest guaranteed literal prefix and the residual expression,
/// or `None` for the residual when the expression is the prefix alone.
fn literal_prefix(hir: &Hir) -> (Vec<u8>, Option<Hir>) {
    match hir.kind() {
        HirKind::Empty => (Vec::new(), None),
        HirKind::Literal(lit) => (lit.0.to_vec(), None),
        HirKind::Capture(cap) => literal_prefix(&cap.sub),
        HirKind::Concat(parts) => {
            let mut prefix = Vec::new();
            for (i, part) in parts.iter().enumerate() {
                let (p, residual) = literal_prefix(part);
                prefix.extend_from_slice(&p);
                if let Some(residual) = residual {
                    let mut rest = vec![residual];
                    rest.extend(parts[i + 1..].iter().cloned());
                    return (prefix, Some(Hir::concat(rest)));
                }
            }
            (prefix, None)
        }
        HirKind::Alternation(parts) => {
            let decomposed: Vec<(Vec<u8>, Option<Hir>)> =
                parts.iter().map(literal_prefix).collect();
            let common = common_prefix_len(&decomposed);
            if common == 0 {
                return (Vec::new(), Some(hir.clone()));
            }
            let shared = decomposed[0].0[..common].to_vec();
            let branches: Vec<Hir> = decomposed
                .into_iter()
                .map(|(lit, residual)| {
                    let mut rest = Vec::new();
                    if lit.len() > common {
                        rest.push(Hir::literal(lit[common..].to_vec()));
                    }
                    if let Some(r) = residual {
                        rest.push(r);
                    }
                    Hir::concat(rest)
                })
                .collect();
            if branches.iter().all(|b| matches!(b.kind(), HirKind::Empty)) {
                return (shared, None);
            }
            (shared, Some(Hir::alternation(branches)))
        }
        // Classes, lookarounds and repetitions guarantee no leading bytes.
        HirKind::Class(_) | HirKind::Look(_) | HirKind::Repetition(_) => {
            (Vec::new(), Some(hir.clone()))
        }
    }
}

/// Longest byte prefix shared by every branch's guaranteed prefix, backed off
/// so it never splits a multi-byte character in any branch remainder.
fn common_prefix_len(decomposed: &[(Vec<u8>, Option<Hir>)]) -> usize {
    let Some((first, _)) = decomposed.first() else {
        return 0;
    };
    let mut len = first.len();
    for (lit, _) in decomposed {
        let mut n = 0;
        while n < len.min(lit.len()) && lit[n] == first[n] {
            n += 1;
        }
        len = n;
    }
    while len > 0
        && decomposed
            .iter()
            .any(|(lit, _)| lit.len() > len && (lit[len] & 0xC0) == 0x80)
    {
        len -= 1;
    }
    len
}

fn or_values_ext(hir: &Hir, max_values: usize) -> Option<Vec<String>> {
    match hir.kind() {
        HirKind::Empty => Some(vec![String::new()]),
        HirKind::Literal(lit) => Some(vec![String::from_utf8(lit.0.to_vec()).ok()?]),
        HirKind::Capture(cap) => or_values_ext(&cap.sub, max_values),
        HirKind::Class(class) => class_values(class, max_values),
        HirKind::Alternation(parts) => {
            let mut values = Vec::new();
            for part in parts {
                values.extend(or_values_ext(part, max_values)?);
                if values.len() > max_values {
                    return None;
                }
            }
            Some(values)
        }
        HirKind::Concat(parts) => {
            let mut values = vec![String::new()];
            for part in parts {
                let tails = or_values_ext(part, max_values)?;
                if values.len().checked_mul(tails.len())? > max_values {
                    return None;
                }
                let mut next = Vec::with_capacity(values.len() * tails.len());
                for head in &values {
                    for tail in &tails {
                        let mut v = String::with_capacity(head.len() + tail.len());
                        v.push_str(head);
                        v.push_str(tail);
                        next.push(v);
                    }
                }
                values = next;
            }
            Some(values)
        }
        HirKind::Look(_) | HirKind::Repetition(_) => None,
    }
}

fn class_values(class: &Class, max_values: usize) -> Option<Vec<String>> {
    match class {
        Class::Unicode(uc) => {
            let mut count: usize = 0;
            for r in uc.ranges() {
                count = count.checked_add((r.end() as usize) - (r.start() as usize) + 1)?;
                if count > max_values {
                    return None;
                }
            }
            let mut out = Vec::with_capacity(count);
            for r in uc.ranges() {
                for cp in (r.start() as u32)..=(r.end() as u32) {
                    out.push(char::from_u32(cp)?.to_string());
                }
            }
            Some(out)
        }
        Class::Bytes(bc) => {
            let mut count: usize = 0;
            for r in bc.ranges() {
                count += (r.end() as usize) - (r.start() as usize) + 1;
                if count > max_values {
                    return None;
                }
            }
            let mut out = Vec::with_capacity(count);
            for r in bc.ranges() {
                for b in r.start()..=r.end() {
                    if !b.is_ascii() {
                        return None;
                    }
                    out.push((b as char).to_string());
                }
            }
            Some(out)
        }
    }
}

/// True when every input matches: star-of-dot, an alternation containing such a
/// branch, or a concatenation of such parts. Run on the simplified expression.
pub(crate) fn matches_any_input(hir: &Hir) -> bool {
    match hir.kind() {
        HirKind::Repetition(rep) => {
            rep.min == 0
                && rep.max.is_none()
                && (is_dot_like(&rep.sub) || matches_any_input(&rep.sub))
        }
        HirKind::Capture(cap) => matches_any_input(&cap.sub),
        HirKind::Alternation(parts) => parts.iter().any(matches_any_input),
        HirKind::Concat(parts) => {
            parts
                .iter()
                .all(|p| matches_any_input(p) || matches!(p.kind(), HirKind::Empty))
                && parts.iter().any(matches_any_input)
        }
        _ => false,
    }
}

/// A `.`-shaped class: covers every character, allowing the `\n` gap (and the
/// surrogate gap inherent to Unicode classes).
fn is_dot_like(hir: &Hir) -> bool {
    match hir.kind() {
        HirKind::Class(Class::Unicode(uc)) => {
            let mut next: u32 = 0;
            for r in uc.ranges() {
                let (start, end) = (r.start() as u32, r.end() as u32);
                while start > next {
                    if next == '\n' as u32 {
                        next += 1;
                    } else if next == 0xD800 {
                        next = 0xE000;
                    } else {
                        return false;
                    }
                }
                next = end.saturating_add(1);
            }
            next > 0x10FFFF
        }
        HirKind::Class(Class::Bytes(bc)) => {
            let mut next: u32 = 0;
            for r in bc.ranges() {
                let (start, end) = (r.start() as u32, r.end() as u32);
                if start > next && !(next == b'\n' as u32 && start == next + 1) {
                    return false;
                }
                next = end + 1;
            }
            next >= 256
        }
        _ => false,
    }
}
