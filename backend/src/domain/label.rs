//! Label safety filter: ASCII-LDH checks plus homograph heuristics.
//!
//! Operates on a single DNS label (the portion before the final dot). The
//! TLD is validated separately against the allowlist so that search can
//! report per-candidate reasons without aborting a whole batch.
//!
//! Unicode labels must arrive in `xn--` punycode form. The decoded text is
//! screened for invisible codepoints and for mixing visually confusable
//! scripts, the classic homograph vector.

use serde::Serialize;
use unicode_script::{Script, UnicodeScript};

/// Zero-width and BOM codepoints that render invisibly inside a label.
const INVISIBLE_CODEPOINTS: [char; 5] =
    ['\u{200B}', '\u{200C}', '\u{200D}', '\u{2060}', '\u{FEFF}'];

/// Scripts considered when counting script mixing. Anything outside this set
/// (including Common, which covers digits and hyphens) is ignored.
const CONFUSABLE_SCRIPTS: [Script; 8] = [
    Script::Latin,
    Script::Cyrillic,
    Script::Greek,
    Script::Arabic,
    Script::Hebrew,
    Script::Han,
    Script::Hiragana,
    Script::Katakana,
];

const MAX_LABEL_LEN: usize = 63;

/// Why a label was rejected.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, utoipa::ToSchema)]
pub enum LabelReason {
    /// Length outside [1, 63].
    InvalidLength,
    /// Leading or trailing hyphen.
    InvalidHyphenPosition,
    /// Non-ASCII content without `allow_unicode`.
    NonAsciiNotAllowed,
    /// Unicode content not presented in `xn--` punycode form.
    UnicodeMustUsePunycode,
    /// The `xn--` payload did not decode as punycode.
    InvalidPunycode,
    /// The decoded text contains zero-width or BOM codepoints.
    HasInvisible,
    /// The decoded text mixes more than one confusable script.
    MixedScripts,
    /// The label is entirely numeric.
    AllNumeric,
}

/// Outcome of screening one label.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LabelVerdict {
    pub safe: bool,
    pub reasons: Vec<LabelReason>,
}

impl LabelVerdict {
    fn safe() -> Self {
        Self {
            safe: true,
            reasons: Vec::new(),
        }
    }

    fn unsafe_because(reasons: Vec<LabelReason>) -> Self {
        debug_assert!(!reasons.is_empty());
        Self {
            safe: false,
            reasons,
        }
    }
}

/// Screen a single label.
///
/// The label is lowercased before any check. ASCII letter-digit-hyphen
/// labels pass directly unless entirely numeric; anything else is gated on
/// `allow_unicode` and must round-trip through punycode.
///
/// # Examples
///
/// ```
/// # use backend::domain::label::{check_label, LabelReason};
/// assert!(check_label("example", false).safe);
/// assert_eq!(
///     check_label("12345", false).reasons,
///     vec![LabelReason::AllNumeric]
/// );
/// ```
pub fn check_label(label: &str, allow_unicode: bool) -> LabelVerdict {
    let label = label.to_lowercase();

    let mut shape_reasons = Vec::new();
    let char_count = label.chars().count();
    if !(1..=MAX_LABEL_LEN).contains(&char_count) {
        shape_reasons.push(LabelReason::InvalidLength);
    }
    if label.starts_with('-') || label.ends_with('-') {
        shape_reasons.push(LabelReason::InvalidHyphenPosition);
    }
    if !shape_reasons.is_empty() {
        return LabelVerdict::unsafe_because(shape_reasons);
    }

    // Punycode labels are ASCII on the wire but carry Unicode content, so
    // they skip the fast path and face the homograph screening below.
    let is_punycode = label.starts_with("xn--");
    if is_ascii_ldh(&label) && !is_punycode {
        if label.chars().all(|ch| ch.is_ascii_digit()) {
            return LabelVerdict::unsafe_because(vec![LabelReason::AllNumeric]);
        }
        return LabelVerdict::safe();
    }

    if !allow_unicode {
        return LabelVerdict::unsafe_because(vec![LabelReason::NonAsciiNotAllowed]);
    }

    let Some(payload) = label.strip_prefix("xn--") else {
        return LabelVerdict::unsafe_because(vec![LabelReason::UnicodeMustUsePunycode]);
    };

    let Some(decoded) = idna::punycode::decode(payload) else {
        return LabelVerdict::unsafe_because(vec![LabelReason::InvalidPunycode]);
    };

    let mut reasons = Vec::new();
    if decoded
        .iter()
        .any(|ch| INVISIBLE_CODEPOINTS.contains(ch))
    {
        reasons.push(LabelReason::HasInvisible);
    }
    if confusable_script_count(&decoded) > 1 {
        reasons.push(LabelReason::MixedScripts);
    }

    if reasons.is_empty() {
        LabelVerdict::safe()
    } else {
        LabelVerdict::unsafe_because(reasons)
    }
}

fn is_ascii_ldh(label: &str) -> bool {
    label
        .chars()
        .all(|ch| ch.is_ascii_lowercase() || ch.is_ascii_digit() || ch == '-')
}

fn confusable_script_count(chars: &[char]) -> usize {
    let mut seen = [false; CONFUSABLE_SCRIPTS.len()];
    for ch in chars {
        if let Some(idx) = CONFUSABLE_SCRIPTS
            .iter()
            .position(|script| *script == ch.script())
        {
            seen[idx] = true;
        }
    }
    seen.iter().filter(|flag| **flag).count()
}
