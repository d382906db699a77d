use regex::{Captures, Regex};
use std::sync::OnceLock;

use super::UnpackError;

/// Marker left by every packed script
const PACKER_MARKER: &str = "eval(function(p,a,c,k,e,";

fn packer_args() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(r"\}\('((?:[^'\\]|\\.)*)',\s*(\d+),\s*(\d+),\s*'((?:[^'\\]|\\.)*)'")
            .expect("packer argument pattern is valid")
    })
}

fn identifier() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"\b\w+\b").expect("identifier pattern is valid"))
}

/// Whether the text looks like a packed script
pub fn is_packed(text: &str) -> bool {
    text.contains(PACKER_MARKER)
}

/// The four arguments handed to the packer's decoding function
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PackedPayload {
    pub code: String,
    pub base: u32,
    pub count: usize,
    pub dictionary: Vec<String>,
}

impl PackedPayload {
    /// Pulls the packer arguments out of a script
    pub fn parse(script: &str) -> Result<Self, UnpackError> {
        let caps = packer_args()
            .captures(script)
            .ok_or(UnpackError::NoPackerPayload)?;

        let base = caps[2]
            .parse::<u32>()
            .map_err(|_| UnpackError::NoPackerPayload)?;
        let count = caps[3]
            .parse::<usize>()
            .map_err(|_| UnpackError::NoPackerPayload)?;
        if !(2..=62).contains(&base) {
            return Err(UnpackError::UnsupportedBase(base));
        }

        Ok(Self {
            code: unescape(&caps[1]),
            base,
            count,
            dictionary: unescape(&caps[4]).split('|').map(str::to_string).collect(),
        })
    }

    /// Replaces every whole-word token with its dictionary entry
    ///
    /// Tokens are read as numbers in the payload's base (`0-9`, then `a-z`,
    /// then `A-Z`). Indices past `count`, past the dictionary, or with an
    /// empty entry keep the original token. Substitution happens in one pass,
    /// so replacement text is never substituted again.
    pub fn decode(&self) -> String {
        identifier()
            .replace_all(&self.code, |caps: &Captures| {
                let token = &caps[0];
                decode_token(token, self.base)
                    .filter(|index| *index < self.count)
                    .and_then(|index| self.dictionary.get(index))
                    .filter(|word| !word.is_empty())
                    .cloned()
                    .unwrap_or_else(|| token.to_string())
            })
            .into_owned()
    }
}

/// Unpacks a packed script into its original source text
///
/// # Examples
///
/// ```
/// use manga_conduit::unpack::unpack;
///
/// let script = "eval(function(p,a,c,k,e,d){}('0 1=\"2\";',3,3,'var|pix|cdn'.split('|'),0,{}))";
/// assert_eq!(unpack(script).unwrap(), "var pix=\"cdn\";");
/// ```
pub fn unpack(script: &str) -> Result<String, UnpackError> {
    let payload = PackedPayload::parse(script)?;
    tracing::debug!(
        "Unpacking script: base {}, {} words, {} dictionary entries",
        payload.base,
        payload.count,
        payload.dictionary.len()
    );
    Ok(payload.decode())
}

/// Reads a token as a number in `base`
pub fn decode_token(token: &str, base: u32) -> Option<usize> {
    let mut value: usize = 0;
    for c in token.chars() {
        let digit = match c {
            '0'..='9' => c as u32 - '0' as u32,
            'a'..='z' => c as u32 - 'a' as u32 + 10,
            'A'..='Z' => c as u32 - 'A' as u32 + 36,
            _ => return None,
        };
        if digit >= base {
            return None;
        }
        value = value
            .checked_mul(base as usize)?
            .checked_add(digit as usize)?;
    }
    Some(value)
}

fn unescape(raw: &str) -> String {
    let mut out = String::with_capacity(raw.len());
    let mut chars = raw.chars();
    while let Some(c) = chars.next() {
        if c == '\\' {
            match chars.next() {
                Some(next @ ('\'' | '\\' | '"')) => out.push(next),
                Some(next) => {
                    out.push('\\');
                    out.push(next);
                }
                None => out.push('\\'),
            }
        } else {
            out.push(c);
        }
    }
    out
}
