//! Profile id formatting.
//!
//! The authority sends ids as bare hex (`"069a79f444e94726a5befca90e38aaf5"`);
//! everything downstream wants the hyphenated UUID form.

use authgate_protocol::PlayerId;
use uuid::Uuid;

use crate::VerifyError;

/// Inserts hyphens after the 8th, 12th, 16th and 20th characters.
///
/// Purely textual: the input is not validated, and whatever follows the
/// fourth group is kept as the last group however long it is. Inputs that
/// already contain hyphens or non-ASCII characters come back unchanged.
pub fn hyphenate_id(raw: &str) -> String {
    if !raw.is_ascii() || raw.contains('-') {
        return raw.to_string();
    }

    let mut out = String::with_capacity(raw.len() + 4);
    let mut rest = raw;
    for width in [8, 4, 4, 4] {
        if rest.len() <= width {
            break;
        }
        let (group, tail) = rest.split_at(width);
        out.push_str(group);
        out.push('-');
        rest = tail;
    }
    out.push_str(rest);
    out
}

/// Parses a profile id in bare or hyphenated form into a [`PlayerId`].
///
/// # Errors
/// [`VerifyError::InvalidId`] unless the input is exactly one UUID.
pub fn parse_profile_id(raw: &str) -> Result<PlayerId, VerifyError> {
    let canonical = hyphenate_id(raw.trim());
    Uuid::try_parse(&canonical)
        .map(PlayerId)
        .map_err(|_| VerifyError::InvalidId(raw.to_string()))
}
