//! Zero-copy query-string parser writing directly into a request's fixed
//! query-pair arrays.

use crate::errors::ErrorKind;
use memchr::memchr;

/// Fixed capacity of the query arrays in [`Request`](crate::Request).
pub(crate) const MAX_QUERY_PARTS: usize = 8;

/// Parses `query` (the bytes after `?`, with no leading `?`) into `names`
/// and `values`, up to `limit` pairs (never more than [`MAX_QUERY_PARTS`]).
///
/// Each pair is split on `&`, then on the first `=`. A pair without `=` is
/// `MalformedRequest` — unlike a bare key, which RFC 9112 doesn't define, the
/// wire contract here requires both sides present. Duplicates are kept in
/// order. Returns the number of pairs written.
#[inline]
pub(crate) fn parse_into(
    query: &'static [u8],
    limit: usize,
    names: &mut [&'static [u8]; MAX_QUERY_PARTS],
    values: &mut [&'static [u8]; MAX_QUERY_PARTS],
) -> Result<usize, ErrorKind> {
    if query.is_empty() {
        return Ok(0);
    }

    let limit = limit.min(MAX_QUERY_PARTS);
    let mut rest = query;
    let mut count = 0;

    loop {
        let (pair, remainder) = match memchr(b'&', rest) {
            Some(pos) => (&rest[..pos], Some(&rest[pos + 1..])),
            None => (rest, None),
        };

        if count >= limit {
            return Err(ErrorKind::LimitExceeded);
        }

        let eq = memchr(b'=', pair).ok_or(ErrorKind::MalformedRequest)?;
        names[count] = &pair[..eq];
        values[count] = &pair[eq + 1..];
        count += 1;

        match remainder {
            Some(r) => rest = r,
            None => break,
        }
    }

    Ok(count)
}
