//! Cookie header plumbing: reading the request `Cookie` header and
//! appending `Set-Cookie` to response headers.

use http::header::{COOKIE, SET_COOKIE};
use http::{HeaderMap, HeaderValue};

use crate::config::SessionOptions;
use crate::error::{CodecError, SessionError};

/// Find the value of the named cookie on the request headers.
pub(crate) fn request_cookie(headers: &HeaderMap, name: &str) -> Option<String> {
	headers
		.get_all(COOKIE)
		.iter()
		.filter_map(|h| h.to_str().ok())
		.flat_map(parse_cookies)
		.find_map(|(n, v)| if n == name { Some(v) } else { None })
}

/// Parse a Cookie header with strict validation.
///
/// Rejects malformed pairs:
/// - Missing `=` separator
/// - Empty cookie name
/// - Cookie name containing separators, whitespace, or control chars
fn parse_cookies(header: &str) -> Vec<(String, String)> {
	let mut cookies = Vec::new();
	for cookie in header.split(';') {
		let cookie = cookie.trim();
		if cookie.is_empty() {
			continue;
		}
		let mut parts = cookie.splitn(2, '=');
		let name = match parts.next() {
			Some(n) => n.trim(),
			None => continue,
		};
		let value = match parts.next() {
			Some(v) => v.trim(),
			None => continue,
		};
		if name.is_empty() || !is_valid_cookie_name(name) {
			continue;
		}
		cookies.push((name.to_string(), value.to_string()));
	}
	cookies
}

/// Validate a cookie name per RFC 6265: visible ASCII, no separators.
fn is_valid_cookie_name(name: &str) -> bool {
	name.chars().all(|c| {
		let code = c as u32;
		(0x21..=0x7E).contains(&code)
			&& !matches!(
				c,
				'(' | ')'
					| '<' | '>' | '@' | ','
					| ';' | ':' | '\\' | '"'
					| '/' | '[' | ']' | '?'
					| '=' | '{' | '}' | ' '
					| '\t'
			)
	})
}

/// Build the Set-Cookie header value for a session cookie.
pub(crate) fn build_set_cookie(name: &str, value: &str, opts: &SessionOptions) -> String {
	let mut parts = vec![format!("{}={}", name, value)];

	parts.push(format!("Path={}", opts.path));

	if let Some(domain) = &opts.domain {
		parts.push(format!("Domain={}", domain));
	}

	if opts.http_only {
		parts.push("HttpOnly".to_string());
	}

	if opts.secure {
		parts.push("Secure".to_string());
	}

	if let Some(same_site) = &opts.same_site {
		parts.push(format!("SameSite={}", same_site));
	}

	parts.push(format!("Max-Age={}", opts.max_age));

	parts.join("; ")
}

/// Append a Set-Cookie header to the response headers.
pub(crate) fn append_set_cookie(
	headers: &mut HeaderMap,
	name: &str,
	value: &str,
	opts: &SessionOptions,
) -> Result<(), SessionError> {
	let cookie = build_set_cookie(name, value, opts);
	let header = HeaderValue::from_str(&cookie).map_err(|e| {
		SessionError::Codec(CodecError::Encoding(format!(
			"invalid Set-Cookie header: {}",
			e
		)))
	})?;
	headers.append(SET_COOKIE, header);
	Ok(())
}
