//! Response direction: relay headers → origin status, headers and cookies.

use crate::protocol::{fields, HeaderList, ESCAPE_PREFIX};

/// Decoded form of a relay response.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RelayResponseInfo {
    /// Origin status; differs from the relay's transport status when `--s`
    /// is present.
    pub status: u16,
    pub headers: HeaderList,
    /// Raw `set-cookie` strings, kept apart because merging them is lossy.
    pub cookie_strs: Vec<String>,
}

/// Split a duplicate-slot name `N-name` into `name`.
fn duplicate_slot(name: &str) -> Option<&str> {
    let (index, rest) = name.split_once('-')?;
    if index.is_empty() || rest.is_empty() || !index.bytes().all(|b| b.is_ascii_digit()) {
        return None;
    }
    Some(rest)
}

/// Decode the headers a relay returned for `transport_status`.
pub fn decode_response_headers(transport_status: u16, raw: &HeaderList) -> RelayResponseInfo {
    let mut status = transport_status;
    let mut headers = HeaderList::new();
    let mut cookie_strs = Vec::new();

    for (key, val) in raw.iter() {
        if key == "access-control-allow-origin" || key == "access-control-expose-headers" {
            continue;
        }
        if key == fields::STATUS {
            match val.trim().parse::<u16>() {
                Ok(s) => status = s,
                Err(_) => tracing::warn!(value = %val, "Ignoring malformed status override"),
            }
            continue;
        }
        if key == fields::PROBE {
            continue;
        }

        //  0-key: v1
        //  1-key: v2
        if let Some(name) = duplicate_slot(key) {
            if name == "set-cookie" {
                cookie_strs.push(val.to_string());
            } else {
                headers.append(name, val);
            }
            continue;
        }

        let key = key.strip_prefix(ESCAPE_PREFIX).unwrap_or(key);

        if key == "set-cookie" {
            cookie_strs.push(val.to_string());
            continue;
        }

        if key == "vary" {
            if val == fields::VARY_KEY {
                continue;
            }
            let cleaned = val.replacen(&format!("{},", fields::VARY_KEY), "", 1);
            headers.set(key, cleaned);
            continue;
        }

        headers.set(key, val);
    }

    RelayResponseInfo {
        status,
        headers,
        cookie_strs,
    }
}
