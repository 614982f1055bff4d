//! `Accept` header negotiation.

use http::header::ACCEPT;
use http::HeaderMap;
use mediatype::{MediaTypeList, Name, ReadParams};

pub const APPLICATION_JSON: &str = "application/json";
pub const TEXT_HTML: &str = "text/html";

const Q: Name<'static> = Name::new_unchecked("q");

#[derive(Debug, Clone, Copy)]
struct Priority {
    q: f32,
    specificity: u8,
    order: usize,
}

/// Picks the candidate media type the client prefers.
///
/// Candidates are ranked by quality, then by how specifically an `Accept`
/// entry names them, then by entry order, then by candidate order. Without an
/// `Accept` header the first candidate wins; unparseable entries are ignored.
pub fn preferred<'c>(headers: &HeaderMap, candidates: &[&'c str]) -> Option<&'c str> {
    let accept = headers
        .get_all(ACCEPT)
        .iter()
        .filter_map(|value| value.to_str().ok())
        .collect::<Vec<_>>()
        .join(",");

    if accept.trim().is_empty() {
        return candidates.first().copied();
    }

    let entries: Vec<(String, String, f32)> = MediaTypeList::new(&accept)
        .filter_map(Result::ok)
        .map(|mime| {
            let q = mime
                .get_param(Q)
                .and_then(|value| value.as_str().parse::<f32>().ok())
                .unwrap_or(1.0);
            (
                mime.ty.as_str().to_ascii_lowercase(),
                mime.subty.as_str().to_ascii_lowercase(),
                q,
            )
        })
        .collect();

    let mut ranked: Vec<(usize, &'c str, Priority)> = candidates
        .iter()
        .enumerate()
        .filter_map(|(index, candidate)| {
            let (ty, subty) = candidate.split_once('/')?;
            let priority = best_match(&entries, ty, subty)?;
            (priority.q > 0.0).then_some((index, *candidate, priority))
        })
        .collect();

    ranked.sort_by(|(ai, _, a), (bi, _, b)| {
        b.q.total_cmp(&a.q)
            .then(b.specificity.cmp(&a.specificity))
            .then(a.order.cmp(&b.order))
            .then(ai.cmp(bi))
    });

    ranked.first().map(|(_, candidate, _)| *candidate)
}

/// The `Accept` entry that best describes a candidate: the most specific
/// one, then the highest quality, then the last listed.
fn best_match(entries: &[(String, String, f32)], ty: &str, subty: &str) -> Option<Priority> {
    let mut best: Option<Priority> = None;

    for (order, (entry_ty, entry_subty, q)) in entries.iter().enumerate() {
        let mut specificity = 0;
        if entry_ty == ty {
            specificity |= 4;
        } else if entry_ty != "*" {
            continue;
        }
        if entry_subty == subty {
            specificity |= 2;
        } else if entry_subty != "*" {
            continue;
        }

        let candidate = Priority {
            q: *q,
            specificity,
            order,
        };
        let replace = best.map_or(true, |current| {
            current
                .specificity
                .cmp(&candidate.specificity)
                .then(current.q.total_cmp(&candidate.q))
                .then(current.order.cmp(&candidate.order))
                .is_lt()
        });
        if replace {
            best = Some(candidate);
        }
    }

    best
}

/// Returns true when the client prefers HTML over JSON.
pub fn prefers_html(headers: &HeaderMap) -> bool {
    preferred(headers, &[APPLICATION_JSON, TEXT_HTML]) == Some(TEXT_HTML)
}
