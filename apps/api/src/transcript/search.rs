//! First-match search over an ordered candidate list.

use std::future::Future;

/// Result of probing a single candidate.
#[derive(Debug)]
pub enum Attempt<T> {
    /// Stop searching and return this value.
    Hit(T),
    /// Try the next candidate; the reason is kept for diagnostics.
    Miss(String),
}

/// Every candidate missed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Exhausted {
    pub attempts: usize,
    pub last_error: Option<String>,
}

impl Exhausted {
    pub fn describe(&self) -> String {
        match &self.last_error {
            Some(err) => format!("{} attempts failed. Last error: {err}", self.attempts),
            None => "no candidates to try".to_string(),
        }
    }
}

/// Probes `candidates` in order, one at a time, and returns the first hit.
/// A single pass: no delay between probes and no second round.
pub async fn first_match<'a, C, T, F, Fut>(candidates: &'a [C], mut probe: F) -> Result<T, Exhausted>
where
    F: FnMut(&'a C) -> Fut,
    Fut: Future<Output = Attempt<T>>,
{
    let mut last_error = None;

    for candidate in candidates {
        match probe(candidate).await {
            Attempt::Hit(value) => return Ok(value),
            Attempt::Miss(reason) => last_error = Some(reason),
        }
    }

    Err(Exhausted {
        attempts: candidates.len(),
        last_error,
    })
}
