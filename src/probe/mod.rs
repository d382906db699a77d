//! Page-count discovery by probing a CDN path pattern
//!
//! Some sources never state how many pages a chapter has, but serve page
//! `n` at a predictable URL. The resolver finds the last existing page with
//! an exponential phase followed by a binary search, so a chapter of `K`
//! pages costs `O(log K)` existence probes.
//!
//! Discovery itself reports the exact boundary (or nothing). The guard
//! rails (fallback count when nothing was found, sanity ceiling) are applied
//! by [`PageCountResolver::resolve`].

mod cdn;

use async_trait::async_trait;

use crate::config::ProbeConfig;

pub use cdn::{CdnProbe, PageUrlPattern};

/// Answers whether page `n` (1-based) of one chapter exists
///
/// Implementations must map timeouts and transport errors to `false`.
#[async_trait]
pub trait PageProbe: Send + Sync {
    async fn exists(&self, page: u32) -> bool;
}

/// Finds the number of the last existing page
///
/// # Arguments
///
/// * `probe` - Existence test for one chapter
/// * `start` - First page of the exponential phase
/// * `ceiling` - Hard upper bound; a chapter reaching it reports `ceiling`
///
/// # Returns
///
/// * `Some(k)` - Pages `1..=k` exist and `k + 1` does not (or `k == ceiling`)
/// * `None` - Not even the first page exists
pub async fn discover_page_count<P: PageProbe + ?Sized>(
    probe: &P,
    start: u32,
    ceiling: u32,
) -> Option<u32> {
    let ceiling = ceiling.max(1);
    let mut probes = 0u32;

    // Largest page known to exist (0 = none yet) and smallest known missing
    let mut low = 0u32;
    let mut high;
    let mut n = start.clamp(1, ceiling);

    loop {
        probes += 1;
        if probe.exists(n).await {
            low = n;
            if n >= ceiling {
                tracing::debug!("Page probe reached ceiling {} after {} probes", ceiling, probes);
                return Some(ceiling);
            }
            n = n.saturating_mul(2).min(ceiling);
        } else {
            high = n;
            break;
        }
    }

    while high - low > 1 {
        let mid = low + (high - low) / 2;
        probes += 1;
        if probe.exists(mid).await {
            low = mid;
        } else {
            high = mid;
        }
    }

    tracing::debug!("Page probe found {} pages after {} probes", low, probes);
    (low > 0).then_some(low)
}

/// Applies the fallback and sanity ceiling to a page count
pub fn apply_guard_rails(count: Option<u32>, limits: &ProbeConfig) -> u32 {
    match count {
        None | Some(0) => {
            tracing::warn!(
                "Could not determine page count, using fallback of {}",
                limits.fallback_pages
            );
            limits.fallback_pages
        }
        Some(n) if n > limits.sanity_ceiling => {
            tracing::warn!(
                "Unusually high page count ({}), capping at {}",
                n,
                limits.sanity_ceiling
            );
            limits.sanity_ceiling
        }
        Some(n) => n,
    }
}

/// Resolves chapter lengths: metadata hint, then probing, then fallback
#[derive(Debug, Clone)]
pub struct PageCountResolver {
    limits: ProbeConfig,
}

impl PageCountResolver {
    pub fn new(limits: ProbeConfig) -> Self {
        Self { limits }
    }

    /// Returns a usable page count; never 0 and never above the sanity ceiling
    ///
    /// A positive `hint` (e.g. parsed from the chapter page) skips probing.
    pub async fn resolve<P: PageProbe + ?Sized>(&self, hint: Option<u32>, probe: &P) -> u32 {
        let discovered = match hint.filter(|n| *n > 0) {
            Some(n) => Some(n),
            None => discover_page_count(probe, self.limits.start_page, self.limits.ceiling).await,
        };
        apply_guard_rails(discovered, &self.limits)
    }

    /// Like [`resolve`](Self::resolve), trying mirror probes in order
    ///
    /// # Returns
    ///
    /// The index of the first probe that found any page (0 when a hint was
    /// used or no probe found pages) and the guarded page count.
    pub async fn resolve_with_mirrors<P: PageProbe>(
        &self,
        hint: Option<u32>,
        probes: &[P],
    ) -> (usize, u32) {
        if let Some(n) = hint.filter(|n| *n > 0) {
            return (0, apply_guard_rails(Some(n), &self.limits));
        }

        for (index, probe) in probes.iter().enumerate() {
            let found =
                discover_page_count(probe, self.limits.start_page, self.limits.ceiling).await;
            if found.is_some() {
                return (index, apply_guard_rails(found, &self.limits));
            }
            tracing::debug!("Mirror {} has no pages, trying next", index);
        }

        (0, apply_guard_rails(None, &self.limits))
    }
}
