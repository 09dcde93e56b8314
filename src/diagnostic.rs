//! Diagnostics emitted when collision patterns force a table to grow.
//!
//! These never indicate incorrect results. They exist so pathological key
//! distributions can be spotted in production. Install a hook with
//! `on_diagnostic` to receive them; without a hook they go to the `log` crate
//! when the `log` feature is enabled and are dropped otherwise.

use core::fmt;

/// Why a placement stalled and the table had to grow.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Diagnostic {
    /// Appending to a chain would have exceeded
    /// [`MAX_CHAIN_HOPS`](crate::tail_index::MAX_CHAIN_HOPS).
    ChainOverflow {
        /// Key being placed.
        key: i32,
        /// Home bucket of the key.
        home: usize,
        /// Hops in the chain at the time of the stall.
        hops: usize,
        /// Bucket count before growing.
        capacity: usize,
    },
    /// Every probe offset from the chain's last entry was held by an entry
    /// that outranks the new one.
    ProbeExhausted {
        /// Key being placed.
        key: i32,
        /// Home bucket of the key.
        home: usize,
        /// Bucket count before growing.
        capacity: usize,
    },
    /// Relocating displaced entries did not converge within the placement
    /// budget.
    RelocationLimit {
        /// Entries still waiting to be placed.
        queued: usize,
        /// Bucket count before growing.
        capacity: usize,
    },
}

impl fmt::Display for Diagnostic {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Diagnostic::ChainOverflow {
                key,
                home,
                hops,
                capacity,
            } => write!(
                f,
                "collision chain at bucket {home} reached {hops} hops placing key {key} (capacity {capacity})"
            ),
            Diagnostic::ProbeExhausted {
                key,
                home,
                capacity,
            } => write!(
                f,
                "no free probe slot for key {key} in chain at bucket {home} (capacity {capacity})"
            ),
            Diagnostic::RelocationLimit { queued, capacity } => write!(
                f,
                "relocation did not settle with {queued} entries queued (capacity {capacity})"
            ),
        }
    }
}

/// Fallback used when no diagnostic hook is installed.
pub(crate) fn default_sink(diagnostic: &Diagnostic, dump: impl FnOnce() -> alloc::string::String) {
    cfg_if::cfg_if! {
        if #[cfg(feature = "log")] {
            log::warn!("{diagnostic}; growing table");
            if log::log_enabled!(log::Level::Trace) {
                log::trace!("table before growing:\n{}", dump());
            }
        } else {
            let _ = (diagnostic, dump);
        }
    }
}

#[cfg(test)]
mod tests {
    use alloc::string::ToString;

    use super::*;

    #[test]
    fn display_names_the_bucket_and_key() {
        let text = Diagnostic::ChainOverflow {
            key: 42,
            home: 7,
            hops: 15,
            capacity: 64,
        }
        .to_string();
        assert!(text.contains("bucket 7"));
        assert!(text.contains("key 42"));
        assert!(text.contains("15 hops"));
    }

    #[test]
    fn default_sink_accepts_any_diagnostic() {
        default_sink(
            &Diagnostic::RelocationLimit {
                queued: 3,
                capacity: 8,
            },
            || "dump".to_string(),
        );
    }
}
