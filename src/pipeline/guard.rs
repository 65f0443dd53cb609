//! Listing guard.
//!
//! Rejects a listing that is suspiciously small compared with what the
//! store already holds for the sync window, treating it as a failed poll
//! instead of as the source's real state.

use crate::error::{AppError, Result};
use crate::models::ListingGuardConfig;

/// Listing guard over [`ListingGuardConfig`] thresholds.
#[derive(Debug, Clone)]
pub struct ListingGuard {
    config: ListingGuardConfig,
}

/// Result of a guard check.
#[derive(Debug, Clone, PartialEq)]
pub enum GuardVerdict {
    /// Safe to proceed
    Safe { listed: usize, baseline: usize },
    /// Too few stored records to judge
    ColdStart { listed: usize },
    /// Checking is switched off
    Disabled,
    /// Listing shrank beyond the allowed drop
    Triggered {
        listed: usize,
        baseline: usize,
        drop_percent: f64,
    },
    /// Listing is empty while the window is not
    EmptyListing { baseline: usize },
}

impl Default for ListingGuard {
    fn default() -> Self {
        Self::with_config(ListingGuardConfig::default())
    }
}

impl ListingGuard {
    pub fn with_config(config: ListingGuardConfig) -> Self {
        Self { config }
    }

    /// Compare the listing size with the stored-in-window count.
    pub fn check(&self, listed: usize, baseline: usize) -> GuardVerdict {
        if !self.config.enabled {
            return GuardVerdict::Disabled;
        }

        // Cold start (new deployment or quiet window)
        if baseline < self.config.min_baseline.max(1) {
            return GuardVerdict::ColdStart { listed };
        }

        if listed == 0 {
            return GuardVerdict::EmptyListing { baseline };
        }

        if listed < baseline {
            let drop_percent = ((baseline - listed) as f64 / baseline as f64) * 100.0;
            if drop_percent > f64::from(self.config.max_drop_percent) {
                return GuardVerdict::Triggered {
                    listed,
                    baseline,
                    drop_percent,
                };
            }
        }

        GuardVerdict::Safe { listed, baseline }
    }

    /// Ok if the listing may be used, a listing failure otherwise.
    pub fn validate(&self, listed: usize, baseline: usize) -> Result<()> {
        match self.check(listed, baseline) {
            GuardVerdict::Safe { listed, baseline } => {
                log::debug!("Listing guard: safe ({} listed, {} in window)", listed, baseline);
                Ok(())
            }
            GuardVerdict::ColdStart { listed } => {
                log::debug!("Listing guard: cold start ({} listed)", listed);
                Ok(())
            }
            GuardVerdict::Disabled => Ok(()),
            GuardVerdict::Triggered {
                listed,
                baseline,
                drop_percent,
            } => {
                log::error!(
                    "Listing guard: TRIGGERED! {} in window → {} listed ({:.1}% drop > {}% threshold)",
                    baseline,
                    listed,
                    drop_percent,
                    self.config.max_drop_percent
                );
                Err(AppError::listing(format!(
                    "listing dropped {:.1}% ({} → {})",
                    drop_percent, baseline, listed
                )))
            }
            GuardVerdict::EmptyListing { baseline } => {
                log::error!(
                    "Listing guard: empty listing while {} records are in the window",
                    baseline
                );
                Err(AppError::listing("empty listing"))
            }
        }
    }
}
