//! Household census over the remote directory.
//!
//! Counts active households by how many of their members are adults. A
//! household is active when at least one member is; a member is counted as
//! an adult when they are at or over the minimum age or have no birthdate.

use crate::Result;
use crate::models::{Household, PersonStatus, RemoteId};
use crate::remote::HouseholdDirectory;
use crate::services::normalize::RecordNormalizer;
use chrono::{Local, NaiveDate};
use std::collections::BTreeMap;
use std::fmt;
use std::sync::Arc;
use tracing::instrument;

/// Census results.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct HouseholdReport {
    /// Minimum age counted as an adult.
    pub min_adult_age: u32,
    /// Number of active households keyed by adult member count.
    pub by_adult_count: BTreeMap<usize, usize>,
    /// Active members across active households.
    pub active_members: usize,
    /// Adult members across active households.
    pub adult_members: usize,
    /// Active households with at least the large-household adult count.
    pub large_households: Vec<RemoteId>,
}

impl HouseholdReport {
    /// Number of active households.
    #[must_use]
    pub fn active_households(&self) -> usize {
        self.by_adult_count.values().sum()
    }
}

impl fmt::Display for HouseholdReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "{} active households", self.active_households())?;
        for (adults, households) in &self.by_adult_count {
            writeln!(
                f,
                "  {households:>6} households with {adults} people aged {} or over",
                self.min_adult_age
            )?;
        }
        writeln!(
            f,
            "{} active people in households aged {} or over",
            self.adult_members, self.min_adult_age
        )?;
        writeln!(f, "{} active people in households", self.active_members)?;
        for id in &self.large_households {
            writeln!(f, "  large household: {id}")?;
        }
        Ok(())
    }
}

/// Tallies remote households.
pub struct HouseholdCensus<H: HouseholdDirectory> {
    directory: Arc<H>,
    min_adult_age: u32,
    large_household: usize,
    today: NaiveDate,
}

impl<H: HouseholdDirectory> HouseholdCensus<H> {
    /// Default minimum adult age.
    pub const DEFAULT_MIN_ADULT_AGE: u32 = 16;

    /// Default adult count from which a household is reported as large.
    pub const DEFAULT_LARGE_HOUSEHOLD: usize = 7;

    /// Creates a census with default thresholds.
    #[must_use]
    pub fn new(directory: Arc<H>) -> Self {
        Self {
            directory,
            min_adult_age: Self::DEFAULT_MIN_ADULT_AGE,
            large_household: Self::DEFAULT_LARGE_HOUSEHOLD,
            today: Local::now().date_naive(),
        }
    }

    /// Sets the minimum adult age.
    #[must_use]
    pub const fn with_min_adult_age(mut self, age: u32) -> Self {
        self.min_adult_age = age;
        self
    }

    /// Sets the large-household threshold.
    #[must_use]
    pub const fn with_large_household(mut self, adults: usize) -> Self {
        self.large_household = adults;
        self
    }

    /// Pins the date ages are computed on.
    #[must_use]
    pub const fn with_today(mut self, today: NaiveDate) -> Self {
        self.today = today;
        self
    }

    /// Fetches every household and tallies them.
    ///
    /// # Errors
    ///
    /// Returns an error if the households cannot be listed.
    #[instrument(skip(self))]
    pub fn run(&self) -> Result<HouseholdReport> {
        let households = self.directory.households()?;
        tracing::info!(households = households.len(), "Fetched households");
        Ok(self.tally(&households))
    }

    /// Tallies already-fetched households.
    #[must_use]
    pub fn tally(&self, households: &[Household]) -> HouseholdReport {
        let mut report = HouseholdReport {
            min_adult_age: self.min_adult_age,
            ..HouseholdReport::default()
        };

        for household in households {
            let active = household
                .members
                .iter()
                .filter(|m| m.status == PersonStatus::Active)
                .count();
            if active == 0 {
                continue;
            }

            let adults = household
                .members
                .iter()
                .filter(|m| {
                    m.birthdate.is_none_or(|birthdate| {
                        RecordNormalizer::age_on(birthdate, self.today) >= self.min_adult_age
                    })
                })
                .count();

            *report.by_adult_count.entry(adults).or_insert(0) += 1;
            report.active_members += active;
            report.adult_members += adults;
            if adults >= self.large_household {
                report.large_households.push(household.id.clone());
            }
        }
        report
    }
}
