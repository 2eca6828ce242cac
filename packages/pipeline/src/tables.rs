//! Year-partitioned access to a table source.
//!
//! A `per_year` source is read fresh for every partition. A `path` or
//! `paths` source is read once, its files concatenated in order, split by
//! record year, and handed out one year at a time; issues are attributed
//! to the year of the row they came from, and issues on rows that never
//! became records (bad dates, undecodable rows) stay with their file.

use std::{
    collections::{BTreeMap, HashMap},
    path::{Path, PathBuf},
};

use chrono::{Datelike, NaiveDate};
use wildfire_aqi_observation_models::{
    CollectingDiagnostics, Dataset, Diagnostics, ExclusionCounts, PointObservation,
    WildfireEvent,
};
use wildfire_aqi_pipeline_models::{SourceReport, TableSource};
use wildfire_aqi_source::{LoadedTable, ReadOptions, SourceError};

/// A parsed source row with a date and a source row number.
pub trait SourceRecord {
    /// 1-based source row.
    fn row(&self) -> usize;
    /// Record date.
    fn date(&self) -> NaiveDate;
}

impl SourceRecord for PointObservation {
    fn row(&self) -> usize {
        self.row
    }

    fn date(&self) -> NaiveDate {
        self.date
    }
}

impl SourceRecord for WildfireEvent {
    fn row(&self) -> usize {
        self.row
    }

    fn date(&self) -> NaiveDate {
        self.date
    }
}

/// Reader signature shared by the source readers.
pub type ReadFn<T> =
    fn(&Path, &ReadOptions, &dyn Diagnostics) -> Result<LoadedTable<T>, SourceError>;

/// One partition's rows.
#[derive(Debug)]
pub struct PartitionRows<T> {
    /// Records of the partition, in source order.
    pub records: Vec<T>,
    /// Data rows attributed to the partition.
    pub rows_read: usize,
    /// Issues attributed to the partition.
    pub exclusions: ExclusionCounts,
}

impl<T> Default for PartitionRows<T> {
    fn default() -> Self {
        Self {
            records: Vec::new(),
            rows_read: 0,
            exclusions: ExclusionCounts::default(),
        }
    }
}

/// Rows of a multi-year source, by record year.
type YearRows<T> = BTreeMap<i32, PartitionRows<T>>;

/// Hands out partition rows from a [`TableSource`].
pub struct TableLoader<'a, T> {
    dataset: Dataset,
    source: &'a TableSource,
    options: ReadOptions,
    read: ReadFn<T>,
    diagnostics: &'a dyn Diagnostics,
    all_years: Option<YearRows<T>>,
    reports: Vec<SourceReport>,
}

impl<'a, T: SourceRecord> TableLoader<'a, T> {
    /// Creates a loader; nothing is read until [`Self::load`].
    pub fn new(
        dataset: Dataset,
        source: &'a TableSource,
        options: ReadOptions,
        read: ReadFn<T>,
        diagnostics: &'a dyn Diagnostics,
    ) -> Self {
        Self {
            dataset,
            source,
            options,
            read,
            diagnostics,
            all_years: None,
            reports: Vec::new(),
        }
    }

    /// Rows of `year`.
    ///
    /// A failed read of a multi-year source is not cached, so every
    /// partition reports the failure itself.
    ///
    /// # Errors
    ///
    /// Returns the reader's [`SourceError`] when a file is missing,
    /// unreadable, or fails schema validation.
    pub fn load(&mut self, year: i32) -> Result<PartitionRows<T>, SourceError> {
        if let TableSource::PerYear(_) = self.source {
            let mut partition = PartitionRows::default();
            for path in &self.source.files(year) {
                let table = (self.read)(path, &self.options, self.diagnostics)?;
                partition.records.extend(table.records);
                partition.rows_read += table.rows_read;
                partition.exclusions.merge(&table.exclusions);
            }
            return Ok(partition);
        }

        if self.all_years.is_none() {
            let (years, reports) = self.split_by_year(&self.source.files(year))?;
            self.all_years = Some(years);
            self.reports = reports;
        }
        Ok(self
            .all_years
            .as_mut()
            .and_then(|years| years.remove(&year))
            .unwrap_or_default())
    }

    /// One report per file of a multi-year source, once it has been read.
    #[must_use]
    pub fn source_reports(&self) -> &[SourceReport] {
        &self.reports
    }

    fn split_by_year(
        &self,
        files: &[PathBuf],
    ) -> Result<(YearRows<T>, Vec<SourceReport>), SourceError> {
        let mut years: YearRows<T> = BTreeMap::new();
        let mut reports = Vec::with_capacity(files.len());

        for path in files {
            let (report, file_years) = self.read_file(path)?;
            for (year, rows) in file_years {
                let partition = years.entry(year).or_default();
                partition.records.extend(rows.records);
                partition.rows_read += rows.rows_read;
                partition.exclusions.merge(&rows.exclusions);
            }
            reports.push(report);
        }

        Ok((years, reports))
    }

    fn read_file(
        &self,
        path: &Path,
    ) -> Result<(SourceReport, YearRows<T>), SourceError> {
        let collected = CollectingDiagnostics::new();
        let table = (self.read)(path, &self.options, &collected)?;

        log::info!(
            "Read {} {} records from {}",
            table.records.len(),
            self.dataset,
            path.display()
        );

        // rows are numbered per file
        let row_years: HashMap<usize, i32> = table
            .records
            .iter()
            .map(|r| (r.row(), r.date().year()))
            .collect();

        let mut years: YearRows<T> = BTreeMap::new();
        for record in table.records {
            let partition = years.entry(record.date().year()).or_default();
            partition.rows_read += 1;
            partition.records.push(record);
        }

        let mut unattributed = ExclusionCounts::default();
        for (dataset, issue) in collected.issues() {
            self.diagnostics.record_issue(dataset, &issue);
            match row_years.get(&issue.row()) {
                Some(year) => years.entry(*year).or_default().exclusions.record(&issue),
                None => unattributed.record(&issue),
            }
        }

        let report = SourceReport {
            dataset: self.dataset,
            path: path.display().to_string(),
            rows_read: table.rows_read,
            unattributed,
        };
        Ok((report, years))
    }
}
