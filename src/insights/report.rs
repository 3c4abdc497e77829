use std::collections::BTreeMap;

use chrono::{DateTime, Duration, Utc};
use indexmap::IndexMap;

use super::durations;
use super::resolution::Resolution;
use super::stats::DescriptiveStats;
use super::tracker::Incident;

const STAT_HEADERS: [&str; 9] = [
    "Failures", "Mean", "Median", "Min", "Max", "P5", "P25", "P75", "P95",
];
const EMPTY_BUCKET: &str = "--";

/// Rendering-agnostic tabular report artifact.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReportTable {
    pub title: String,
    pub headers: Vec<String>,
    pub rows: Vec<Vec<String>>,
}

/// Time-to-remediate statistics over the resolved incidents of one window.
///
/// Every report is a pure function of the resolved incident set, a
/// CI/local predicate and an optional grouping key, computed on demand.
/// Trend variants bucket incidents by start time at a resolution derived
/// from the window span, with empty buckets materialized so the time axis
/// has no gaps.
pub struct IncidentReport {
    resolution: Resolution,
    incidents: Vec<Incident>,
    partitioned: BTreeMap<DateTime<Utc>, Vec<Incident>>,
}

impl IncidentReport {
    pub fn new(resolved: &[Incident], since: DateTime<Utc>, until: DateTime<Utc>) -> Self {
        let resolution = Resolution::from_span(until - since);

        let mut incidents: Vec<Incident> = resolved.to_vec();
        incidents.sort_by_key(|incident| incident.started_on);

        let mut partitioned: BTreeMap<DateTime<Utc>, Vec<Incident>> = resolution
            .ticks(since, until)
            .into_iter()
            .map(|tick| (tick, Vec::new()))
            .collect();
        for incident in &incidents {
            partitioned
                .entry(resolution.truncate(incident.started_on))
                .or_default()
                .push(incident.clone());
        }

        Self {
            resolution,
            incidents,
            partitioned,
        }
    }

    pub fn overall(&self) -> ReportTable {
        self.compute_overall("CI & Local, Overall", all_builds)
    }

    pub fn ci_overall(&self) -> ReportTable {
        self.compute_overall("CI, Overall", only_ci_builds)
    }

    pub fn local_overall(&self) -> ReportTable {
        self.compute_overall("Local, Overall", only_local_builds)
    }

    pub fn ci_per_project_requested(&self) -> ReportTable {
        self.compute_grouped(
            "CI, By Project & Requested tasks/goals",
            &["Project", "Requested tasks/goals"],
            only_ci_builds,
            by_project_requested,
        )
    }

    pub fn local_per_user(&self) -> ReportTable {
        self.compute_grouped("Local, By User", &["User"], only_local_builds, by_user)
    }

    pub fn local_per_project(&self) -> ReportTable {
        self.compute_grouped(
            "Local, By Project",
            &["Project"],
            only_local_builds,
            by_project,
        )
    }

    pub fn local_per_user_project(&self) -> ReportTable {
        self.compute_grouped(
            "Local, By User & Project",
            &["User", "Project"],
            only_local_builds,
            by_user_project,
        )
    }

    pub fn overall_trends(&self) -> ReportTable {
        self.compute_overall_trends("CI & Local, Overall", all_builds)
    }

    pub fn ci_overall_trends(&self) -> ReportTable {
        self.compute_overall_trends("CI, Overall", only_ci_builds)
    }

    pub fn local_overall_trends(&self) -> ReportTable {
        self.compute_overall_trends("Local, Overall", only_local_builds)
    }

    pub fn ci_per_project_requested_trends(&self) -> ReportTable {
        self.compute_grouped_trends(
            "CI, By Project & Requested tasks/goals",
            &["Project", "Requested tasks/goals"],
            only_ci_builds,
            by_project_requested,
        )
    }

    pub fn local_per_user_trends(&self) -> ReportTable {
        self.compute_grouped_trends("Local, By User", &["User"], only_local_builds, by_user)
    }

    pub fn local_per_project_trends(&self) -> ReportTable {
        self.compute_grouped_trends(
            "Local, By Project",
            &["Project"],
            only_local_builds,
            by_project,
        )
    }

    pub fn local_per_user_project_trends(&self) -> ReportTable {
        self.compute_grouped_trends(
            "Local, By User & Project",
            &["User", "Project"],
            only_local_builds,
            by_user_project,
        )
    }

    fn compute_overall(&self, title: &str, filter: fn(&Incident) -> bool) -> ReportTable {
        let stats = duration_stats(self.incidents.iter().filter(|i| filter(i)));

        ReportTable {
            title: full_title(title),
            headers: STAT_HEADERS.iter().map(ToString::to_string).collect(),
            rows: vec![stats_row(&[], &stats)],
        }
    }

    fn compute_grouped(
        &self,
        title: &str,
        key_headers: &[&str],
        filter: fn(&Incident) -> bool,
        grouping: fn(&Incident) -> Vec<String>,
    ) -> ReportTable {
        let mut groups: IndexMap<Vec<String>, Vec<&Incident>> = IndexMap::new();
        for incident in self.incidents.iter().filter(|i| filter(i)) {
            groups.entry(grouping(incident)).or_default().push(incident);
        }

        let mut rows: Vec<(Vec<String>, DescriptiveStats)> = groups
            .into_iter()
            .map(|(key, incidents)| (key, duration_stats(incidents.into_iter())))
            .collect();
        rows.sort_by_key(|(_, stats)| std::cmp::Reverse(stats.count()));

        ReportTable {
            title: full_title(title),
            headers: key_headers
                .iter()
                .chain(STAT_HEADERS.iter())
                .map(ToString::to_string)
                .collect(),
            rows: rows
                .into_iter()
                .map(|(key, stats)| stats_row(&key, &stats))
                .collect(),
        }
    }

    fn compute_overall_trends(&self, title: &str, filter: fn(&Incident) -> bool) -> ReportTable {
        let buckets: Vec<(DateTime<Utc>, DescriptiveStats)> = self
            .partitioned
            .iter()
            .map(|(tick, incidents)| {
                (*tick, duration_stats(incidents.iter().filter(|i| filter(i))))
            })
            .collect();

        let failures: usize = buckets.iter().map(|(_, stats)| stats.count()).sum();

        let mut headers = vec!["Failures".to_string()];
        headers.extend(buckets.iter().map(|(tick, _)| self.resolution.label(*tick)));

        let mut row = vec![failures.to_string()];
        row.extend(buckets.iter().map(|(_, stats)| bucket_cell(stats)));

        ReportTable {
            title: full_title(title),
            headers,
            rows: vec![row],
        }
    }

    fn compute_grouped_trends(
        &self,
        title: &str,
        key_headers: &[&str],
        filter: fn(&Incident) -> bool,
        grouping: fn(&Incident) -> Vec<String>,
    ) -> ReportTable {
        let ticks: Vec<DateTime<Utc>> = self.partitioned.keys().copied().collect();

        // One column map per group key, keyed by bucket start.
        let mut groups: IndexMap<Vec<String>, BTreeMap<DateTime<Utc>, Vec<&Incident>>> =
            IndexMap::new();
        for (tick, incidents) in &self.partitioned {
            for incident in incidents.iter().filter(|i| filter(i)) {
                groups
                    .entry(grouping(incident))
                    .or_default()
                    .entry(*tick)
                    .or_default()
                    .push(incident);
            }
        }

        let mut rows: Vec<(Vec<String>, usize, BTreeMap<DateTime<Utc>, DescriptiveStats>)> =
            groups
                .into_iter()
                .map(|(key, columns)| {
                    let columns: BTreeMap<DateTime<Utc>, DescriptiveStats> = columns
                        .into_iter()
                        .map(|(tick, incidents)| (tick, duration_stats(incidents.into_iter())))
                        .collect();
                    let failures = columns.values().map(DescriptiveStats::count).sum();
                    (key, failures, columns)
                })
                .collect();
        rows.sort_by_key(|(_, failures, _)| std::cmp::Reverse(*failures));

        let mut headers: Vec<String> = key_headers.iter().map(ToString::to_string).collect();
        headers.push("Failures".to_string());
        headers.extend(ticks.iter().map(|tick| self.resolution.label(*tick)));

        let rows = rows
            .into_iter()
            .map(|(key, failures, columns)| {
                let mut row = key;
                row.push(failures.to_string());
                row.extend(ticks.iter().map(|tick| {
                    columns
                        .get(tick)
                        .map_or_else(|| EMPTY_BUCKET.to_string(), bucket_cell)
                }));
                row
            })
            .collect();

        ReportTable {
            title: full_title(title),
            headers,
            rows,
        }
    }
}

fn all_builds(_: &Incident) -> bool {
    true
}

fn only_ci_builds(incident: &Incident) -> bool {
    incident.is_ci
}

fn only_local_builds(incident: &Incident) -> bool {
    !incident.is_ci
}

fn by_project_requested(incident: &Incident) -> Vec<String> {
    vec![incident.project_name.clone(), incident.requested.clone()]
}

fn by_user(incident: &Incident) -> Vec<String> {
    vec![incident.username.clone()]
}

fn by_project(incident: &Incident) -> Vec<String> {
    vec![incident.project_name.clone()]
}

fn by_user_project(incident: &Incident) -> Vec<String> {
    vec![incident.username.clone(), incident.project_name.clone()]
}

fn full_title(subtitle: &str) -> String {
    format!("Time To Remediate Build Failures ({subtitle})")
}

fn duration_stats<'a>(incidents: impl Iterator<Item = &'a Incident>) -> DescriptiveStats {
    DescriptiveStats::from_millis(
        incidents
            .filter_map(Incident::duration)
            .map(|duration| duration.num_milliseconds()),
    )
}

fn stats_row(key: &[String], stats: &DescriptiveStats) -> Vec<String> {
    let mut row: Vec<String> = key.to_vec();
    row.push(stats.count().to_string());
    row.push(format_millis(stats.mean()));
    row.push(format_millis(stats.percentile(50.0)));
    row.push(format_millis(stats.min()));
    row.push(format_millis(stats.max()));
    row.push(format_millis(stats.percentile(5.0)));
    row.push(format_millis(stats.percentile(25.0)));
    row.push(format_millis(stats.percentile(75.0)));
    row.push(format_millis(stats.percentile(95.0)));
    row
}

fn bucket_cell(stats: &DescriptiveStats) -> String {
    if stats.count() == 0 {
        EMPTY_BUCKET.to_string()
    } else {
        format_millis(stats.mean())
    }
}

fn format_millis(millis: f64) -> String {
    durations::format(Duration::milliseconds(millis as i64))
}
