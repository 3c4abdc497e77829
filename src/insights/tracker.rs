use std::collections::HashMap;

use chrono::{DateTime, Duration, TimeZone, Utc};

use crate::develocity::{BuildAttributesValue, BuildConsumer, GradleBuild, MavenBuild};

const CI_TAG: &str = "CI";
const LOCAL_TAG: &str = "LOCAL";
const GIT_BRANCH_VALUE: &str = "Git branch";
const BUILD_VALIDATION_SCRIPTS_VALUE: &str = "Build validation scripts";

/// Tool-agnostic projection of one build, ordered by start time.
#[derive(Debug, Clone)]
pub struct BuildView {
    pub username: String,
    pub project_name: String,
    pub requested: Vec<String>,
    pub tags: Vec<String>,
    pub values: Vec<BuildAttributesValue>,
    pub has_failed: bool,
    pub build_start_time: DateTime<Utc>,
    pub build_duration: Duration,
}

/// Identity of a recurring job, used to correlate failures with the fix
/// that follows them.
///
/// CI builds are keyed without the user (any agent may run the job); local
/// builds are keyed without the branch (a developer's checkout is the unit
/// that is broken or fixed).
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum IncidentSignature {
    Ci {
        project_name: String,
        requested: String,
        git_branch: String,
    },
    Local {
        username: String,
        project_name: String,
        requested: String,
    },
}

/// A span during which one job identity was consistently failing.
///
/// Opens at the end of the first failing build and, once a passing build
/// arrives, resolves at that build's start.
#[derive(Debug, Clone)]
pub struct Incident {
    pub username: String,
    pub project_name: String,
    pub requested: String,
    pub started_on: DateTime<Utc>,
    pub resolved_on: Option<DateTime<Utc>>,
    pub is_ci: bool,
}

impl Incident {
    /// Time to remediate; `None` while the incident is still open.
    pub fn duration(&self) -> Option<Duration> {
        self.resolved_on.map(|resolved| resolved - self.started_on)
    }
}

/// Detects failure incidents from the stream of observed builds.
///
/// Builds are collected as [`BuildView`]s during the stream and replayed in
/// ascending start-time order at `on_finish` — incident resolution depends on
/// the first passing build after the first failing one, across the whole
/// stream and not per signature. A stable sort of an explicit sequence keeps
/// same-instant builds intact.
///
/// Invariant: at most one open incident per signature at any time.
#[derive(Default)]
pub struct IncidentTracker {
    build_views: Vec<BuildView>,
    open_incidents: HashMap<IncidentSignature, Incident>,
    resolved_incidents: Vec<Incident>,
}

impl IncidentTracker {
    pub fn new() -> Self {
        Self::default()
    }

    /// Incidents resolved so far, in resolution order.
    pub fn resolved_incidents(&self) -> &[Incident] {
        &self.resolved_incidents
    }

    /// Incidents still open; excluded from reporting.
    pub fn open_incident_count(&self) -> usize {
        self.open_incidents.len()
    }

    /// Feeds one projection through the incident state machine.
    ///
    /// Projections must arrive in ascending start-time order. Ineligible
    /// projections (no git branch, validation-script runs, neither CI nor
    /// LOCAL tagged) are no-ops.
    pub fn observe(&mut self, view: &BuildView) {
        let is_ci = has_tag(CI_TAG, &view.tags);
        let is_local = has_tag(LOCAL_TAG, &view.tags);
        if !is_ci && !is_local {
            return;
        }
        if has_value_named(BUILD_VALIDATION_SCRIPTS_VALUE, &view.values) {
            return;
        }
        let Some(git_branch) =
            find_value(GIT_BRANCH_VALUE, &view.values).filter(|branch| !branch.is_empty())
        else {
            return;
        };

        let requested = view.requested.join(" ");
        let signature = if is_ci {
            IncidentSignature::Ci {
                project_name: view.project_name.clone(),
                requested: requested.clone(),
                git_branch: git_branch.to_string(),
            }
        } else {
            IncidentSignature::Local {
                username: view.username.clone(),
                project_name: view.project_name.clone(),
                requested: requested.clone(),
            }
        };

        if view.has_failed {
            self.open_incidents
                .entry(signature)
                .or_insert_with(|| Incident {
                    username: view.username.clone(),
                    project_name: view.project_name.clone(),
                    requested,
                    started_on: view.build_start_time + view.build_duration,
                    resolved_on: None,
                    is_ci,
                });
        } else if let Some(mut incident) = self.open_incidents.remove(&signature) {
            incident.resolved_on = Some(view.build_start_time);
            self.resolved_incidents.push(incident);
        }
    }
}

impl BuildConsumer for IncidentTracker {
    fn on_gradle_build(&mut self, build: &GradleBuild<'_>) {
        let Some(attributes) = build.attributes else {
            return;
        };
        self.build_views.push(BuildView {
            username: attributes.environment.username.clone(),
            project_name: attributes.root_project_name.clone(),
            requested: attributes.requested_tasks.clone(),
            tags: attributes.tags.clone(),
            values: attributes.values.clone(),
            has_failed: attributes.has_failed,
            build_start_time: epoch_millis(attributes.build_start_time),
            build_duration: Duration::milliseconds(attributes.build_duration),
        });
    }

    fn on_maven_build(&mut self, build: &MavenBuild<'_>) {
        let Some(attributes) = build.attributes else {
            return;
        };
        self.build_views.push(BuildView {
            username: attributes.environment.username.clone(),
            project_name: attributes.top_level_project_name.clone(),
            requested: attributes.requested_goals.clone(),
            tags: attributes.tags.clone(),
            values: attributes.values.clone(),
            has_failed: attributes.has_failed,
            build_start_time: epoch_millis(attributes.build_start_time),
            build_duration: Duration::milliseconds(attributes.build_duration),
        });
    }

    fn on_finish(&mut self) {
        let mut views = std::mem::take(&mut self.build_views);
        views.sort_by_key(|view| view.build_start_time);
        for view in &views {
            self.observe(view);
        }
    }
}

fn epoch_millis(millis: i64) -> DateTime<Utc> {
    Utc.timestamp_millis_opt(millis)
        .single()
        .unwrap_or_default()
}

fn has_tag(name: &str, tags: &[String]) -> bool {
    tags.iter().any(|tag| tag.eq_ignore_ascii_case(name))
}

fn has_value_named(name: &str, values: &[BuildAttributesValue]) -> bool {
    values.iter().any(|value| value.name.eq_ignore_ascii_case(name))
}

fn find_value<'a>(name: &str, values: &'a [BuildAttributesValue]) -> Option<&'a str> {
    values
        .iter()
        .find(|value| value.name.eq_ignore_ascii_case(name))
        .and_then(|value| value.value.as_deref())
}
