use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;

/// A build discovered via the Develocity builds listing.
///
/// Immutable once fetched. Build ids are globally unique and lexicographically
/// orderable, with larger ids belonging to more recent builds.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Build {
    /// Build scan id (e.g. "ojkup4yuxw5nc")
    pub id: String,
    /// Epoch millis at which the build became available on the server
    pub available_at: i64,
    /// Build tool that produced the scan (e.g. "gradle", "maven")
    pub build_tool_type: String,
    /// Version of the build tool, when reported
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub build_tool_version: Option<String>,
    /// Requested model sections, present only when models were asked for
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub models: Option<BuildModels>,
}

/// The named model sections a build can carry.
///
/// Each section arrives wrapped in an envelope; a section the server could not
/// produce degrades to an empty envelope rather than failing the build.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct BuildModels {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub gradle_attributes: Option<ModelEnvelope<GradleAttributes>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub gradle_build_cache_performance: Option<ModelEnvelope<serde_json::Value>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub gradle_network_activity: Option<ModelEnvelope<serde_json::Value>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub gradle_projects: Option<ModelEnvelope<serde_json::Value>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub gradle_deprecations: Option<ModelEnvelope<serde_json::Value>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub gradle_artifact_transform_executions: Option<ModelEnvelope<serde_json::Value>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub maven_attributes: Option<ModelEnvelope<MavenAttributes>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub maven_build_cache_performance: Option<ModelEnvelope<serde_json::Value>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub maven_dependency_resolution: Option<ModelEnvelope<serde_json::Value>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub maven_modules: Option<ModelEnvelope<serde_json::Value>>,
}

/// Envelope the API wraps every model section in.
///
/// `model` is absent when the server reported a problem for the section.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ModelEnvelope<T> {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub model: Option<T>,
}

/// Attributes model of a Gradle build.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct GradleAttributes {
    pub root_project_name: String,
    pub requested_tasks: Vec<String>,
    pub has_failed: bool,
    /// Epoch millis
    pub build_start_time: i64,
    /// Millis
    pub build_duration: i64,
    pub tags: Vec<String>,
    pub values: Vec<BuildAttributesValue>,
    pub environment: BuildEnvironment,
}

/// Attributes model of a Maven build.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct MavenAttributes {
    pub top_level_project_name: String,
    pub requested_goals: Vec<String>,
    pub has_failed: bool,
    /// Epoch millis
    pub build_start_time: i64,
    /// Millis
    pub build_duration: i64,
    pub tags: Vec<String>,
    pub values: Vec<BuildAttributesValue>,
    pub environment: BuildEnvironment,
}

/// A named custom value attached to a build (e.g. "Git branch" = "main").
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct BuildAttributesValue {
    pub name: String,
    pub value: Option<String>,
}

/// Environment the build ran in.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct BuildEnvironment {
    pub username: String,
}

/// Requestable model sections and their API spellings.
///
/// Ordered so that serialized model sets are canonical regardless of the
/// order sections were requested in.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum BuildModelName {
    GradleAttributes,
    GradleBuildCachePerformance,
    GradleNetworkActivity,
    GradleProjects,
    GradleDeprecations,
    GradleArtifactTransformExecutions,
    MavenAttributes,
    MavenBuildCachePerformance,
    MavenDependencyResolution,
    MavenModules,
}

impl BuildModelName {
    /// Spelling used in the `models` query parameter.
    pub fn as_query_param(self) -> &'static str {
        match self {
            Self::GradleAttributes => "gradle-attributes",
            Self::GradleBuildCachePerformance => "gradle-build-cache-performance",
            Self::GradleNetworkActivity => "gradle-network-activity",
            Self::GradleProjects => "gradle-projects",
            Self::GradleDeprecations => "gradle-deprecations",
            Self::GradleArtifactTransformExecutions => "gradle-artifact-transform-executions",
            Self::MavenAttributes => "maven-attributes",
            Self::MavenBuildCachePerformance => "maven-build-cache-performance",
            Self::MavenDependencyResolution => "maven-dependency-resolution",
            Self::MavenModules => "maven-modules",
        }
    }
}

/// The model set every report run requests: gradle and maven attributes.
pub fn attribute_models() -> BTreeSet<BuildModelName> {
    BTreeSet::from([
        BuildModelName::GradleAttributes,
        BuildModelName::MavenAttributes,
    ])
}
