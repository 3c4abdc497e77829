use serde_json::Value;

use super::types::{Build, BuildModels, GradleAttributes, MavenAttributes};

/// Receives fully-populated builds from the acquisition pipeline.
///
/// Builds arrive in discovery order; `on_finish` is called exactly once after
/// the last build of the run has been delivered.
pub trait BuildConsumer {
    fn on_gradle_build(&mut self, build: &GradleBuild<'_>);

    fn on_maven_build(&mut self, build: &MavenBuild<'_>);

    fn on_finish(&mut self) {}
}

/// Tool-agnostic dispatch of one build to every registered consumer.
///
/// Builds of unrecognized tool kinds are dropped silently; absent model
/// sections degrade to `None` rather than failing the build.
pub fn dispatch_build(build: &Build, consumers: &mut [&mut dyn BuildConsumer]) {
    match build.build_tool_type.as_str() {
        "gradle" => {
            let view = GradleBuild::project(build);
            for consumer in consumers.iter_mut() {
                consumer.on_gradle_build(&view);
            }
        }
        "maven" => {
            let view = MavenBuild::project(build);
            for consumer in consumers.iter_mut() {
                consumer.on_maven_build(&view);
            }
        }
        _ => {}
    }
}

/// A Gradle build with its model sections unwrapped.
pub struct GradleBuild<'a> {
    pub build: &'a Build,
    pub attributes: Option<&'a GradleAttributes>,
    pub build_cache_performance: Option<&'a Value>,
    pub network_activity: Option<&'a Value>,
    pub projects: Option<&'a Value>,
    pub deprecations: Option<&'a Value>,
    pub artifact_transform_executions: Option<&'a Value>,
}

impl<'a> GradleBuild<'a> {
    fn project(build: &'a Build) -> Self {
        let models = build.models.as_ref();
        Self {
            build,
            attributes: unwrap_section(models, |m| m.gradle_attributes.as_ref().map(|e| &e.model)),
            build_cache_performance: unwrap_section(models, |m| {
                m.gradle_build_cache_performance.as_ref().map(|e| &e.model)
            }),
            network_activity: unwrap_section(models, |m| {
                m.gradle_network_activity.as_ref().map(|e| &e.model)
            }),
            projects: unwrap_section(models, |m| m.gradle_projects.as_ref().map(|e| &e.model)),
            deprecations: unwrap_section(models, |m| {
                m.gradle_deprecations.as_ref().map(|e| &e.model)
            }),
            artifact_transform_executions: unwrap_section(models, |m| {
                m.gradle_artifact_transform_executions
                    .as_ref()
                    .map(|e| &e.model)
            }),
        }
    }
}

/// A Maven build with its model sections unwrapped.
pub struct MavenBuild<'a> {
    pub build: &'a Build,
    pub attributes: Option<&'a MavenAttributes>,
    pub build_cache_performance: Option<&'a Value>,
    pub dependency_resolution: Option<&'a Value>,
    pub modules: Option<&'a Value>,
}

impl<'a> MavenBuild<'a> {
    fn project(build: &'a Build) -> Self {
        let models = build.models.as_ref();
        Self {
            build,
            attributes: unwrap_section(models, |m| m.maven_attributes.as_ref().map(|e| &e.model)),
            build_cache_performance: unwrap_section(models, |m| {
                m.maven_build_cache_performance.as_ref().map(|e| &e.model)
            }),
            dependency_resolution: unwrap_section(models, |m| {
                m.maven_dependency_resolution.as_ref().map(|e| &e.model)
            }),
            modules: unwrap_section(models, |m| m.maven_modules.as_ref().map(|e| &e.model)),
        }
    }
}

fn unwrap_section<'a, T>(
    models: Option<&'a BuildModels>,
    section: impl Fn(&'a BuildModels) -> Option<&'a Option<T>>,
) -> Option<&'a T> {
    models.and_then(section).and_then(Option::as_ref)
}
