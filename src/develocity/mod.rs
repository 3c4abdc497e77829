mod cache;
mod client;
mod consumer;
mod processor;
mod types;

pub use cache::{BuildCache, CachedBuild};
pub use client::DevelocityClient;
pub use consumer::{dispatch_build, BuildConsumer, GradleBuild, MavenBuild};
pub use processor::{process_builds, ProcessingSummary};
pub use types::{
    attribute_models, Build, BuildAttributesValue, BuildEnvironment, BuildModelName, BuildModels,
    GradleAttributes, MavenAttributes, ModelEnvelope,
};
