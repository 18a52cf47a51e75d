// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Cross-reference validation for pipeline files against a manifest.

use crate::dag::validate_dag;
use crate::manifest::Manifest;
use crate::pipeline::{ContractType, PipelineSpec};
use crate::ManifestError;
use std::collections::HashSet;
use wave_core::ArtifactType;

/// Validate a pipeline against its manifest.
///
/// Checks, in order: document kind, metadata, the dependency DAG, persona
/// and adapter references, artifact declarations, and contract coherence.
pub fn validate_pipeline(pipeline: &PipelineSpec, manifest: &Manifest) -> Result<(), ManifestError> {
    if pipeline.kind != "Pipeline" {
        return Err(ManifestError::PipelineInvalid {
            location: "kind".to_string(),
            message: format!("expected \"Pipeline\", found {:?}", pipeline.kind),
        });
    }
    if pipeline.metadata.name.is_empty() {
        return Err(ManifestError::PipelineInvalid {
            location: "metadata.name".to_string(),
            message: "pipeline name is required".to_string(),
        });
    }

    validate_dag(pipeline)?;
    validate_manifest(manifest)?;

    for step in &pipeline.steps {
        let location = format!("steps.{}", step.id);

        // Persona must exist; its adapter reference was checked above.
        if !manifest.personas.contains_key(&step.persona) {
            return Err(ManifestError::PipelineInvalid {
                location: location.clone(),
                message: format!("unknown persona {:?}", step.persona),
            });
        }

        // Output artifact names are unique within the step.
        let mut names = HashSet::new();
        for artifact in &step.output_artifacts {
            if !names.insert(artifact.name.as_str()) {
                return Err(ManifestError::PipelineInvalid {
                    location: format!("{location}.output_artifacts"),
                    message: format!("duplicate artifact name {:?}", artifact.name),
                });
            }
            if artifact.path.as_os_str().is_empty() {
                return Err(ManifestError::PipelineInvalid {
                    location: format!("{location}.output_artifacts.{}", artifact.name),
                    message: "artifact path is required".to_string(),
                });
            }
        }

        // Injected artifacts must come from declared dependencies.
        for inject in &step.memory.inject_artifacts {
            if !step.dependencies.contains(&inject.step) {
                return Err(ManifestError::PipelineInvalid {
                    location: format!("{location}.memory.inject_artifacts"),
                    message: format!(
                        "artifact {:?} injected from {:?}, which is not a dependency",
                        inject.artifact, inject.step
                    ),
                });
            }
            let producer = pipeline.step(&inject.step);
            let declared = producer
                .map(|p| p.output_artifacts.iter().any(|a| a.name == inject.artifact))
                .unwrap_or(false);
            if !declared {
                return Err(ManifestError::PipelineInvalid {
                    location: format!("{location}.memory.inject_artifacts"),
                    message: format!(
                        "step {:?} declares no artifact named {:?}",
                        inject.step, inject.artifact
                    ),
                });
            }
        }

        // Contract coherence.
        if let Some(handover) = &step.handover {
            let contract = &handover.contract;
            match contract.contract_type {
                ContractType::StructuralSchema => {
                    if contract.schema.is_none() && contract.schema_path.is_none() {
                        return Err(ManifestError::PipelineInvalid {
                            location: format!("{location}.handover.contract"),
                            message: "structural-schema contract needs schema or schema_path"
                                .to_string(),
                        });
                    }
                    // At least one declared output artifact must be JSON-typed.
                    let has_json = step
                        .output_artifacts
                        .iter()
                        .any(|a| a.artifact_type == ArtifactType::Json);
                    if !has_json {
                        return Err(ManifestError::PipelineInvalid {
                            location: format!("{location}.output_artifacts"),
                            message: "structural-schema contract requires a json output artifact"
                                .to_string(),
                        });
                    }
                }
                ContractType::TestSuite => {
                    if contract.command.as_deref().unwrap_or("").is_empty() {
                        return Err(ManifestError::PipelineInvalid {
                            location: format!("{location}.handover.contract"),
                            message: "test-suite contract needs a command".to_string(),
                        });
                    }
                }
                ContractType::TypedSource | ContractType::DocumentStructure => {
                    if contract.source.is_none() {
                        return Err(ManifestError::PipelineInvalid {
                            location: format!("{location}.handover.contract"),
                            message: format!(
                                "{} contract needs a source file",
                                contract.contract_type.as_str()
                            ),
                        });
                    }
                }
            }
        }

        // Matrix strategy needs a task collection.
        if let Some(strategy) = &step.strategy {
            let matrix = &strategy.matrix;
            if matrix.tasks.is_empty() && matrix.from_input.is_none() {
                return Err(ManifestError::PipelineInvalid {
                    location: format!("{location}.strategy.matrix"),
                    message: "matrix strategy needs tasks or from_input".to_string(),
                });
            }
        }
    }

    Ok(())
}

/// Validate manifest-internal references.
pub fn validate_manifest(manifest: &Manifest) -> Result<(), ManifestError> {
    for (name, persona) in &manifest.personas {
        if !manifest.adapters.contains_key(&persona.adapter) {
            return Err(ManifestError::ManifestInvalid {
                location: format!("personas.{name}"),
                message: format!("unknown adapter {:?}", persona.adapter),
            });
        }
        if !(0.0..=2.0).contains(&persona.temperature) {
            return Err(ManifestError::ManifestInvalid {
                location: format!("personas.{name}.temperature"),
                message: format!("temperature {} outside [0, 2]", persona.temperature),
            });
        }
    }

    for (name, adapter) in &manifest.adapters {
        if adapter.mode != "headless" {
            return Err(ManifestError::ManifestInvalid {
                location: format!("adapters.{name}.mode"),
                message: format!("only headless mode is supported, found {:?}", adapter.mode),
            });
        }
        if adapter.binary.is_empty() {
            return Err(ManifestError::ManifestInvalid {
                location: format!("adapters.{name}.binary"),
                message: "binary is required".to_string(),
            });
        }
    }

    if let Some(summarizer) = &manifest.runtime.relay.summarizer_persona {
        if !manifest.personas.contains_key(summarizer) {
            return Err(ManifestError::ManifestInvalid {
                location: "runtime.relay.summarizer_persona".to_string(),
                message: format!("unknown persona {:?}", summarizer),
            });
        }
    }

    let routing = &manifest.runtime.routing;
    for persona in routing
        .default
        .iter()
        .chain(routing.rules.iter().map(|r| &r.persona))
    {
        if !manifest.personas.contains_key(persona) {
            return Err(ManifestError::ManifestInvalid {
                location: "runtime.routing".to_string(),
                message: format!("unknown persona {:?}", persona),
            });
        }
    }

    if manifest.runtime.max_concurrent_workers == 0 {
        return Err(ManifestError::ManifestInvalid {
            location: "runtime.max_concurrent_workers".to_string(),
            message: "must be at least 1".to_string(),
        });
    }

    Ok(())
}

#[cfg(test)]
#[path = "validate_tests.rs"]
mod tests;
