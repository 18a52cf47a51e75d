// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Document-structure contract: heading hierarchy and required sections.

use crate::{ContractError, ContractFailure, ContractOutcome, FailureKind, ValidationRequest, Violation};
use crate::ViolationClass;

/// Validate a markdown document's structure.
///
/// Requirements: non-empty, a top-level `# ` title, prose outside the
/// headings, and every configured section present as a heading.
pub fn validate_document(req: &ValidationRequest<'_>) -> Result<ContractOutcome, ContractError> {
    let path = req.subject_path().ok_or_else(|| {
        ContractError::Misconfigured("document-structure contract has no source".to_string())
    })?;
    if !path.exists() {
        return Err(ContractError::SubjectMissing(path));
    }
    let text = std::fs::read_to_string(&path).map_err(|source| ContractError::Io {
        path: path.clone(),
        source,
    })?;

    let mut violations = Vec::new();

    if text.trim().is_empty() {
        violations.push(violation("document is empty"));
    } else {
        let headings: Vec<&str> = text
            .lines()
            .filter(|l| l.trim_start().starts_with('#'))
            .collect();

        if !headings.iter().any(|h| {
            let t = h.trim_start();
            t.starts_with("# ") && t.len() > 2
        }) {
            violations.push(violation("missing top-level `# ` title"));
        }

        let has_prose = text
            .lines()
            .any(|l| !l.trim().is_empty() && !l.trim_start().starts_with('#'));
        if !has_prose {
            violations.push(violation("document has headings but no content"));
        }

        for section in &req.contract.sections {
            let found = headings.iter().any(|h| {
                h.trim_start()
                    .trim_start_matches('#')
                    .trim()
                    .eq_ignore_ascii_case(section)
            });
            if !found {
                violations.push(Violation {
                    class: ViolationClass::MissingRequired,
                    path: section.clone(),
                    message: format!("required section {:?} not found", section),
                });
            }
        }
    }

    if violations.is_empty() {
        return Ok(ContractOutcome::passed());
    }

    let mut repair_prompt = String::from(
        "The produced document does not meet the required structure:\n",
    );
    for v in &violations {
        repair_prompt.push_str(&format!("- {}\n", v.message));
    }
    repair_prompt.push_str("Rewrite the document with a `# ` title, the required sections, and non-empty prose.\n");

    Ok(ContractOutcome::Failed(ContractFailure {
        kind: FailureKind::Document,
        violations,
        retryable: true,
        repair_prompt,
    }))
}

fn violation(message: &str) -> Violation {
    Violation {
        class: ViolationClass::Other,
        path: String::new(),
        message: message.to_string(),
    }
}

#[cfg(test)]
#[path = "document_tests.rs"]
mod tests;
