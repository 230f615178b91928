use rand::Rng;
use serde::{Deserialize, Serialize};

use synthehr_core::Template;

use crate::errors::DispatchError;

/// How a requested total is split across templates.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DistributionPolicy {
    /// Even split; the remainder goes one each to the first templates.
    #[default]
    Proportional,
    /// Random cut points; every template receives at least one.
    RandomPartition,
}

/// Planned generation work for one template.
#[derive(Debug, Clone)]
pub struct GenerationUnit {
    pub template: Template,
    pub count: usize,
}

/// Split `total` across `templates` so the counts sum to `total` exactly.
pub fn plan_distribution<R: Rng + ?Sized>(
    templates: &[Template],
    total: usize,
    policy: DistributionPolicy,
    rng: &mut R,
) -> Result<Vec<GenerationUnit>, DispatchError> {
    if templates.is_empty() {
        return Err(DispatchError::NoTemplates);
    }

    let counts = match policy {
        DistributionPolicy::Proportional => proportional_counts(templates.len(), total),
        DistributionPolicy::RandomPartition => {
            random_partition_counts(templates.len(), total, rng)?
        }
    };

    Ok(templates
        .iter()
        .zip(counts)
        .map(|(template, count)| GenerationUnit {
            template: template.clone(),
            count,
        })
        .collect())
}

fn proportional_counts(templates: usize, total: usize) -> Vec<usize> {
    let per_template = total / templates;
    let remainder = total % templates;
    (0..templates)
        .map(|idx| per_template + usize::from(idx < remainder))
        .collect()
}

fn random_partition_counts<R: Rng + ?Sized>(
    templates: usize,
    total: usize,
    rng: &mut R,
) -> Result<Vec<usize>, DispatchError> {
    if total <= templates {
        return Err(DispatchError::PartitionTooSmall { total, templates });
    }

    // Distinct cut points in [1, total).
    let mut cuts: Vec<usize> = rand::seq::index::sample(rng, total - 1, templates - 1)
        .into_iter()
        .map(|idx| idx + 1)
        .collect();
    cuts.sort_unstable();

    let mut counts = Vec::with_capacity(templates);
    let mut previous = 0;
    for cut in cuts {
        counts.push(cut - previous);
        previous = cut;
    }
    counts.push(total - previous);
    Ok(counts)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn proportional_spreads_remainder_first() {
        assert_eq!(proportional_counts(3, 10), vec![4, 3, 3]);
        assert_eq!(proportional_counts(2, 10), vec![5, 5]);
        assert_eq!(proportional_counts(4, 2), vec![1, 1, 0, 0]);
        assert_eq!(proportional_counts(3, 0), vec![0, 0, 0]);
    }
}
