//! Advisory mapping from an analysis intent and variable types to the tests
//! that make sense for them. The engine re-checks every precondition, so a
//! suggestion here is never a guarantee the test will run.

use std::{fmt, str::FromStr};

use anyhow::{Result, anyhow};
use clap::ValueEnum;
use serde::{Deserialize, Serialize};

use crate::{stats::TestId, variable::VariableDescriptor};

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, ValueEnum)]
#[serde(rename_all = "lowercase")]
pub enum AnalysisIntent {
    Distribution,
    Relationship,
    Comparison,
}

impl fmt::Display for AnalysisIntent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            AnalysisIntent::Distribution => "distribution",
            AnalysisIntent::Relationship => "relationship",
            AnalysisIntent::Comparison => "comparison",
        };
        f.write_str(label)
    }
}

impl FromStr for AnalysisIntent {
    type Err = anyhow::Error;

    fn from_str(value: &str) -> Result<Self> {
        match value.trim().to_ascii_lowercase().as_str() {
            "distribution" => Ok(AnalysisIntent::Distribution),
            "relationship" => Ok(AnalysisIntent::Relationship),
            "comparison" => Ok(AnalysisIntent::Comparison),
            other => Err(anyhow!("Unknown analysis intent '{other}'")),
        }
    }
}

/// Ordered admissible tests; the first entry is the primary recommendation.
pub fn admissible_tests(
    intent: AnalysisIntent,
    first: &VariableDescriptor,
    second: Option<&VariableDescriptor>,
) -> Vec<TestId> {
    match (intent, second) {
        (AnalysisIntent::Distribution, None) if first.is_numeric() => vec![TestId::Normality],
        (AnalysisIntent::Relationship, Some(second)) if first.is_numeric() && second.is_numeric() => {
            vec![TestId::PearsonCorrelation]
        }
        (AnalysisIntent::Relationship, Some(second))
            if first.is_categorical() && second.is_categorical() =>
        {
            vec![TestId::ChiSquare]
        }
        (AnalysisIntent::Relationship | AnalysisIntent::Comparison, Some(second)) => {
            group_comparisons(first, second)
        }
        _ => Vec::new(),
    }
}

fn group_comparisons(first: &VariableDescriptor, second: &VariableDescriptor) -> Vec<TestId> {
    let grouping = match (first.is_categorical(), second.is_categorical()) {
        (true, false) if second.is_numeric() => first,
        (false, true) if first.is_numeric() => second,
        _ => return Vec::new(),
    };
    if grouping.unique == 2 {
        vec![TestId::IndependentTTest, TestId::OneWayAnova]
    } else {
        vec![TestId::OneWayAnova, TestId::IndependentTTest]
    }
}
