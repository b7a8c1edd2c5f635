//! Plain-text tables for terminal output.

use std::fmt::Write as _;

use crate::{
    stats::{TestResult, procedures::format_p},
    variable::VariableDescriptor,
    workbench::Review,
};

pub fn render_table(headers: &[String], rows: &[Vec<String>]) -> String {
    let mut widths = headers.iter().map(|h| cell_width(h)).collect::<Vec<_>>();
    for row in rows {
        for (width, cell) in widths.iter_mut().zip(row) {
            *width = (*width).max(cell_width(cell));
        }
    }

    let mut output = String::new();
    let _ = writeln!(output, "{}", format_row(headers, &widths));
    let rule = widths.iter().map(|w| "-".repeat((*w).max(3))).collect::<Vec<_>>();
    let _ = writeln!(output, "{}", format_row(&rule, &widths));
    for row in rows {
        let _ = writeln!(output, "{}", format_row(row, &widths));
    }
    output
}

fn format_row(cells: &[String], widths: &[usize]) -> String {
    let line = cells
        .iter()
        .zip(widths)
        .map(|(cell, width)| {
            let flat = cell.replace(['\n', '\r', '\t'], " ");
            let padding = width.saturating_sub(cell_width(&flat));
            format!("{flat}{}", " ".repeat(padding))
        })
        .collect::<Vec<_>>()
        .join("  ");
    line.trim_end().to_string()
}

fn cell_width(value: &str) -> usize {
    value.chars().count()
}

fn headers(names: &[&str]) -> Vec<String> {
    names.iter().map(|name| name.to_string()).collect()
}

pub fn render_variables(variables: &[VariableDescriptor]) -> String {
    let rows = variables
        .iter()
        .map(|v| {
            let detail = if let Some(invalid) = v.invalid_values.as_ref().filter(|t| !t.is_empty()) {
                format!(
                    "{:.1}% numeric; invalid: {}",
                    v.numeric_percentage.unwrap_or_default(),
                    invalid.join(", ")
                )
            } else if v.coding.is_some() {
                v.categories_by_code().join(" | ")
            } else {
                String::new()
            };
            vec![
                v.name.clone(),
                v.var_type.to_string(),
                v.missing.to_string(),
                v.unique.to_string(),
                v.example.as_display(),
                detail,
            ]
        })
        .collect::<Vec<_>>();
    render_table(
        &headers(&["variable", "type", "missing", "unique", "example", "detail"]),
        &rows,
    )
}

fn number(value: f64) -> String {
    if value.is_infinite() {
        (if value > 0.0 { "inf" } else { "-inf" }).to_string()
    } else {
        format!("{value:.4}")
    }
}

pub fn render_test_result(result: &TestResult) -> String {
    let mut rows = vec![
        vec!["test".to_string(), result.test.title().to_string()],
        vec!["variables".to_string(), result.variables.join(", ")],
        vec!["statistic".to_string(), number(result.statistic)],
        vec!["p".to_string(), format_p(result.p_value)],
        vec!["significant".to_string(), result.significant.to_string()],
        vec!["n".to_string(), result.sample_size.to_string()],
    ];
    if let Some(df) = result.degrees_of_freedom {
        let df = match result.error_degrees_of_freedom {
            Some(error_df) => format!("{df}, {error_df}"),
            None => df.to_string(),
        };
        rows.push(vec!["df".to_string(), df]);
    }
    if let Some(effect) = &result.effect_size {
        rows.push(vec![
            "effect size".to_string(),
            format!("{} = {} ({})", effect.measure, number(effect.value), effect.magnitude),
        ]);
    }
    if let Some(ci) = &result.confidence_interval {
        rows.push(vec![
            format!("{:.0}% CI", ci.level * 100.0),
            format!("[{}, {}]", number(ci.lower), number(ci.upper)),
        ]);
    }
    for group in &result.groups {
        rows.push(vec![
            format!("group {}", group.label),
            format!("n = {}, M = {:.2}, SD = {:.2}", group.n, group.mean, group.std_dev),
        ]);
    }
    if let Some(assumptions) = &result.assumptions {
        rows.push(vec![
            "variance ratio".to_string(),
            number(assumptions.homogeneity.variance_ratio),
        ]);
        for recommendation in &assumptions.recommendations {
            rows.push(vec!["recommendation".to_string(), recommendation.clone()]);
        }
    }

    let mut output = render_table(&headers(&["field", "value"]), &rows);
    let _ = writeln!(output, "\n{}", result.interpretation);
    output
}

pub fn render_review(review: &Review) -> String {
    let mut output = String::new();

    let _ = writeln!(output, "Removal candidates");
    let rows = review
        .removal_candidates
        .iter()
        .map(|c| {
            vec![
                c.name.clone(),
                format!("{:?}", c.reason),
                format!("{:.1}", c.missing_percentage),
                format!("{:.2}", c.unique_ratio),
            ]
        })
        .collect::<Vec<_>>();
    output.push_str(&render_table(
        &headers(&["variable", "reason", "missing %", "unique ratio"]),
        &rows,
    ));

    let _ = writeln!(output, "\nExact duplicate rows");
    let rows = review
        .duplicate_groups
        .iter()
        .map(|g| {
            vec![
                g.positions[0].to_string(),
                g.positions[1..]
                    .iter()
                    .map(|p| p.to_string())
                    .collect::<Vec<_>>()
                    .join(", "),
            ]
        })
        .collect::<Vec<_>>();
    output.push_str(&render_table(&headers(&["kept row", "duplicates"]), &rows));

    let _ = writeln!(output, "\nInconsistent labels");
    let rows = review
        .label_inconsistencies
        .iter()
        .map(|l| vec![l.variable.clone(), l.canonical.clone(), l.variants.join(" | ")])
        .collect::<Vec<_>>();
    output.push_str(&render_table(
        &headers(&["variable", "canonical", "variants"]),
        &rows,
    ));

    let _ = writeln!(output, "\nComposite proposals");
    let rows = review
        .composite_proposals
        .iter()
        .map(|p| {
            vec![
                p.spec.name.clone(),
                p.spec.items.join(", "),
                p.selected.to_string(),
            ]
        })
        .collect::<Vec<_>>();
    output.push_str(&render_table(&headers(&["composite", "items", "selected"]), &rows));

    let _ = writeln!(output, "\nRename suggestions");
    let rows = review
        .rename_suggestions
        .iter()
        .map(|r| vec![r.from.clone(), r.to.clone()])
        .collect::<Vec<_>>();
    output.push_str(&render_table(&headers(&["from", "to"]), &rows));
    output
}
