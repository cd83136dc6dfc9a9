//! Plain-text rendering of catalog lists and session failures.

use catalog_core::{FailureContext, FailureKind, SessionFailure};
use shared::domain::{VehicleMake, VehicleModel, VehicleType};

pub fn vehicle_types(types: &[VehicleType]) -> String {
    let rows: Vec<[String; 2]> = types
        .iter()
        .map(|t| [t.id.0.to_string(), t.name.trim().to_string()])
        .collect();
    table(["Type ID", "Type Name"], &rows)
}

pub fn makes(makes: &[VehicleMake]) -> String {
    let rows: Vec<[String; 2]> = makes
        .iter()
        .map(|m| [m.make_id.0.to_string(), m.make_name.trim().to_string()])
        .collect();
    table(["Make ID", "Make Name"], &rows)
}

pub fn models(models: &[VehicleModel]) -> String {
    let rows: Vec<[String; 4]> = models
        .iter()
        .map(|m| {
            [
                m.make_id.0.to_string(),
                m.make_name.trim().to_string(),
                m.model_id.0.to_string(),
                m.model_name.trim().to_string(),
            ]
        })
        .collect();
    table(["Make ID", "Make Name", "Model ID", "Model Name"], &rows)
}

pub fn failure(failure: &SessionFailure) -> String {
    let hint = match failure.kind {
        FailureKind::Unreachable => "catalog unreachable; check the base URL or network and retry",
        FailureKind::Malformed => "catalog returned an unreadable response",
        FailureKind::Rejected(_) => match failure.context {
            FailureContext::VehicleTypes => "could not list vehicle types",
            FailureContext::Makes => "could not list makes for the selected type",
            FailureContext::Models => "model search failed; previous results were kept",
        },
    };
    format!("{hint}: {}", failure.message)
}

fn table<const N: usize>(headers: [&str; N], rows: &[[String; N]]) -> String {
    let mut widths = headers.map(str::len);
    for row in rows {
        for (width, cell) in widths.iter_mut().zip(row) {
            *width = (*width).max(cell.chars().count());
        }
    }

    let mut out = String::new();
    push_row(&mut out, headers.iter().copied(), &widths);
    let rules: Vec<String> = widths.iter().map(|w| "-".repeat(*w)).collect();
    push_row(&mut out, rules.iter().map(String::as_str), &widths);
    for row in rows {
        push_row(&mut out, row.iter().map(String::as_str), &widths);
    }
    out
}

fn push_row<'a>(out: &mut String, cells: impl Iterator<Item = &'a str>, widths: &[usize]) {
    let line = cells
        .zip(widths)
        .map(|(cell, width)| format!("{cell:<width$}", width = *width))
        .collect::<Vec<_>>()
        .join("  ");
    out.push_str(line.trim_end());
    out.push('\n');
}
