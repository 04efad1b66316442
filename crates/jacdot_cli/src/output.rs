use crate::settings::OutputFormat;
use anyhow::Result;
use jacdot_core::derivation::RenderedExpr;
use jacdot_core::verify::CheckReport;
use jacdot_core::{Printer, RenderedDerivation};
use serde::Serialize;
use std::fmt::Write;

#[derive(Debug, Serialize)]
pub struct Report<'a> {
    pub expressions: &'a RenderedDerivation,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub checks: Option<&'a [CheckReport]>,
}

pub fn format_report(report: &Report, printer: &Printer, format: OutputFormat) -> Result<String> {
    match format {
        OutputFormat::Json => Ok(serde_json::to_string_pretty(report)?),
        OutputFormat::Text => Ok(text(report, printer)),
    }
}

fn text(report: &Report, printer: &Printer) -> String {
    let mut out = String::new();
    let expressions = report.expressions;
    out.push_str("# Theta_dot(theta, theta_dot)\n");
    block(&mut out, printer, &expressions.coefficient_rate);
    out.push_str("\n# theta_dot(phi, phi_dot)\n");
    block(&mut out, printer, &expressions.angle_rate);
    out.push_str("\n# theta_dot(phi, phi_dot, theta)\n");
    block(&mut out, printer, &expressions.angle_rate_compact);
    if let Some(checks) = report.checks {
        out.push_str("\n# checks\n");
        for check in checks {
            let status = if check.passed { "ok" } else { "FAILED" };
            let _ = writeln!(
                out,
                "{:<18} t={:<6} symbolic={:<24e} error={:.3e} {status}",
                check.name, check.time, check.symbolic, check.max_error
            );
        }
    }
    out
}

fn block(out: &mut String, printer: &Printer, rendered: &RenderedExpr) {
    for line in &rendered.bindings {
        out.push_str(line);
        out.push('\n');
    }
    out.push_str(&printer.binding(&rendered.name, &rendered.expression));
    out.push('\n');
}

#[cfg(test)]
mod tests {
    use super::*;
    use jacdot_core::{derive, Language};

    #[test]
    fn text_output_lists_every_expression() {
        let printer = Printer::new(Language::Python);
        let rendered = derive().render(&printer, false).unwrap();
        let report = Report {
            expressions: &rendered,
            checks: None,
        };
        let text = format_report(&report, &printer, OutputFormat::Text).unwrap();
        assert!(text.contains("theta_coeff_dot = "));
        assert!(text.contains(
            "theta_dot = (phi0*phi0_dot + phi1*phi1_dot + phi2*phi2_dot)/math.sqrt(phi0**2 + phi1**2 + phi2**2)"
        ));
        assert!(text.contains("theta_dot = (phi0*phi0_dot + phi1*phi1_dot + phi2*phi2_dot)/theta"));
        assert!(!text.contains("# checks"));
    }

    #[test]
    fn json_output_is_structured() {
        let printer = Printer::new(Language::C);
        let rendered = derive().render(&printer, true).unwrap();
        let report = Report {
            expressions: &rendered,
            checks: None,
        };
        let json = format_report(&report, &printer, OutputFormat::Json).unwrap();
        let value: serde_json::Value = serde_json::from_str(&json).unwrap();
        assert_eq!(value["expressions"]["angle_rate"]["name"], "theta_dot");
        assert!(value["expressions"]["coefficient_rate"]["bindings"].is_array());
        assert!(value.get("checks").is_none());
    }
}
