//! Translate command - rebuild expression trees for every method of a module.

use std::fmt::Write as _;
use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::Args;
use il2c_bytecode::{Address, Module};
use il2c_stack::{ModuleReport, TranslatedMethod, translate_module};
use serde::Serialize;

use crate::config::{Config, OutputFormat};

#[derive(Args)]
pub struct TranslateCommand {
    /// Module file (JSON)
    pub module: PathBuf,

    /// Output as JSON
    #[arg(long)]
    pub json: bool,

    /// Stop at the first method that fails
    #[arg(long)]
    pub fail_fast: bool,
}

impl TranslateCommand {
    pub fn run(&self, config: &Config) -> Result<()> {
        let module = Module::load(&self.module)
            .with_context(|| format!("Failed to load {}", self.module.display()))?;
        let options = config.translate.options(self.fail_fast);
        let report = translate_module(&module, &options);

        let format = if self.json {
            OutputFormat::Json
        } else {
            config.output.format
        };
        match format {
            OutputFormat::Text => print!("{}", render_text(&report)),
            OutputFormat::Json => println!("{}", render_json(&report)?),
        }

        let failed = report.failures().count();
        if failed > 0 {
            anyhow::bail!(
                "{} of {} methods failed to translate",
                failed,
                report.outcomes.len()
            );
        }
        Ok(())
    }
}

#[derive(Serialize)]
struct ReportJson<'a> {
    module: &'a str,
    methods: Vec<&'a TranslatedMethod>,
    failures: Vec<FailureJson<'a>>,
}

#[derive(Serialize)]
struct FailureJson<'a> {
    method: &'a str,
    address: Option<Address>,
    error: String,
}

fn render_text(report: &ModuleReport) -> String {
    let mut out = String::new();
    let mut phis = 0;

    for outcome in &report.outcomes {
        match &outcome.result {
            Ok(method) => {
                phis += method.phi_count();
                let _ = writeln!(out, "{}\n", method);
            }
            Err(err) => {
                let _ = writeln!(out, "method {} failed: {}\n", outcome.name, err);
            }
        }
    }

    let _ = writeln!(
        out,
        "{}: {} translated, {} failed, {} phi",
        report.module,
        report.translated().count(),
        report.failures().count(),
        phis
    );
    out
}

fn render_json(report: &ModuleReport) -> Result<String> {
    let json = ReportJson {
        module: &report.module,
        methods: report.translated().collect(),
        failures: report
            .failures()
            .map(|(method, err)| FailureJson {
                method,
                address: err.address(),
                error: err.to_string(),
            })
            .collect(),
    };
    Ok(serde_json::to_string_pretty(&json)?)
}

#[cfg(test)]
mod tests {
    use super::*;
    use il2c_bytecode::{MethodBody, Opcode};
    use il2c_stack::TranslateOptions;

    fn report() -> ModuleReport {
        let module = Module::builder("demo")
            .method(MethodBody::builder("broken").op(0, Opcode::Pop).build())
            .method(
                MethodBody::builder("answer")
                    .ldc(0, 42)
                    .op(1, Opcode::Ret)
                    .build(),
            )
            .build();
        translate_module(&module, &TranslateOptions::default())
    }

    #[test]
    fn test_render_text() {
        let text = render_text(&report());
        assert!(text.contains("method broken failed: Stack underflow"));
        assert!(text.contains("method answer {\n    ret(ldc.i4 42)\n}"));
        assert!(text.ends_with("demo: 1 translated, 1 failed, 0 phi\n"));
    }

    #[test]
    fn test_render_json() {
        let json: serde_json::Value = serde_json::from_str(&render_json(&report()).unwrap()).unwrap();
        assert_eq!(json["module"], "demo");
        assert_eq!(json["methods"][0]["name"], "answer");
        assert_eq!(json["failures"][0]["method"], "broken");
        assert_eq!(json["failures"][0]["address"], 0);
    }
}
