//! Blocks command - show label status and block origin of every instruction.

use std::fmt::Write as _;
use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::Args;
use il2c_bytecode::{MethodBody, Module};
use il2c_stack::{BlockOrigin, NodeArena};

#[derive(Args)]
pub struct BlocksCommand {
    /// Module file (JSON)
    pub module: PathBuf,
}

impl BlocksCommand {
    pub fn run(&self) -> Result<()> {
        let module = Module::load(&self.module)
            .with_context(|| format!("Failed to load {}", self.module.display()))?;

        for method in &module.methods {
            print!("{}", render_blocks(method)?);
        }
        Ok(())
    }
}

fn render_blocks(method: &MethodBody) -> Result<String> {
    let arena = NodeArena::from_body(method)
        .with_context(|| format!("Invalid method {}", method.display_name()))?;

    let mut out = String::new();
    let _ = writeln!(out, "method {}", method.display_name());
    for node in arena.nodes() {
        let address = node.address();
        let marker = if arena.is_label(address) { '*' } else { ' ' };
        let origin = match arena.block_start(address) {
            Some(start) => start.to_string(),
            None => "-".to_string(),
        };
        let instruction = node.instruction.to_string();
        let _ = writeln!(out, "  {} {:<32} block {}", marker, instruction, origin);
    }
    out.push('\n');
    Ok(out)
}
