//! Decode driver
//!
//! Walks a method body in address order, routes every stack effect through
//! [`StackBranches`], and assembles the popped producers into an
//! [`Expr`] tree. Instructions that leave nothing on the stack become
//! [`Statement`]s.

use std::collections::BTreeMap;

use il2c_bytecode::{Address, MethodBody, Module};
use rustc_hash::FxHashMap;
use tracing::{debug, warn};

use crate::branch::Slot;
use crate::branches::{Popped, StackBranches};
use crate::error::{StackError, StackResult};
use crate::node::NodeArena;
use crate::tree::{Expr, PhiIncoming, Statement, TranslatedMethod};

/// Options for a module-wide translation pass
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct TranslateOptions {
    /// Stop at the first method that fails
    pub fail_fast: bool,
}

/// Translates method bodies one at a time, reusing one engine
#[derive(Debug, Default)]
pub struct MethodTranslator {
    engine: StackBranches,
}

impl MethodTranslator {
    /// Create a new translator
    pub fn new() -> Self {
        Self::default()
    }

    /// Rebuild the expression tree of `body`
    pub fn translate(&mut self, body: &MethodBody) -> StackResult<TranslatedMethod> {
        self.engine.clear();
        let mut arena = NodeArena::from_body(body)?;
        let mut pending: FxHashMap<Address, Expr> = FxHashMap::default();
        let mut roots: Vec<Expr> = Vec::new();

        debug!(method = body.display_name(), instructions = body.len(), "translate");

        for instruction in &body.instructions {
            let address = instruction.address;
            self.engine.advance_to(address)?;

            let mut popped = Vec::with_capacity(instruction.pops());
            for _ in 0..instruction.pops() {
                popped.push(self.engine.pop(&mut arena)?);
            }
            popped.reverse();

            // The jump's own operands belong to the path it executes on.
            self.engine.maybe_fork(&arena, address);

            let mut operands = Vec::with_capacity(popped.len());
            let mut args = Vec::with_capacity(popped.len());
            for Popped { slot, merge } in popped {
                let Slot::Value(value) = slot else {
                    return Err(StackError::inconsistent(
                        address,
                        "operand taken from a path that produced no value",
                    ));
                };
                operands.push(value);
                args.push(match merge {
                    Some(anchor) => merged(&arena, anchor, &mut pending)?,
                    None => take(&mut pending, value, address)?,
                });
            }
            arena.set_operands(address, operands)?;

            let expr = Expr::Op {
                address,
                opcode: instruction.opcode,
                operand: instruction.operand,
                args,
            };
            if instruction.pushes() > 0 {
                pending.insert(address, expr);
                self.engine.push(address);
            } else {
                roots.push(expr);
            }
        }

        let end = body
            .instructions
            .last()
            .map_or(Address(0), |instruction| instruction.address);
        if !pending.is_empty() {
            let mut left: Vec<Address> = pending.keys().copied().collect();
            left.sort();
            let left: Vec<String> = left.iter().map(Address::to_string).collect();
            return Err(StackError::inconsistent(
                end,
                format!("values left on the stack: {}", left.join(", ")),
            ));
        }
        if let Some(branch) = self.engine.branches().iter().find(|b| !b.is_empty()) {
            return Err(StackError::inconsistent(
                end,
                format!("{} still holds {} slot(s)", branch.id(), branch.len()),
            ));
        }

        let labels = arena.labels();
        let mut statements = Vec::with_capacity(roots.len());
        let mut after: Option<Address> = None;
        for expr in roots {
            let address = expr.address();
            let before = labels
                .iter()
                .copied()
                .filter(|label| *label <= address && after.is_none_or(|prev| *label > prev))
                .collect();
            statements.push(Statement {
                address,
                labels: before,
                expr,
            });
            after = Some(address);
        }

        let phis: BTreeMap<_, _> = arena
            .phis()
            .into_iter()
            .map(|(address, phi)| (address, phi.clone()))
            .collect();

        Ok(TranslatedMethod {
            name: body.display_name().to_string(),
            statements,
            phis,
            labels,
        })
    }
}

fn take(pending: &mut FxHashMap<Address, Expr>, value: Address, at: Address) -> StackResult<Expr> {
    pending.remove(&value).ok_or_else(|| {
        StackError::inconsistent(at, format!("value of {} was already consumed", value))
    })
}

/// Build the merge expression for the phi annotation attached at `anchor`
fn merged(
    arena: &NodeArena,
    anchor: Address,
    pending: &mut FxHashMap<Address, Expr>,
) -> StackResult<Expr> {
    let phi = arena
        .phi_at(anchor)
        .ok_or_else(|| StackError::inconsistent(anchor, "missing phi annotation"))?;

    let incoming = phi
        .iter()
        .map(|(value, label)| {
            Ok(PhiIncoming {
                label,
                value: take(pending, value, anchor)?,
            })
        })
        .collect::<StackResult<Vec<_>>>()?;

    Ok(Expr::Phi { anchor, incoming })
}

/// Translation outcome of one method
#[derive(Debug)]
pub struct MethodOutcome {
    /// Method name
    pub name: String,
    /// Tree, or the error that aborted this method
    pub result: StackResult<TranslatedMethod>,
}

/// Outcomes of a module-wide pass
#[derive(Debug)]
pub struct ModuleReport {
    /// Module name
    pub module: String,
    /// One entry per attempted method, in module order
    pub outcomes: Vec<MethodOutcome>,
}

impl ModuleReport {
    /// Successfully translated methods
    pub fn translated(&self) -> impl Iterator<Item = &TranslatedMethod> {
        self.outcomes.iter().filter_map(|o| o.result.as_ref().ok())
    }

    /// Failed methods with their errors
    pub fn failures(&self) -> impl Iterator<Item = (&str, &StackError)> {
        self.outcomes
            .iter()
            .filter_map(|o| o.result.as_ref().err().map(|err| (o.name.as_str(), err)))
    }

    /// Whether every attempted method translated
    pub fn is_success(&self) -> bool {
        self.outcomes.iter().all(|o| o.result.is_ok())
    }
}

/// Translate every method of `module`; a failure is scoped to its method
pub fn translate_module(module: &Module, options: &TranslateOptions) -> ModuleReport {
    let mut translator = MethodTranslator::new();
    let mut outcomes = Vec::with_capacity(module.methods.len());

    for method in &module.methods {
        let result = translator.translate(method);
        let failed = match &result {
            Ok(_) => false,
            Err(err) => {
                warn!(method = method.display_name(), error = %err, "translation failed");
                true
            }
        };
        outcomes.push(MethodOutcome {
            name: method.display_name().to_string(),
            result,
        });
        if failed && options.fail_fast {
            break;
        }
    }

    ModuleReport {
        module: module.name.clone(),
        outcomes,
    }
}
