//! Property tests for the branch engine

use il2c_bytecode::{Address, MethodBody, Opcode};
use il2c_stack::{BranchId, NodeArena, Slot, StackBranches, StackError};
use proptest::prelude::*;
use rustc_hash::FxHashSet;

#[derive(Debug, Clone)]
enum Step {
    Push,
    Pop,
    Fork(u32),
    Advance,
}

fn straight_line() -> impl Strategy<Value = Vec<bool>> {
    prop::collection::vec(any::<bool>(), 1..64)
}

fn forking() -> impl Strategy<Value = Vec<Step>> {
    prop::collection::vec(
        prop_oneof![
            3 => Just(Step::Push),
            2 => Just(Step::Pop),
            1 => (1u32..6).prop_map(Step::Fork),
            4 => Just(Step::Advance),
        ],
        1..80,
    )
}

/// A body of `nop`s at 0..=len, so every pushed value has a consumer
fn nops(len: u32) -> NodeArena {
    let body = (0..=len)
        .fold(MethodBody::builder("nops"), |body, address| body.op(address, Opcode::Nop))
        .build();
    NodeArena::from_body(&body).unwrap()
}

/// Every value slot held by any branch
fn held_values(engine: &StackBranches) -> FxHashSet<Address> {
    engine
        .branches()
        .iter()
        .flat_map(|branch| branch.slots().iter().filter_map(|slot| slot.value()))
        .collect()
}

/// Active branch id and every live root above it
fn active_chain(engine: &StackBranches) -> Vec<BranchId> {
    let mut chain = vec![engine.active_branch().id()];
    let mut next = engine.active_branch().root();
    while let Some(id) = next {
        let Some(branch) = engine.branches().iter().find(|b| b.id() == id) else {
            break;
        };
        chain.push(id);
        next = branch.root();
    }
    chain
}

proptest! {
    #[test]
    fn prop_straight_line_is_lifo(pushes in straight_line()) {
        let mut arena = NodeArena::default();
        let mut engine = StackBranches::new();
        let mut model: Vec<Address> = Vec::new();

        for (idx, push) in pushes.into_iter().enumerate() {
            let address = Address(idx as u32);
            engine.advance_to(address).unwrap();
            let step = if push { Step::Push } else { Step::Pop };

            match step {
                Step::Push => {
                    engine.push(address);
                    model.push(address);
                }
                _ => match model.pop() {
                    Some(expected) => {
                        let popped = engine.pop(&mut arena).unwrap();
                        prop_assert_eq!(popped.slot, Slot::Value(expected));
                        prop_assert_eq!(popped.merge, None);
                    }
                    None => {
                        let err = engine.pop(&mut arena).unwrap_err();
                        let is_underflow = matches!(
                            err,
                            StackError::StackUnderflow { address: Some(at), .. } if at == address
                        );
                        prop_assert!(is_underflow);
                    }
                },
            }

            prop_assert_eq!(engine.branch_count(), 1);
            prop_assert_eq!(engine.peek(), model.last().copied().map(Slot::Value));
        }
        prop_assert!(arena.phis().is_empty());
    }

    #[test]
    fn prop_exhausted_branches_are_collected(steps in forking()) {
        let mut engine = StackBranches::new();
        let mut cursor = 0u32;

        for step in steps {
            match step {
                Step::Push => engine.push(Address(cursor)),
                Step::Fork(offset) => {
                    // structured nesting: an arm never outlives its root
                    let stop = (cursor + offset).min(engine.active_branch().stop().0);
                    if stop > cursor {
                        engine.fork(Address(stop));
                    }
                }
                Step::Advance => {
                    cursor += 1;
                    prop_assert!(engine.advance_to(Address(cursor)).is_ok());

                    let chain = active_chain(&engine);
                    for branch in engine.branches() {
                        let exhausted = branch.is_closed_at(Address(cursor)) && branch.is_empty();
                        prop_assert!(!exhausted || chain.contains(&branch.id()));
                    }
                }
                // pops are covered with a real arena below
                Step::Pop => {}
            }
            prop_assert!(engine.branches().iter().any(|b| b.id() == engine.main_id()));
        }
    }

    #[test]
    fn prop_advance_is_idempotent(steps in forking()) {
        let mut engine = StackBranches::new();
        let mut cursor = 0u32;

        for step in steps {
            match step {
                Step::Push => engine.push(Address(cursor)),
                Step::Fork(offset) => {
                    let stop = (cursor + offset).min(engine.active_branch().stop().0);
                    if stop > cursor {
                        engine.fork(Address(stop));
                    }
                }
                Step::Advance | Step::Pop => {
                    cursor += 1;
                    engine.advance_to(Address(cursor)).unwrap();
                    let active = engine.active_branch().id();
                    let count = engine.branch_count();

                    engine.advance_to(Address(cursor)).unwrap();
                    prop_assert_eq!(engine.active_branch().id(), active);
                    prop_assert_eq!(engine.branch_count(), count);
                }
            }
        }
    }

    #[test]
    fn prop_pushed_values_are_conserved(steps in forking()) {
        let mut arena = nops(100);
        let mut engine = StackBranches::new();
        let mut live: FxHashSet<Address> = FxHashSet::default();
        let mut cursor = 0u32;
        let mut produced = 0u32;

        for step in steps {
            match step {
                Step::Push => {
                    let value = Address(produced);
                    produced += 1;
                    engine.push(value);
                    live.insert(value);
                }
                Step::Pop => {
                    if engine.is_empty() {
                        continue;
                    }
                    let popped = engine.pop(&mut arena).unwrap();
                    if let Some(value) = popped.slot.value() {
                        prop_assert!(live.remove(&value));
                    }
                    if let Some(consumer) = popped.merge {
                        let phi = arena.phi_at(consumer).unwrap();
                        for &value in phi.values() {
                            if popped.slot.value() != Some(value) {
                                prop_assert!(live.remove(&value));
                            }
                        }
                    }
                }
                Step::Fork(offset) => {
                    let stop = (cursor + offset).min(engine.active_branch().stop().0);
                    if stop > cursor {
                        engine.fork(Address(stop));
                    }
                }
                Step::Advance => {
                    cursor += 1;
                    prop_assert!(engine.advance_to(Address(cursor)).is_ok());
                }
            }
            // every value is either still held or was handed out by a pop
            prop_assert_eq!(&held_values(&engine), &live);
        }
    }
}
