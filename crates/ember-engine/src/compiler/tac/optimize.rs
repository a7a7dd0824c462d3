//! Optimization passes over three-address code.
//!
//! Each pass works on one function at a time and can be switched off on its
//! own through [`OptimizationPasses`].

use rustc_hash::{FxHashMap, FxHashSet};
use tracing::trace;

use super::{Address, TacFunction, TacInstr};
use crate::ast::Literal;
use crate::compiler::bytecode::OpCode;
use crate::config::OptimizationPasses;

/// Runs the enabled passes over a function.
pub fn optimize(function: &mut TacFunction, passes: &OptimizationPasses) {
    let before = function.body.len();
    if passes.algebraic {
        simplify_algebra(&mut function.body);
    }
    if passes.copy_propagation {
        propagate_copies(&mut function.body);
    }
    if passes.dead_temporaries {
        eliminate_dead_temporaries(&mut function.body);
    }
    if passes.redundant_returns {
        collapse_returns(&mut function.body);
    }
    trace!(
        before,
        after = function.body.len(),
        "optimized function"
    );
}

fn definition_counts(body: &[TacInstr]) -> FxHashMap<u32, usize> {
    let mut counts = FxHashMap::default();
    for instr in body {
        if let Some(temp) = instr.dest_temp() {
            *counts.entry(temp).or_insert(0) += 1;
        }
    }
    counts
}

fn used_temporaries(body: &[TacInstr]) -> FxHashSet<u32> {
    body.iter()
        .flat_map(|instr| instr.operands())
        .filter_map(|address| match address {
            Address::Temp(temp) => Some(*temp),
            _ => None,
        })
        .collect()
}

// ============================================================================
// Dead temporaries
// ============================================================================

/// Removes definitions of temporaries that are never read.
///
/// Calls and constructions stay: only their result is dropped.
pub fn eliminate_dead_temporaries(body: &mut Vec<TacInstr>) -> bool {
    let mut changed = false;
    loop {
        let used = used_temporaries(body);
        let mut removed = false;
        body.retain_mut(|instr| {
            let Some(temp) = instr.dest_temp() else {
                return true;
            };
            if used.contains(&temp) {
                return true;
            }
            removed = true;
            match instr {
                TacInstr::Call { dest, .. } | TacInstr::New { dest, .. } => {
                    *dest = None;
                    true
                }
                _ => false,
            }
        });
        if !removed {
            return changed;
        }
        changed = true;
    }
}

// ============================================================================
// Redundant returns
// ============================================================================

/// Drops everything between a return and the next label, including the guard
/// return that ends a body which already returned.
pub fn collapse_returns(body: &mut Vec<TacInstr>) -> bool {
    let before = body.len();
    let mut reachable = true;
    body.retain(|instr| {
        if matches!(instr, TacInstr::Label(_)) {
            reachable = true;
        }
        if !reachable {
            return false;
        }
        if matches!(instr, TacInstr::Return(_)) {
            reachable = false;
        }
        true
    });
    body.len() != before
}

// ============================================================================
// Algebraic simplification
// ============================================================================

fn const_number(address: &Address) -> Option<f64> {
    match address {
        Address::Const(Literal::Number(n)) => Some(*n),
        _ => None,
    }
}

fn is_zero(address: &Address) -> bool {
    const_number(address) == Some(0.0)
}

/// Temporaries whose single definition always produces a number other than
/// negative zero. Bitwise and shift results are integers, so they qualify.
fn signed_zero_free_temporaries(body: &[TacInstr]) -> FxHashSet<u32> {
    let defs = definition_counts(body);
    body.iter()
        .filter_map(|instr| {
            let qualifies = match instr {
                TacInstr::Binary { op, .. } => matches!(
                    op,
                    OpCode::BitAnd
                        | OpCode::BitOr
                        | OpCode::BitXor
                        | OpCode::Shl
                        | OpCode::Shr
                        | OpCode::Ushr
                ),
                TacInstr::Unary { op, .. } => matches!(op, OpCode::BitNot),
                TacInstr::Copy { src, .. } => const_number(src).is_some_and(not_negative_zero),
                _ => false,
            };
            let temp = instr.dest_temp()?;
            (qualifies && defs.get(&temp) == Some(&1)).then_some(temp)
        })
        .collect()
}

fn not_negative_zero(n: f64) -> bool {
    !(n == 0.0 && n.is_sign_negative())
}

/// True when `address` is statically a number that is not `-0`.
///
/// `-0 + 0` is `+0`, so folding `x+0` to `x` is only sound when `x` can
/// never be negative zero.
fn adds_zero_exactly(address: &Address, safe: &FxHashSet<u32>) -> bool {
    match address {
        Address::Const(Literal::Number(n)) => not_negative_zero(*n),
        Address::Temp(temp) => safe.contains(temp),
        _ => false,
    }
}

/// Rewrites `x*0` and `x+0` into copies.
///
/// `x*0` only folds when `x` is a finite number literal, since NaN and the
/// infinities do not produce zero. `x+0` folds when `x` is statically a
/// number other than `-0`; for any other operand `+` may concatenate.
pub fn simplify_algebra(body: &mut [TacInstr]) -> bool {
    let safe = signed_zero_free_temporaries(body);
    let mut changed = false;
    for instr in body.iter_mut() {
        let replacement = match instr {
            TacInstr::Binary {
                dest,
                op: OpCode::Mul,
                left,
                right,
            } => match (const_number(left), const_number(right)) {
                (Some(a), Some(b))
                    if (a == 0.0 || b == 0.0) && a.is_finite() && b.is_finite() =>
                {
                    Some((*dest, Address::Const(Literal::Number(a * b))))
                }
                _ => None,
            },
            TacInstr::Binary {
                dest,
                op: OpCode::Add,
                left,
                right,
            } => {
                if is_zero(right) && adds_zero_exactly(left, &safe) {
                    Some((*dest, left.clone()))
                } else if is_zero(left) && adds_zero_exactly(right, &safe) {
                    Some((*dest, right.clone()))
                } else {
                    None
                }
            }
            _ => None,
        };
        if let Some((dest, src)) = replacement {
            *instr = TacInstr::Copy {
                dest: Address::Temp(dest),
                src,
            };
            changed = true;
        }
    }
    changed
}

// ============================================================================
// Copy propagation
// ============================================================================

/// Replaces reads of a temporary defined once by a plain copy with the copy's
/// source.
///
/// Uses are rewritten only inside the basic block of the definition. For a
/// variable source the walk also stops at any write to that variable and at
/// any call, which may write it through the frame chain.
pub fn propagate_copies(body: &mut [TacInstr]) -> bool {
    let defs = definition_counts(body);
    let mut changed = false;

    for i in 0..body.len() {
        let (temp, src) = match &body[i] {
            TacInstr::Copy {
                dest: Address::Temp(temp),
                src,
            } if defs.get(temp) == Some(&1) => (*temp, src.clone()),
            _ => continue,
        };
        if let Address::Temp(source) = &src {
            if defs.get(source) != Some(&1) {
                continue;
            }
        }

        for instr in body.iter_mut().skip(i + 1) {
            if matches!(instr, TacInstr::Label(_)) {
                break;
            }
            for operand in instr.operands_mut() {
                if *operand == Address::Temp(temp) {
                    *operand = src.clone();
                    changed = true;
                }
            }
            if instr.is_block_boundary() {
                break;
            }
            if let Address::Var(name) = &src {
                if instr.is_call() || instr.writes_var(name) {
                    break;
                }
            }
        }
    }
    changed
}
