//! IR obfuscation transforms.
//!
//! Two intraprocedural passes over an arena-based IR:
//!
//! - **Control-flow flattening**: rewrites a function's CFG into a single
//!   dispatch loop. A mutable integer cell selects which original block runs
//!   next; every original terminator becomes a state update plus a jump back
//!   to the loop head.
//! - **Instruction substitution**: rewrites `a + b` as `a - (-b)` and
//!   `a - b` as `a + (-b)`, driven by a cached per-function analysis.
//!
//! Both passes mutate functions in place and leave them well-formed and
//! semantically equivalent to their input.

pub mod analysis;
pub mod entity;
pub mod error;
pub mod ir;
pub mod pipeline;
pub mod transforms;
