pub mod block;
pub mod builder;
pub mod func;
pub mod inst;
pub mod interp;
pub mod module;
pub mod printer;
pub mod ty;
pub mod value;
pub mod verify;

pub use block::{Block, BlockId};
pub use builder::{FunctionBuilder, ModuleBuilder};
pub use func::{FuncId, Function};
pub use inst::{CmpKind, Inst, InstId, Op, Terminator};
pub use interp::{eval_function, Value};
pub use module::Module;
pub use ty::{FunctionSig, Type};
pub use value::{Constant, ValueId};
pub use verify::verify_function;
