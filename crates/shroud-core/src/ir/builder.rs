use crate::entity::PrimaryMap;

use super::block::{Block, BlockId};
use super::func::{FuncId, Function};
use super::inst::{CmpKind, Inst, Op, Terminator};
use super::module::Module;
use super::ty::{FunctionSig, Type};
use super::value::{Constant, ValueId};

/// Builder for constructing a single [`Function`].
///
/// Manages value allocation, block creation, and instruction emission.
/// Tracks a "current block" cursor; instructions are appended to it.
/// New blocks end in `Return(None)` until a terminator is emitted.
pub struct FunctionBuilder {
    func: Function,
    current_block: BlockId,
}

impl FunctionBuilder {
    /// Create a new function builder.
    ///
    /// Creates the entry block and allocates `ValueId`s for each parameter.
    pub fn new(name: impl Into<String>, sig: FunctionSig) -> Self {
        let mut blocks = PrimaryMap::new();
        let mut value_types = PrimaryMap::new();

        let mut params = Vec::with_capacity(sig.params.len());
        for ty in &sig.params {
            params.push(value_types.push(ty.clone()));
        }
        let entry = blocks.push(Block::new());

        let func = Function {
            name: name.into(),
            sig,
            params,
            blocks,
            insts: PrimaryMap::new(),
            value_types,
            entry,
        };

        Self {
            func,
            current_block: entry,
        }
    }

    /// Create a new block. Returns its `BlockId`.
    pub fn create_block(&mut self) -> BlockId {
        self.func.blocks.push(Block::new())
    }

    /// Switch the current block cursor to the given block.
    pub fn switch_to_block(&mut self, block: BlockId) {
        self.current_block = block;
    }

    /// Get the current block.
    pub fn current_block(&self) -> BlockId {
        self.current_block
    }

    /// Get the entry block.
    pub fn entry_block(&self) -> BlockId {
        self.func.entry
    }

    /// Get the `ValueId` for a function parameter by index.
    ///
    /// # Panics
    /// Panics if `index` is out of range.
    pub fn param(&self, index: usize) -> ValueId {
        self.func.params[index]
    }

    /// Look up the type of a value.
    pub fn value_type(&self, value: ValueId) -> Type {
        self.func.value_types[value].clone()
    }

    /// Consume the builder and return the constructed `Function`.
    pub fn build(self) -> Function {
        self.func
    }

    // -- internal helpers --

    /// Push an instruction with a result value into the current block.
    fn emit(&mut self, op: Op, ty: Type) -> ValueId {
        let value = self.func.value_types.push(ty);
        let inst_id = self.func.insts.push(Inst {
            op,
            result: Some(value),
        });
        self.func.blocks[self.current_block].insts.push(inst_id);
        value
    }

    /// Push a void instruction (no result value) into the current block.
    fn emit_void(&mut self, op: Op) {
        let inst_id = self.func.insts.push(Inst { op, result: None });
        self.func.blocks[self.current_block].insts.push(inst_id);
    }

    // -- constants --

    pub fn const_bool(&mut self, value: bool) -> ValueId {
        let c = Constant::Bool(value);
        let ty = c.ty();
        self.emit(Op::Const(c), ty)
    }

    pub fn const_int(&mut self, value: i64) -> ValueId {
        let c = Constant::Int(value);
        let ty = c.ty();
        self.emit(Op::Const(c), ty)
    }

    pub fn const_uint(&mut self, value: u64) -> ValueId {
        let c = Constant::UInt(value);
        let ty = c.ty();
        self.emit(Op::Const(c), ty)
    }

    pub fn const_float(&mut self, value: f64) -> ValueId {
        let c = Constant::Float(value);
        let ty = c.ty();
        self.emit(Op::Const(c), ty)
    }

    // -- arithmetic --

    pub fn add(&mut self, a: ValueId, b: ValueId) -> ValueId {
        let ty = self.value_type(a);
        self.emit(Op::Add(a, b), ty)
    }

    pub fn sub(&mut self, a: ValueId, b: ValueId) -> ValueId {
        let ty = self.value_type(a);
        self.emit(Op::Sub(a, b), ty)
    }

    pub fn mul(&mut self, a: ValueId, b: ValueId) -> ValueId {
        let ty = self.value_type(a);
        self.emit(Op::Mul(a, b), ty)
    }

    pub fn neg(&mut self, a: ValueId) -> ValueId {
        let ty = self.value_type(a);
        self.emit(Op::Neg(a), ty)
    }

    // -- comparison & logic --

    pub fn cmp(&mut self, kind: CmpKind, a: ValueId, b: ValueId) -> ValueId {
        self.emit(Op::Cmp(kind, a, b), Type::Bool)
    }

    pub fn not(&mut self, a: ValueId) -> ValueId {
        self.emit(Op::Not(a), Type::Bool)
    }

    pub fn select(&mut self, cond: ValueId, on_true: ValueId, on_false: ValueId) -> ValueId {
        let ty = self.value_type(on_true);
        self.emit(
            Op::Select {
                cond,
                on_true,
                on_false,
            },
            ty,
        )
    }

    // -- memory --

    pub fn alloc(&mut self, ty: Type) -> ValueId {
        self.emit(Op::Alloc(ty.clone()), ty)
    }

    pub fn load(&mut self, ptr: ValueId) -> ValueId {
        let ty = self.value_type(ptr);
        self.emit(Op::Load(ptr), ty)
    }

    pub fn store(&mut self, ptr: ValueId, value: ValueId) {
        self.emit_void(Op::Store { ptr, value });
    }

    // -- calls --

    pub fn call(&mut self, func: impl Into<String>, args: &[ValueId], ty: Type) -> ValueId {
        self.emit(
            Op::Call {
                func: func.into(),
                args: args.to_vec(),
            },
            ty,
        )
    }

    // -- terminators --

    pub fn ret(&mut self, value: Option<ValueId>) {
        self.func.blocks[self.current_block].term = Terminator::Return(value);
    }

    pub fn jump(&mut self, target: BlockId) {
        self.func.blocks[self.current_block].term = Terminator::Jump(target);
    }

    pub fn branch(&mut self, cond: ValueId, then_target: BlockId, else_target: BlockId) {
        self.func.blocks[self.current_block].term = Terminator::Branch {
            cond,
            then_target,
            else_target,
        };
    }

    pub fn switch(&mut self, value: ValueId, cases: Vec<(i64, BlockId)>, default: BlockId) {
        self.func.blocks[self.current_block].term = Terminator::Switch {
            value,
            cases,
            default,
        };
    }
}

/// Builder for constructing a [`Module`].
pub struct ModuleBuilder {
    module: Module,
}

impl ModuleBuilder {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            module: Module::new(name.into()),
        }
    }

    pub fn add_function(&mut self, func: Function) -> FuncId {
        self.module.functions.push(func)
    }

    pub fn build(self) -> Module {
        self.module
    }
}
