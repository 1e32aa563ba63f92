//! Middle-end module - IR, lowering and optimization

pub mod ir;
pub mod ir_gen;
pub mod ir_printer;
pub mod optimize;
