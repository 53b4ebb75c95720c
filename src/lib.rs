pub mod codegen;
pub mod lexer;
pub mod parser;

pub use codegen::constants::Value;
pub use codegen::instr::{Instruction, OpCode};
pub use codegen::{CodegenError, Proto};
pub use lexer::LexError;
pub use parser::ParseError;

/// Any way a compilation can fail, from the first byte to the last
/// emitted instruction.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error(transparent)]
    Lex(#[from] LexError),
    #[error(transparent)]
    Parse(#[from] ParseError),
    #[error(transparent)]
    Codegen(#[from] CodegenError),
}

/// Compile a source text into the bytecode for its main chunk.
pub fn compile(source: &str) -> Result<Proto, Error> {
    parser::parse_chunk(source)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn compile_empty_chunk() {
        let proto = compile("").unwrap();
        assert_eq!(proto.code.len(), 1);
        assert_eq!(proto.code[0].opcode(), OpCode::Return);
    }

    #[test]
    fn lex_error_surfaces() {
        assert!(matches!(compile("local @"), Err(Error::Lex(_))));
    }

    #[test]
    fn parse_error_surfaces() {
        assert!(matches!(compile("if x then"), Err(Error::Parse(_))));
    }
}
