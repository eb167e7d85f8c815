use fxhash::FxBuildHasher;
use indexmap::IndexMap;

use crate::isa::Instruction;
use crate::span::Span;

type FxMap<K, V> = IndexMap<K, V, FxBuildHasher>;

/// Label name -> program counter, in order of definition.
pub type Labels = FxMap<String, usize>;

/// Single line of assembly source.
#[derive(Clone, PartialEq, Eq, Debug)]
pub struct Line {
    pub kind: LineKind,
    /// Text after `;`, excluding the `;`
    pub comment: Option<String>,
    /// Location of the line content in source. Dummy for constructed lines.
    pub span: Span,
}

#[derive(Clone, PartialEq, Eq, Debug)]
pub enum LineKind {
    Instruction(Instruction),
    /// `name:`, refers to the next instruction
    Label(String),
    Empty,
}

impl Line {
    pub fn new(kind: LineKind) -> Self {
        Line {
            kind,
            comment: None,
            span: Span::dummy(),
        }
    }

    pub fn with_comment(mut self, comment: impl Into<String>) -> Self {
        self.comment = Some(comment.into());
        self
    }
}

/// Decoded instructions and resolved labels, ready to execute.
#[derive(Clone, PartialEq, Eq, Debug, Default)]
pub struct Program {
    instructions: Vec<Instruction>,
    labels: Labels,
    /// Source line index of each instruction
    pc_to_line: Vec<usize>,
    /// Program counter of each source line, if the line is an instruction
    line_to_pc: Vec<Option<usize>>,
}

impl Program {
    /// Build a program without any source line information.
    pub fn new(instructions: Vec<Instruction>, labels: Labels) -> Self {
        Program {
            pc_to_line: (0..instructions.len()).collect(),
            line_to_pc: (0..instructions.len()).map(Some).collect(),
            instructions,
            labels,
        }
    }

    /// Assign consecutive program counters to instruction lines, and point each label at the
    /// instruction following it.
    ///
    /// A label defined twice refers to its last definition.
    pub fn from_lines(lines: &[Line]) -> Self {
        let mut program = Program::default();
        for (i, line) in lines.iter().enumerate() {
            let pc = program.instructions.len();
            match &line.kind {
                LineKind::Instruction(instruction) => {
                    program.instructions.push(instruction.clone());
                    program.pc_to_line.push(i);
                    program.line_to_pc.push(Some(pc));
                }
                LineKind::Label(label) => {
                    program.labels.insert(label.clone(), pc);
                    program.line_to_pc.push(None);
                }
                LineKind::Empty => program.line_to_pc.push(None),
            }
        }
        program
    }

    pub fn instruction(&self, pc: usize) -> Option<&Instruction> {
        self.instructions.get(pc)
    }

    pub fn instructions(&self) -> &[Instruction] {
        &self.instructions
    }

    pub fn labels(&self) -> &Labels {
        &self.labels
    }

    pub fn len(&self) -> usize {
        self.instructions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.instructions.is_empty()
    }

    pub fn pc_to_line(&self, pc: usize) -> Option<usize> {
        self.pc_to_line.get(pc).copied()
    }

    pub fn line_to_pc(&self, line: usize) -> Option<usize> {
        self.line_to_pc.get(line).copied().flatten()
    }

    /// Label pointing at `pc`, if any. Returns the first defined.
    pub fn label_at(&self, pc: usize) -> Option<&str> {
        self.labels
            .iter()
            .find(|(_, target)| **target == pc)
            .map(|(name, _)| name.as_str())
    }
}
