use crate::{
    DataObjectReference, DataType, DeclarationBlock, Vhdl, VhdlExpression,
    VhdlWriter,
};
use itertools::Itertools;

#[derive(Clone, Debug, PartialEq)]
pub enum Comment {
    Line(String),
    Block(String),
    /// Rendered even when comments are omitted.
    UnOmittableBlock(String),
}

impl Vhdl for Comment {
    fn write_vhdl(&self, w: &mut VhdlWriter) {
        let (text, block) = match self {
            Comment::Line(text) => (text, false),
            Comment::Block(text) => (text, true),
            Comment::UnOmittableBlock(text) => (text, true),
        };
        let omittable = !matches!(self, Comment::UnOmittableBlock(_));
        if omittable && w.options().omit_comments {
            return;
        }
        if block {
            w.line("--".repeat(20));
        }
        for line in text.lines() {
            if line.is_empty() {
                w.line("--");
            } else {
                w.line(format!("-- {line}"));
            }
        }
        if block {
            w.line("--".repeat(20));
        }
    }
}

#[derive(Clone, Debug, PartialEq)]
pub struct CaseAlternative {
    /// `None` for `others`.
    pub choice: Option<VhdlExpression>,
    pub body: Vec<SequentialStatement>,
}

/// Statements inside a process.
#[derive(Clone, Debug, PartialEq)]
pub enum SequentialStatement {
    Assignment {
        target: VhdlExpression,
        value: VhdlExpression,
    },
    If {
        condition: VhdlExpression,
        then: Vec<SequentialStatement>,
        elsifs: Vec<(VhdlExpression, Vec<SequentialStatement>)>,
        otherwise: Vec<SequentialStatement>,
    },
    Case {
        expression: VhdlExpression,
        alternatives: Vec<CaseAlternative>,
    },
    /// `for <variable> in <from> to <to> loop`
    For {
        variable: String,
        from: i64,
        to: i64,
        body: Vec<SequentialStatement>,
    },
    /// Only valid in function bodies.
    Return(VhdlExpression),
    Comment(Comment),
    Null,
}

impl SequentialStatement {
    pub fn assign<T, V>(target: T, value: V) -> Self
    where
        T: Into<VhdlExpression>,
        V: Into<VhdlExpression>,
    {
        SequentialStatement::Assignment {
            target: target.into(),
            value: value.into(),
        }
    }

    pub fn if_then(
        condition: VhdlExpression,
        then: Vec<SequentialStatement>,
    ) -> Self {
        SequentialStatement::If {
            condition,
            then,
            elsifs: vec![],
            otherwise: vec![],
        }
    }

    pub fn if_else(
        condition: VhdlExpression,
        then: Vec<SequentialStatement>,
        otherwise: Vec<SequentialStatement>,
    ) -> Self {
        SequentialStatement::If {
            condition,
            then,
            elsifs: vec![],
            otherwise,
        }
    }

    pub fn comment<S: ToString>(text: S) -> Self {
        SequentialStatement::Comment(Comment::Line(text.to_string()))
    }
}

fn write_body(body: &[SequentialStatement], w: &mut VhdlWriter) {
    if body.is_empty() {
        SequentialStatement::Null.write_vhdl(w);
    } else {
        body.write_vhdl(w);
    }
}

impl Vhdl for SequentialStatement {
    fn write_vhdl(&self, w: &mut VhdlWriter) {
        match self {
            SequentialStatement::Assignment { target, value } => {
                let op = target
                    .target_reference()
                    .map_or("<=", |r| r.kind.assignment_operator());
                w.line(format!("{} {op} {};", target.inline(w), value.inline(w)));
            }
            SequentialStatement::If {
                condition,
                then,
                elsifs,
                otherwise,
            } => {
                w.line(format!("if ({}) then", condition.inline(w)));
                w.indented(|w| write_body(then, w));
                for (cond, body) in elsifs {
                    w.line(format!("elsif ({}) then", cond.inline(w)));
                    w.indented(|w| write_body(body, w));
                }
                if !otherwise.is_empty() {
                    w.line("else");
                    w.indented(|w| otherwise.write_vhdl(w));
                }
                w.line("end if;");
            }
            SequentialStatement::Case {
                expression,
                alternatives,
            } => {
                w.line(format!("case ({}) is", expression.inline(w)));
                w.indented(|w| {
                    for alt in alternatives {
                        let choice = alt
                            .choice
                            .as_ref()
                            .map_or("others".to_string(), |c| c.inline(w));
                        w.line(format!("when {choice} =>"));
                        w.indented(|w| write_body(&alt.body, w));
                    }
                });
                w.line("end case;");
            }
            SequentialStatement::For {
                variable,
                from,
                to,
                body,
            } => {
                w.line(format!(
                    "for {} in {from} to {to} loop",
                    w.identifier(variable)
                ));
                w.indented(|w| write_body(body, w));
                w.line("end loop;");
            }
            SequentialStatement::Return(value) => {
                w.line(format!("return {};", value.inline(w)))
            }
            SequentialStatement::Comment(comment) => comment.write_vhdl(w),
            SequentialStatement::Null => w.line("null;"),
        }
    }
}

/// A function with its own variables. Parameters are constants.
#[derive(Clone, Debug, PartialEq)]
pub struct Function {
    pub name: String,
    pub parameters: Vec<(String, DataType)>,
    pub return_type: DataType,
    pub declarations: DeclarationBlock,
    pub body: Vec<SequentialStatement>,
}

impl Vhdl for Function {
    fn write_vhdl(&self, w: &mut VhdlWriter) {
        let parameters = self
            .parameters
            .iter()
            .map(|(name, ty)| format!("{}: {}", w.identifier(name), ty.inline(w)))
            .join("; ");
        let name = w.identifier(&self.name);
        w.line(format!(
            "function {name}({parameters}) return {} is",
            self.return_type.inline(w)
        ));
        w.indented(|w| self.declarations.write_vhdl(w));
        w.line("begin");
        w.indented(|w| self.body.write_vhdl(w));
        w.line(format!("end {name};"));
    }
}

/// A clocked process. Its variables are declared in its own block.
#[derive(Default)]
pub struct Process {
    pub label: String,
    pub sensitivity: Vec<DataObjectReference>,
    pub declarations: DeclarationBlock,
    pub body: Vec<SequentialStatement>,
}

impl Process {
    pub fn new<S: ToString>(label: S) -> Self {
        Process {
            label: label.to_string(),
            ..Default::default()
        }
    }
}

impl Vhdl for Process {
    fn write_vhdl(&self, w: &mut VhdlWriter) {
        let label = w.identifier(&self.label);
        let sensitivity = self
            .sensitivity
            .iter()
            .map(|s| w.identifier(&s.name))
            .join(", ");
        w.line(format!("{label}: process ({sensitivity})"));
        w.indented(|w| self.declarations.write_vhdl(w));
        w.line("begin");
        w.indented(|w| self.body.write_vhdl(w));
        w.line(format!("end process {label};"));
    }
}

/// Statements of an architecture body.
pub enum ConcurrentStatement {
    Process(Process),
    Assignment {
        target: DataObjectReference,
        value: VhdlExpression,
    },
    Comment(Comment),
}

impl Vhdl for ConcurrentStatement {
    fn write_vhdl(&self, w: &mut VhdlWriter) {
        match self {
            ConcurrentStatement::Process(p) => {
                p.write_vhdl(w);
                w.blank();
            }
            ConcurrentStatement::Assignment { target, value } => w.line(
                format!("{} <= {};", w.identifier(&target.name), value.inline(w)),
            ),
            ConcurrentStatement::Comment(c) => c.write_vhdl(w),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{VhdlGenerationOptions, VhdlValue};

    #[test]
    fn assignment_operator_follows_kind() {
        let options = VhdlGenerationOptions::default();
        let body = vec![
            SequentialStatement::assign(
                DataObjectReference::signal("s"),
                VhdlValue::Boolean(true),
            ),
            SequentialStatement::assign(
                DataObjectReference::variable("v"),
                VhdlValue::Integer(1),
            ),
        ];
        assert_eq!(body.to_vhdl(&options), "\\s\\ <= true;\n\\v\\ := 1;\n");
    }

    #[test]
    fn comments_can_be_omitted() {
        let options = VhdlGenerationOptions {
            omit_comments: true,
            ..Default::default()
        };
        let comments = vec![
            Comment::Line("gone".to_string()),
            Comment::Block("gone too".to_string()),
            Comment::UnOmittableBlock("kept".to_string()),
        ];
        let text = comments.to_vhdl(&options);
        assert!(!text.contains("gone"));
        assert!(text.contains("-- kept"));
    }

    #[test]
    fn functions_render() {
        let options = VhdlGenerationOptions {
            format_code: false,
            ..Default::default()
        };
        let f = Function {
            name: "Twice".to_string(),
            parameters: vec![("x".to_string(), DataType::Integer)],
            return_type: DataType::Integer,
            declarations: DeclarationBlock::default(),
            body: vec![SequentialStatement::Return(VhdlExpression::binary(
                crate::VhdlBinaryOperator::Add,
                DataObjectReference::variable("x"),
                DataObjectReference::variable("x"),
            ))],
        };
        assert_eq!(
            f.to_vhdl(&options),
            "function \\Twice\\(\\x\\: integer) return integer is\n\
             begin\n\
             return (\\x\\ + \\x\\);\n\
             end \\Twice\\;\n"
        );
    }

    #[test]
    fn empty_branches_get_null() {
        let options = VhdlGenerationOptions::default();
        let stmt = SequentialStatement::if_then(
            VhdlExpression::is_true(DataObjectReference::signal("go")),
            vec![],
        );
        assert_eq!(
            stmt.to_vhdl(&options),
            "if ((\\go\\ = true)) then\n    null;\nend if;\n"
        );
    }
}
