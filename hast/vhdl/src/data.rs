//! Types, values and data objects.
use crate::VhdlWriter;
use itertools::Itertools;
use serde::{Deserialize, Serialize};

/// Data types used by the generated hardware. Composite types carry their
/// definition, rendered by [crate::Declaration::Type].
#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum DataType {
    Boolean,
    StdLogic,
    StdLogicVector(u32),
    Signed(u32),
    Unsigned(u32),
    Integer,
    Enumeration { name: String, values: Vec<String> },
    Array {
        name: String,
        element: Box<DataType>,
        length: u32,
    },
}

impl DataType {
    /// The value a data object of this type holds after reset if it has no
    /// explicit initial value.
    pub fn default_value(&self) -> VhdlValue {
        match self {
            DataType::Boolean => VhdlValue::Boolean(false),
            DataType::StdLogic => VhdlValue::StdLogic(false),
            DataType::StdLogicVector(width)
            | DataType::Signed(width)
            | DataType::Unsigned(width) => VhdlValue::Bits {
                value: 0,
                width: *width,
            },
            DataType::Integer => VhdlValue::Integer(0),
            DataType::Enumeration { values, .. } => {
                VhdlValue::EnumerationValue(values.first().cloned().unwrap_or_default())
            }
            DataType::Array { element, .. } => {
                VhdlValue::Others(Box::new(element.default_value()))
            }
        }
    }

    /// Width in bits of the scalar types.
    pub fn width(&self) -> Option<u32> {
        match self {
            DataType::Boolean | DataType::StdLogic => Some(1),
            DataType::StdLogicVector(w)
            | DataType::Signed(w)
            | DataType::Unsigned(w) => Some(*w),
            DataType::Integer => Some(32),
            _ => None,
        }
    }

    pub fn is_composite(&self) -> bool {
        matches!(self, DataType::Enumeration { .. } | DataType::Array { .. })
    }

    pub(crate) fn inline(&self, w: &VhdlWriter) -> String {
        match self {
            DataType::Boolean => "boolean".to_string(),
            DataType::StdLogic => "std_logic".to_string(),
            DataType::StdLogicVector(width) => {
                format!("std_logic_vector({} downto 0)", width - 1)
            }
            DataType::Signed(width) => format!("signed({} downto 0)", width - 1),
            DataType::Unsigned(width) => {
                format!("unsigned({} downto 0)", width - 1)
            }
            DataType::Integer => "integer".to_string(),
            DataType::Enumeration { name, .. } | DataType::Array { name, .. } => {
                w.identifier(name)
            }
        }
    }

    /// The right hand side of the type's declaration.
    pub(crate) fn definition(&self, w: &VhdlWriter) -> String {
        match self {
            DataType::Enumeration { values, .. } => {
                format!("({})", values.iter().map(|v| w.identifier(v)).join(", "))
            }
            DataType::Array { element, length, .. } => format!(
                "array (0 to {}) of {}",
                length.saturating_sub(1),
                element.inline(w)
            ),
            other => other.inline(w),
        }
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum VhdlValue {
    Boolean(bool),
    StdLogic(bool),
    Integer(i64),
    /// A bit string of `width` bits holding the low bits of `value`. Used for
    /// every vector type.
    Bits { value: u128, width: u32 },
    EnumerationValue(String),
    /// `(others => value)`
    Others(Box<VhdlValue>),
}

impl VhdlValue {
    /// Two's complement bit pattern of `value` in a `width` bits vector.
    pub fn from_integer(value: i128, width: u32) -> Self {
        let mask = if width >= 128 {
            u128::MAX
        } else {
            (1u128 << width) - 1
        };
        VhdlValue::Bits {
            value: (value as u128) & mask,
            width,
        }
    }

    pub(crate) fn inline(&self, w: &VhdlWriter) -> String {
        match self {
            VhdlValue::Boolean(b) => b.to_string(),
            VhdlValue::StdLogic(true) => "'1'".to_string(),
            VhdlValue::StdLogic(false) => "'0'".to_string(),
            VhdlValue::Integer(i) => i.to_string(),
            VhdlValue::Bits { value, width } => {
                let bits: String = (0..*width)
                    .rev()
                    .map(|i| {
                        if i < 128 && (value >> i) & 1 == 1 {
                            '1'
                        } else {
                            '0'
                        }
                    })
                    .collect();
                format!("\"{bits}\"")
            }
            VhdlValue::EnumerationValue(v) => w.identifier(v),
            VhdlValue::Others(v) => format!("(others => {})", v.inline(w)),
        }
    }
}

#[derive(
    Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize,
)]
pub enum DataObjectKind {
    Constant,
    Signal,
    SharedVariable,
    Variable,
}

impl DataObjectKind {
    fn keyword(&self) -> &'static str {
        match self {
            DataObjectKind::Constant => "constant",
            DataObjectKind::Signal => "signal",
            DataObjectKind::SharedVariable => "shared variable",
            DataObjectKind::Variable => "variable",
        }
    }

    /// Assignment operator for targets of this kind.
    pub fn assignment_operator(&self) -> &'static str {
        match self {
            DataObjectKind::Signal => "<=",
            _ => ":=",
        }
    }
}

/// What consumers hold instead of a declaration.
#[derive(
    Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize,
)]
pub struct DataObjectReference {
    pub kind: DataObjectKind,
    pub name: String,
}

impl DataObjectReference {
    pub fn signal<S: ToString>(name: S) -> Self {
        DataObjectReference {
            kind: DataObjectKind::Signal,
            name: name.to_string(),
        }
    }

    pub fn variable<S: ToString>(name: S) -> Self {
        DataObjectReference {
            kind: DataObjectKind::Variable,
            name: name.to_string(),
        }
    }
}

#[derive(Clone, Debug, PartialEq)]
pub struct DataObjectDeclaration {
    pub kind: DataObjectKind,
    pub name: String,
    pub ty: DataType,
    pub initial_value: Option<VhdlValue>,
}

impl DataObjectDeclaration {
    pub fn new<S: ToString>(kind: DataObjectKind, name: S, ty: DataType) -> Self {
        DataObjectDeclaration {
            kind,
            name: name.to_string(),
            ty,
            initial_value: None,
        }
    }

    pub fn with_initial_value(mut self, value: VhdlValue) -> Self {
        self.initial_value = Some(value);
        self
    }

    pub fn reference(&self) -> DataObjectReference {
        DataObjectReference {
            kind: self.kind,
            name: self.name.clone(),
        }
    }

    /// The value set when the hardware is reset.
    pub fn reset_value(&self) -> VhdlValue {
        self.initial_value
            .clone()
            .unwrap_or_else(|| self.ty.default_value())
    }

    pub(crate) fn inline(&self, w: &VhdlWriter) -> String {
        let init = self
            .initial_value
            .as_ref()
            .map(|v| format!(" := {}", v.inline(w)))
            .unwrap_or_default();
        format!(
            "{} {}: {}{init};",
            self.kind.keyword(),
            w.identifier(&self.name),
            self.ty.inline(w)
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::VhdlGenerationOptions;

    #[test]
    fn values_render() {
        let options = VhdlGenerationOptions::default();
        let w = VhdlWriter::new(&options);
        assert_eq!(VhdlValue::from_integer(-1, 4).inline(&w), "\"1111\"");
        assert_eq!(VhdlValue::from_integer(5, 8).inline(&w), "\"00000101\"");
        assert_eq!(
            DataType::Array {
                name: "Mem".to_string(),
                element: Box::new(DataType::Boolean),
                length: 4
            }
            .default_value()
            .inline(&w),
            "(others => false)"
        );
    }

    #[test]
    fn declarations_render() {
        let options = VhdlGenerationOptions::default();
        let w = VhdlWriter::new(&options);
        let decl = DataObjectDeclaration::new(
            DataObjectKind::Signal,
            "A.x",
            DataType::Signed(8),
        )
        .with_initial_value(VhdlValue::from_integer(3, 8));
        assert_eq!(
            decl.inline(&w),
            "signal \\A.x\\: signed(7 downto 0) := \"00000011\";"
        );
        assert_eq!(decl.reference(), DataObjectReference::signal("A.x"));
    }
}
