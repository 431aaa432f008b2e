//! # Hardware generation
//!
//! Turns the members of an optimized program into state machines and wires
//! them together into one VHDL module.
//!
//! Every member reachable from a hardware entry member gets one
//! [ArchitectureComponent] per hardware instance its invocation instance
//! count configuration asks for. A component is a clocked process stepping
//! through the states of its member's body. Components invoke each other
//! through caller slots; slots sharing an instance are serialized by an
//! arbiter. The host starts the entry members through the ports of the top
//! level entity, see [ExternalInvocationProxy].
mod arbiter;
mod builder;
mod component;
mod invocation;
mod member;
mod state_machine;
mod top;
mod types;

pub use builder::{build_hardware, HardwareDesign};
pub use component::{ArchitectureComponent, ComponentInfo, MultiCycleOperation};
pub use top::{ExternalInvocationProxy, ENTITY_NAME};

#[cfg(test)]
mod tests {
    use super::*;
    use hast_ast::{
        intrinsics::SIMPLE_MEMORY_TYPE, Argument, BinaryOperator, Block,
        Expression, FieldDeclaration, Intrinsic, Invocation, MemberDeclaration,
        ParallelCall, ParameterDeclaration, ParameterMode, PrimitiveType,
        Program, Statement, TypeDeclaration, TypeReference, Value,
    };
    use hast_utils::{
        FullName, HardwareGenerationConfig, MemberInvocationInstanceCountConfiguration,
        WarningCode,
    };
    use hast_vhdl::{Vhdl, VhdlGenerationOptions};
    use std::collections::BTreeMap;

    fn int_ty() -> TypeReference {
        TypeReference::primitive(PrimitiveType::Int32)
    }

    fn int(v: i32) -> Expression {
        Expression::literal(Value::Int32(v))
    }

    fn member(
        name: &str,
        params: &[(&str, TypeReference)],
        body: Vec<Statement>,
        entry: bool,
    ) -> MemberDeclaration {
        let mut m = MemberDeclaration::new(FullName::new(name), int_ty());
        m.parameters = params
            .iter()
            .map(|(p, ty)| ParameterDeclaration {
                name: FullName::new(name).nested(p),
                ty: ty.clone(),
                mode: ParameterMode::Value,
            })
            .collect();
        m.body = Some(Block::new(body));
        m.is_hardware_entry = entry;
        m
    }

    fn param(member: &str, name: &str) -> Expression {
        Expression::parameter(FullName::new(member).nested(name))
    }

    fn build(members: Vec<MemberDeclaration>, config: HardwareGenerationConfig) -> HardwareDesign {
        let _ = env_logger::builder().is_test(true).try_init();
        let mut ty = TypeDeclaration::new(FullName::new("T"));
        ty.members = members;
        let ctx = hast_opt::Context::new(Program::new(vec![ty]), config);
        build_hardware(&ctx, &BTreeMap::new()).unwrap()
    }

    fn text(design: &HardwareDesign) -> String {
        design.module.to_vhdl(&VhdlGenerationOptions::default())
    }

    const ADD: &str = "T::Add(System.Int32,System.Int32)";

    #[test]
    fn entry_member_becomes_a_state_machine() {
        let body = vec![Statement::ret(Expression::binary(
            BinaryOperator::Add,
            param(ADD, "a"),
            param(ADD, "b"),
        ))];
        let design = build(
            vec![member(ADD, &[("a", int_ty()), ("b", int_ty())], body, true)],
            HardwareGenerationConfig::default(),
        );
        assert!(design.warnings.is_empty());
        assert_eq!(design.components.len(), 1);
        assert_eq!(design.components[0].name, format!("{ADD}.0"));
        let text = text(&design);
        assert!(text.contains(&format!("\\{ADD}.0\\: process (\\Clock\\)")));
        assert!(text.contains(&format!("(\\{ADD}.0.a\\ + \\{ADD}.0.b\\)")));
        assert!(text.contains("\\Hast_IP.Dispatch\\"));
    }

    #[test]
    fn division_waits_for_its_result() {
        const DIV: &str = "T::Div(System.Int32,System.Int32)";
        let body = vec![Statement::ret(Expression::binary(
            BinaryOperator::Divide,
            param(DIV, "a"),
            param(DIV, "b"),
        ))];
        let design = build(
            vec![member(DIV, &[("a", int_ty()), ("b", int_ty())], body, true)],
            HardwareGenerationConfig::default(),
        );
        let info = &design.components[0];
        assert_eq!(info.multi_cycle_operations().len(), 1);
        let op = info
            .multi_cycle_operation(&format!("{DIV}.0.divide"))
            .unwrap();
        assert_eq!(op.required_clock_cycles_ceiling, 4);
        assert!(text(&design).contains("attribute \\dont_touch\\"));
    }

    #[test]
    fn generated_signals_avoid_local_names() {
        const DIV: &str = "T::Div(System.Int32,System.Int32)";
        let quotient = FullName::new(DIV).nested("divide");
        let value = Expression::binary(
            BinaryOperator::Divide,
            param(DIV, "a"),
            param(DIV, "b"),
        );
        let body = vec![
            Statement::declare(quotient, int_ty(), Some(value)),
            Statement::ret(Expression::local(quotient)),
        ];
        let design = build(
            vec![member(DIV, &[("a", int_ty()), ("b", int_ty())], body, true)],
            HardwareGenerationConfig::default(),
        );
        let ops = design.components[0].multi_cycle_operations();
        assert_eq!(ops.len(), 1);
        assert_eq!(ops[0].result.name, format!("{DIV}.0.divide.0"));
        let text = text(&design);
        assert!(text.contains(&format!("variable \\{DIV}.0.divide\\: ")));
        assert!(text.contains(&format!("signal \\{DIV}.0.divide.0\\: ")));
    }

    #[test]
    fn recursion_is_bounded_by_the_configured_depth() {
        const F: &str = "T::F(System.Int32)";
        let recurse = Expression::Invocation(Invocation::new_static(
            FullName::new(F),
            vec![Expression::binary(BinaryOperator::Subtract, param(F, "n"), int(1))],
        ));
        let body = vec![
            Statement::if_else(
                Expression::binary(BinaryOperator::GreaterThan, param(F, "n"), int(0)),
                vec![Statement::ret(recurse)],
                None,
            ),
            Statement::ret(int(0)),
        ];
        let config = HardwareGenerationConfig::default()
            .with_instance_count(MemberInvocationInstanceCountConfiguration::new("T::F", 1, 1));
        let design = build(vec![member(F, &[("n", int_ty())], body, true)], config);
        assert_eq!(design.components.len(), 2);
        assert_eq!(
            design.components[0].invoked_members(),
            &[(FullName::new(F), 1)]
        );
        let exceeded = design
            .warnings
            .iter()
            .filter(|w| w.code == WarningCode::RecursionDepthExceeded)
            .count();
        assert_eq!(exceeded, 1);
    }

    #[test]
    fn unsupported_members_are_skipped_with_their_callers() {
        let mut half = MemberDeclaration::new(
            FullName::new("T::Half()"),
            TypeReference::primitive(PrimitiveType::Double),
        );
        half.body = Some(Block::new(vec![Statement::ret(Expression::literal(
            Value::Double(0.5),
        ))]));
        let caller = member(
            "T::A()",
            &[],
            vec![
                Statement::Expression(Expression::call(FullName::new("T::Half()"), vec![])),
                Statement::ret(int(1)),
            ],
            true,
        );
        let design = build(vec![caller, half], HardwareGenerationConfig::default());
        assert!(design.components.is_empty());
        let mut subjects = design
            .warnings
            .iter()
            .filter(|w| w.code == WarningCode::UnsupportedConstruct)
            .filter_map(|w| w.subject)
            .collect::<Vec<_>>();
        subjects.sort();
        assert_eq!(subjects, vec![FullName::new("T::A()"), FullName::new("T::Half()")]);
    }

    #[test]
    fn memory_accesses_use_the_memory_ports() {
        const COPY: &str = "T::Copy(Hast.Transformer.SimpleMemory.SimpleMemory)";
        let memory = || Some(Box::new(param(COPY, "memory")));
        let read = Expression::Invocation(Invocation {
            member: Intrinsic::MemoryRead(PrimitiveType::Int32).member_name(),
            target: memory(),
            arguments: vec![Argument::by_value(int(0))],
        });
        let write = Expression::Invocation(Invocation {
            member: Intrinsic::MemoryWrite(PrimitiveType::Int32).member_name(),
            target: memory(),
            arguments: vec![Argument::by_value(int(1)), Argument::by_value(read)],
        });
        let memory_ty = TypeReference::Named(FullName::new(SIMPLE_MEMORY_TYPE));
        let copy = member(
            COPY,
            &[("memory", memory_ty)],
            vec![Statement::Expression(write), Statement::ret(int(0))],
            true,
        );
        let design = build(vec![copy.clone()], HardwareGenerationConfig::default());
        assert!(design.warnings.is_empty());
        let text = text(&design);
        assert!(text.contains(&format!("\\CellIndex\\ <= \\{COPY}.0.CellIndex\\;")));
        assert!(text.contains(&format!("\\{COPY}.0.ReadEnable\\ <= true;")));

        let config = HardwareGenerationConfig {
            use_simple_memory: false,
            ..Default::default()
        };
        let design = build(vec![copy], config);
        assert!(design.components.is_empty());
        assert_eq!(design.warnings[0].code, WarningCode::UnsupportedConstruct);
    }

    #[test]
    fn parallel_invocations_beyond_the_parallelism_are_serialized() {
        const WORK: &str = "T::Work(System.Int32)";
        let work = member(WORK, &[("x", int_ty())], vec![Statement::ret(param(WORK, "x"))], false);
        let calls = (0..3)
            .map(|i| ParallelCall {
                target: None,
                invocation: Invocation::new_static(FullName::new(WORK), vec![int(i)]),
            })
            .collect();
        let run = member(
            "T::Run()",
            &[],
            vec![Statement::ParallelInvocation(calls), Statement::ret(int(0))],
            true,
        );
        let config = HardwareGenerationConfig::default()
            .with_instance_count(MemberInvocationInstanceCountConfiguration::new(WORK, 0, 2));
        let design = build(vec![run, work], config);
        let names = design.components.iter().map(|c| c.name.as_str()).collect::<Vec<_>>();
        assert_eq!(names, vec!["T::Run().0", "T::Work(System.Int32).0", "T::Work(System.Int32).1"]);
        assert_eq!(
            design.components[0].invoked_members(),
            &[(FullName::new(WORK), 2)]
        );
        assert!(design
            .warnings
            .iter()
            .any(|w| w.code == WarningCode::SerializedInvocation));
    }

    #[test]
    fn reset_restores_initial_values() {
        const DIV: &str = "T::Div(System.Int32,System.Int32)";
        let counter = || Expression::static_field("T::Counter");
        let body = vec![
            Statement::assign(
                counter(),
                Expression::binary(
                    BinaryOperator::Divide,
                    param(DIV, "a"),
                    param(DIV, "b"),
                ),
            ),
            Statement::ret(counter()),
        ];
        let mut ty = TypeDeclaration::new(FullName::new("T"));
        ty.fields = vec![FieldDeclaration {
            name: FullName::new("T::Counter"),
            ty: int_ty(),
            is_static: true,
            is_property: false,
            initializer: Some(Value::Int32(5)),
        }];
        ty.members =
            vec![member(DIV, &[("a", int_ty()), ("b", int_ty())], body, true)];
        let ctx = hast_opt::Context::new(
            Program::new(vec![ty]),
            HardwareGenerationConfig::default(),
        );
        let design = build_hardware(&ctx, &BTreeMap::new()).unwrap();
        let options = VhdlGenerationOptions {
            format_code: false,
            ..Default::default()
        };
        let text = design.module.to_vhdl(&options);

        let label = format!("\\{DIV}.0\\: process");
        let process = &text[text.find(&label).unwrap()..];
        let process = &process[..process.find("end process").unwrap()];
        let (declarations, body) = process.split_once("\nbegin\n").unwrap();
        let (_, reset) = body
            .split_once("if ((\\Reset\\ = '1')) then\n")
            .unwrap();
        let (reset, _) = reset.split_once("\nelse\n").unwrap();
        let assigned = |name: &str, operator: &str| {
            reset
                .lines()
                .any(|l| l.starts_with(&format!("\\{name}\\ {operator} ")))
        };

        let five = format!("\"{:032b}\"", 5);
        assert!(
            reset.contains(&format!("\\T::Counter\\ := {five};")),
            "{reset}"
        );
        assert!(assigned(&format!("{DIV}.0.divide"), "<="), "{reset}");
        assert!(assigned(&format!("{DIV}.0.return"), "<="), "{reset}");
        assert!(assigned(&format!("{DIV}.0.Finished"), "<="), "{reset}");

        let variables = declarations
            .lines()
            .filter_map(|l| l.strip_prefix("variable "))
            .collect::<Vec<_>>();
        assert!(!variables.is_empty());
        for variable in variables {
            let (name, rest) = variable.split_once("\\: ").unwrap();
            let assignment = format!("{name}\\ := ");
            let restored = match rest.split_once(" := ") {
                Some((_, initial)) => {
                    let line = format!("{assignment}{initial}");
                    reset.lines().any(|l| l == line)
                }
                None => reset.lines().any(|l| l.starts_with(&assignment)),
            };
            assert!(restored, "{name}\n{reset}");
        }
    }
}
