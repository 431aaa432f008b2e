//! Builds the components of every member reachable from the hardware entry
//! points and assembles them into the top level module.
use crate::member::{lower_member, LoweringError};
use crate::top::ExternalInvocationProxy;
use crate::{ArchitectureComponent, ComponentInfo};
use hast_ast::{Expression, Intrinsic, LookupTables, Program, Statement};
use hast_utils::{
    DeviceManifest, FullName, HardwareGenerationConfig, HastResult, Warning,
    WarningCode,
};
use hast_vhdl::Module;
use itertools::Itertools;
use rayon::prelude::*;
use std::collections::{BTreeMap, BTreeSet, VecDeque};
use std::time::Instant;

/// What the lowering of one member may look at.
pub struct TransformContext<'p> {
    pub program: &'p Program,
    pub lookup: &'p LookupTables,
    pub config: &'p HardwareGenerationConfig,
    pub device: &'p DeviceManifest,
    pub array_lengths: &'p BTreeMap<FullName, u32>,
    /// Members that turned out to have no hardware. Invoking them makes the
    /// invoker fail too.
    pub failed: &'p BTreeSet<FullName>,
}

/// The generated hardware.
pub struct HardwareDesign {
    pub module: Module,
    /// Sorted by component name.
    pub components: Vec<ComponentInfo>,
    /// The hardware entry members with the member id selecting them.
    pub entry_points: Vec<(FullName, u32)>,
    pub warnings: Vec<Warning>,
}

/// Members invoked by `member`'s body, intrinsics excluded.
fn invoked_members(program: &Program, member: &FullName) -> BTreeSet<FullName> {
    let mut invoked = BTreeSet::new();
    let Some(body) = program.member(member).and_then(|m| m.body.as_ref()) else {
        return invoked;
    };
    let mut visit = |inv: &hast_ast::Invocation| {
        if Intrinsic::from_member(&inv.member).is_none() {
            invoked.insert(inv.member);
        }
    };
    body.for_each_statement(&mut |stmt| {
        if let Statement::ParallelInvocation(calls) = stmt {
            for call in calls {
                visit(&call.invocation);
            }
        }
        for expr in stmt.expressions() {
            expr.for_each(&mut |e| {
                if let Expression::Invocation(inv) = e {
                    visit(inv);
                }
            });
        }
    });
    invoked
}

/// The entry members and every member with a body they transitively invoke.
fn reachable_members(
    program: &Program,
    lookup: &LookupTables,
    entries: &[FullName],
) -> BTreeSet<FullName> {
    let mut reachable = BTreeSet::new();
    let mut queue: VecDeque<FullName> = entries.iter().copied().collect();
    while let Some(member) = queue.pop_front() {
        if lookup.members.is_opaque(&member) || !reachable.insert(member) {
            continue;
        }
        queue.extend(invoked_members(program, &member));
    }
    reachable
}

/// Ids of the entry members. Members without an explicit id get the next
/// free ones, in the order of their names.
fn assign_entry_point_ids(
    entries: &[FullName],
    explicit: &BTreeMap<FullName, u32>,
) -> Vec<(FullName, u32)> {
    let mut next = explicit
        .iter()
        .filter(|(m, _)| entries.contains(m))
        .map(|(_, id)| id + 1)
        .max()
        .unwrap_or(0);
    entries
        .iter()
        .sorted()
        .map(|member| match explicit.get(member) {
            Some(id) => (*member, *id),
            None => {
                next += 1;
                (*member, next - 1)
            }
        })
        .collect()
}

/// Lower every instance of `member`.
fn lower_instances(
    ctx: &TransformContext,
    member: &FullName,
) -> Result<(Vec<ArchitectureComponent>, Vec<Warning>), LoweringError> {
    let Some(declaration) = ctx.program.member(member) else {
        return Err(LoweringError::Unsupported(format!("`{member}' is not declared")));
    };
    let count = ctx.config.resolve_instance_count(member).instance_count()?;
    let mut components = vec![];
    let mut warnings = vec![];
    for index in 0..count {
        let (component, mut w) = lower_member(ctx, declaration, index)?;
        components.push(component);
        warnings.append(&mut w);
    }
    Ok((components, warnings))
}

/// Generate the hardware of the members of `ctx`'s program that are
/// reachable from its hardware entry members.
pub fn build_hardware(
    ctx: &hast_opt::Context,
    entry_point_ids: &BTreeMap<FullName, u32>,
) -> HastResult<HardwareDesign> {
    let start = Instant::now();
    ctx.config.validate()?;
    let device = DeviceManifest::by_name(&ctx.config.device_name)?;
    let entries = ctx
        .program
        .hardware_entry_members()
        .map(|m| m.name)
        .collect_vec();
    let members = reachable_members(&ctx.program, &ctx.lookup, &entries);
    log::debug!(
        "{} of the members are reachable from {} entry members.",
        members.len(),
        entries.len()
    );

    let mut warnings = ctx.warnings().to_vec();
    let mut failed = BTreeSet::new();
    // A member failing makes its invokers fail: repeat until nothing new
    // fails.
    let built = loop {
        let tctx = TransformContext {
            program: &ctx.program,
            lookup: &ctx.lookup,
            config: &ctx.config,
            device: &device,
            array_lengths: &ctx.array_lengths,
            failed: &failed,
        };
        let results = members
            .par_iter()
            .filter(|m| !failed.contains(*m))
            .map(|m| (*m, lower_instances(&tctx, m)))
            .collect::<Vec<_>>();
        let mut newly_failed = vec![];
        let mut built = vec![];
        for (member, result) in results {
            match result {
                Ok(ok) => built.push(ok),
                Err(LoweringError::Unsupported(reason)) => {
                    newly_failed.push((member, reason))
                }
                Err(LoweringError::Failed(e)) => return Err(e),
            }
        }
        if newly_failed.is_empty() {
            break built;
        }
        for (member, reason) in newly_failed {
            let warning = Warning::new(
                WarningCode::UnsupportedConstruct,
                format!("No hardware is generated for the member: {reason}."),
            )
            .with_subject(member);
            log::warn!("{warning}");
            warnings.push(warning);
            failed.insert(member);
        }
    };

    let mut components = vec![];
    for (mut c, w) in built {
        components.append(&mut c);
        for warning in w {
            log::warn!("{warning}");
            warnings.push(warning);
        }
    }
    components.sort_by(|a, b| {
        (a.member, a.instance_index).cmp(&(b.member, b.instance_index))
    });

    let entry_points = assign_entry_point_ids(&entries, entry_point_ids);
    for (member, id) in &entry_points {
        log::debug!("`{member}' has the member id {id}.");
    }
    let proxy = ExternalInvocationProxy::new(entry_points.clone(), ctx.config.use_simple_memory);
    let mut wiring_warnings = vec![];
    let (module, mut infos) = proxy.build(components, &mut wiring_warnings)?;
    for warning in wiring_warnings {
        log::warn!("{warning}");
        warnings.push(warning);
    }
    infos.sort_by(|a, b| a.name.cmp(&b.name));
    let warnings = warnings.into_iter().unique().collect_vec();

    log::info!(
        "Generated {} components in {}ms.",
        infos.len(),
        start.elapsed().as_millis()
    );
    Ok(HardwareDesign {
        module,
        components: infos,
        entry_points,
        warnings,
    })
}
