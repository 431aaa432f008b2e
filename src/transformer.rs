use crate::cache::{InFlight, TransformationCache};
use crate::{HardwareDescription, TransformationIdentity};
use hast_ast::{Printer, Program};
use hast_opt::{Context, PassManager};
use hast_utils::{Error, FullName, HardwareGenerationConfig, HastResult};
use hast_vhdl::{Comment, Vhdl, VhdlGenerationOptions};
use itertools::Itertools;
use rayon::prelude::*;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::time::Instant;
use time::format_description::well_known::Rfc3339;
use time::OffsetDateTime;

/// One program handed over by the front end.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct ProgramImage {
    /// Content hash of the image the program was read from.
    pub identity: String,
    pub program: Program,
    /// Member ids the host uses to start the hardware entry members. Members
    /// without one are numbered automatically.
    #[serde(default)]
    pub entry_point_ids: BTreeMap<FullName, u32>,
}

impl ProgramImage {
    pub fn new<S: ToString>(identity: S, program: Program) -> Self {
        ProgramImage {
            identity: identity.to_string(),
            program,
            entry_point_ids: BTreeMap::new(),
        }
    }

    pub fn from_json(json: &str) -> HastResult<Self> {
        Ok(serde_json::from_str(json)?)
    }

    pub fn to_json(&self) -> HastResult<String> {
        Ok(serde_json::to_string(self)?)
    }

    /// Deserialize several images at once.
    pub fn parse_all<S: AsRef<str> + Sync>(jsons: &[S]) -> HastResult<Vec<Self>> {
        jsons
            .par_iter()
            .map(|json| Self::from_json(json.as_ref()))
            .collect()
    }
}

/// Merge the explicit member ids of the images. An image may not give a
/// member a different id than another image.
fn merge_entry_point_ids(images: &[ProgramImage]) -> HastResult<BTreeMap<FullName, u32>> {
    let mut merged = BTreeMap::new();
    for image in images {
        for (member, id) in &image.entry_point_ids {
            match merged.insert(*member, *id) {
                Some(other) if other != *id => {
                    return Err(Error::configuration(format!(
                        "`{member}' has the member ids {other} and {id}."
                    )))
                }
                _ => {}
            }
        }
    }
    if let Some(id) = merged.values().duplicates().next() {
        return Err(Error::configuration(format!(
            "The member id {id} is given to several members."
        )));
    }
    Ok(merged)
}

fn merge(images: &[ProgramImage]) -> HastResult<(Program, BTreeMap<FullName, u32>)> {
    let entry_point_ids = merge_entry_point_ids(images)?;
    let program = Program::merge(images.iter().map(|i| i.program.clone()))?;
    Ok((program, entry_point_ids))
}

/// Runs transformations, reusing the cached result of an earlier one with the
/// same identity when caching is enabled.
pub struct Transformer {
    config: HardwareGenerationConfig,
    cache: Option<Box<dyn TransformationCache>>,
    in_flight: InFlight,
    /// Written to the banner of the design instead of the current time.
    timestamp: Option<OffsetDateTime>,
}

impl Transformer {
    pub fn new(config: HardwareGenerationConfig) -> Self {
        Transformer {
            config,
            cache: None,
            in_flight: InFlight::default(),
            timestamp: None,
        }
    }

    pub fn with_cache<C: TransformationCache + 'static>(mut self, cache: C) -> Self {
        self.cache = Some(Box::new(cache));
        self
    }

    /// Generate designs as if it were `timestamp`, making the output
    /// reproducible.
    pub fn with_timestamp(mut self, timestamp: OffsetDateTime) -> Self {
        self.timestamp = Some(timestamp);
        self
    }

    pub fn config(&self) -> &HardwareGenerationConfig {
        &self.config
    }

    pub fn identity(&self, images: &[ProgramImage]) -> HastResult<TransformationIdentity> {
        let (program, entry_point_ids) = merge(images)?;
        self.identity_of(images, &program, &entry_point_ids)
    }

    fn identity_of(
        &self,
        images: &[ProgramImage],
        program: &Program,
        entry_point_ids: &BTreeMap<FullName, u32>,
    ) -> HastResult<TransformationIdentity> {
        TransformationIdentity::compute(
            images.iter().map(|i| i.identity.as_str()),
            &Printer::program_to_str(program),
            entry_point_ids,
            &self.config,
        )
    }

    /// Turn the programs into one hardware description.
    pub fn transform(&self, images: &[ProgramImage]) -> HastResult<HardwareDescription> {
        self.config.validate()?;
        let (program, entry_point_ids) = merge(images)?;
        let identity = self.identity_of(images, &program, &entry_point_ids)?;
        let cache = self
            .cache
            .as_deref()
            .filter(|_| self.config.enable_caching);
        let Some(cache) = cache else {
            return self.run(identity, program, &entry_point_ids);
        };

        let _guard = self.in_flight.claim(&identity);
        if let Some(cached) = cache.load(&identity)? {
            log::info!("Using the cached hardware description {identity}.");
            return Ok(cached);
        }
        let description = self.run(identity, program, &entry_point_ids)?;
        cache.store(&description)?;
        Ok(description)
    }

    fn run(
        &self,
        identity: TransformationIdentity,
        program: Program,
        entry_point_ids: &BTreeMap<FullName, u32>,
    ) -> HastResult<HardwareDescription> {
        let start = Instant::now();
        let mut ctx = Context::new(program, self.config.clone());
        PassManager::default_passes()?.execute(&mut ctx)?;
        log::debug!(
            "{} expressions were replaced by constants.",
            ctx.substitution_count
        );

        let mut design = hast_transform::build_hardware(&ctx, entry_point_ids)?;
        design.module.header = self.banner(&identity, &design.entry_points)?;
        let options = VhdlGenerationOptions::from_config(&self.config);
        let vhdl = design.module.to_vhdl(&options);
        log::info!(
            "Transformation {identity} finished in {}ms with {} warnings.",
            start.elapsed().as_millis(),
            design.warnings.len()
        );
        Ok(HardwareDescription::new(
            identity,
            vhdl,
            design.components,
            design.entry_points,
            design.warnings,
        ))
    }

    fn banner(
        &self,
        identity: &TransformationIdentity,
        entry_points: &[(FullName, u32)],
    ) -> HastResult<Vec<Comment>> {
        let now = self.timestamp.unwrap_or_else(OffsetDateTime::now_utc);
        let generated = now
            .format(&Rfc3339)
            .map_err(|e| Error::misc(format!("Can't format the generation time: {e}")))?;
        let members = entry_points
            .iter()
            .map(|(member, id)| format!("* {id}: {member}"))
            .join("\n");
        Ok(vec![
            Comment::UnOmittableBlock(format!(
                "Generated by hast {} at {generated}.\nTransformation identity: {identity}",
                env!("CARGO_PKG_VERSION")
            )),
            Comment::UnOmittableBlock(format!("Hardware entry members:\n{members}")),
        ])
    }
}
