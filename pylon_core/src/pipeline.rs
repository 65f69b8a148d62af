//! # Sign Pipeline
//!
//! Runs the solvers for one sign strictly in order and wraps each stage in
//! an envelope:
//!
//! ```text
//! SignRequest
//!   → wind_load          (service + factored force and moment)
//!   → member_selection   (factored moment)
//!   → foundation         (service force at the centroid height)
//!   → connection?        (anchor bolts: factored moment / lever arm, factored shear)
//!   → fatigue?           (service bending stress in the selected member)
//! ```
//!
//! Every stage envelope is scored over all warnings raised so far, so
//! confidence never increases down the pipeline. Only invalid input stops
//! the run; an infeasible member or an unconverged footing is carried as a
//! warning.

use serde::{Deserialize, Serialize};

use crate::calculations::connection::{self, BoltGrade, BoltGroupInput, BoltGroupResult};
use crate::calculations::fatigue::{self, DetailCategory, FatigueInput, FatigueResult};
use crate::calculations::foundation::{self, FoundationInput, FoundationResult};
use crate::calculations::member_selection::{self, MemberRequest, MemberSelection, SortBy};
use crate::calculations::wind_load::{self, LoadResult, WindLoadInput};
use crate::envelope::{ResultEnvelope, SolverInfo};
use crate::errors::{require_positive, CalcResult};
use crate::materials::steel::{SectionCatalog, SectionFamily, SteelGrade};
use crate::settings::EngineSettings;
use crate::units::KipIn;
use crate::warnings::{Solved, Warning};

/// Filters for the pole search
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct MemberOptions {
    pub family: Option<SectionFamily>,
    pub grade: Option<SteelGrade>,
    pub sort_by: SortBy,
    /// Pole length (ft). Defaults to the top of the sign.
    pub length_ft: Option<f64>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FoundationOptions {
    pub diameter_ft: f64,
    /// Allowable vertical soil bearing (psf)
    pub soil_bearing_psf: f64,
}

/// Anchor bolt layout at the base plate
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ConnectionOptions {
    pub grade: BoltGrade,
    pub diameter_in: f64,
    /// Bolts on the tension side
    pub bolt_count: u32,
    /// Distance between the tension bolts and the compression edge (in)
    pub lever_arm_in: f64,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct FatigueOptions {
    #[serde(default)]
    pub category: DetailCategory,
    /// Overrides the stress range derived from the selected member (ksi)
    #[serde(default)]
    pub stress_range_ksi: Option<f64>,
    #[serde(default)]
    pub cycles_per_year: Option<f64>,
    #[serde(default)]
    pub design_life_years: Option<f64>,
}

/// One sign to design.
///
/// ```json
/// {
///   "load": {
///     "site": { "wind_speed_mph": 115.0, "exposure": "C" },
///     "panels": [{ "width_ft": 10.0, "height_ft": 4.0 }],
///     "attachment_height_ft": 13.0
///   },
///   "member": { "family": "HSS" },
///   "foundation": { "diameter_ft": 2.0, "soil_bearing_psf": 2000.0 },
///   "connection": { "grade": "A325", "diameter_in": 1.0, "bolt_count": 2, "lever_arm_in": 12.0 },
///   "fatigue": { "category": "E" }
/// }
/// ```
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SignRequest {
    pub load: WindLoadInput,
    #[serde(default)]
    pub member: MemberOptions,
    pub foundation: FoundationOptions,
    #[serde(default)]
    pub connection: Option<ConnectionOptions>,
    #[serde(default)]
    pub fatigue: Option<FatigueOptions>,
}

/// Stage envelopes for one run, in stage order
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PipelineReport {
    pub load: ResultEnvelope<LoadResult>,
    pub members: ResultEnvelope<MemberSelection>,
    pub foundation: ResultEnvelope<FoundationResult>,
    #[serde(default)]
    pub connection: Option<ResultEnvelope<BoltGroupResult>>,
    /// `result` is `None` when the stage abstained
    #[serde(default)]
    pub fatigue: Option<ResultEnvelope<Option<FatigueResult>>>,
}

impl PipelineReport {
    /// Confidence of the last stage that ran
    pub fn confidence(&self) -> f64 {
        self.fatigue
            .as_ref()
            .map(|e| e.confidence())
            .or_else(|| self.connection.as_ref().map(|e| e.confidence()))
            .unwrap_or(self.foundation.confidence())
    }

    /// Every warning raised during the run
    pub fn warnings(&self) -> &[Warning] {
        self.fatigue
            .as_ref()
            .map(|e| e.warnings())
            .or_else(|| self.connection.as_ref().map(|e| e.warnings()))
            .unwrap_or(self.foundation.warnings())
    }
}

pub struct Pipeline<'a> {
    catalog: &'a SectionCatalog,
    settings: &'a EngineSettings,
}

/// Warnings accumulated across stages
struct Stages<'s> {
    settings: &'s EngineSettings,
    warnings: Vec<Warning>,
}

impl Stages<'_> {
    fn envelope<T: Serialize>(&mut self, solver: SolverInfo, solved: Solved<T>) -> CalcResult<ResultEnvelope<T>> {
        self.warnings.extend(solved.warnings);
        let envelope =
            ResultEnvelope::build(solver, solved.value, &self.warnings, self.settings.envelope.duplicate_warnings)?;
        tracing::debug!(stage = solver.name, confidence = envelope.confidence(), "stage complete");
        Ok(envelope)
    }
}

impl<'a> Pipeline<'a> {
    pub fn new(catalog: &'a SectionCatalog, settings: &'a EngineSettings) -> Self {
        Self { catalog, settings }
    }

    pub fn run(&self, request: &SignRequest) -> CalcResult<PipelineReport> {
        let solver = &self.settings.solver;
        let mut stages = Stages {
            settings: self.settings,
            warnings: Vec::new(),
        };

        let load = stages.envelope(wind_load::SOLVER, wind_load::calculate(&request.load, solver)?)?;
        let loads = load.result();

        let member_request = MemberRequest {
            required_moment_kipft: loads.factored_moment_kipft,
            family: request.member.family,
            grade: request.member.grade,
            sort_by: request.member.sort_by,
            length_ft: Some(request.member.length_ft.unwrap_or(loads.top_height_ft)),
            max_results: None,
        };
        let members = stages.envelope(
            member_selection::SOLVER,
            member_selection::select(&member_request, self.catalog, solver)?,
        )?;

        let footing = FoundationInput {
            lateral_force_lb: loads.lateral_force_lb,
            load_height_ft: loads.centroid_height_ft,
            diameter_ft: request.foundation.diameter_ft,
            soil_bearing_psf: request.foundation.soil_bearing_psf,
        };
        let foundation = stages.envelope(foundation::SOLVER, foundation::solve(&footing, solver)?)?;

        let connection = match &request.connection {
            Some(options) => {
                require_positive("lever_arm_in", options.lever_arm_in)?;
                let factored_moment: KipIn = loads.factored_moment_kipft.into();
                let bolts = BoltGroupInput::new(
                    options.grade,
                    options.diameter_in,
                    options.bolt_count,
                    factored_moment.value() / options.lever_arm_in,
                    loads.factored_force_lb / 1000.0,
                );
                Some(stages.envelope(connection::SOLVER, connection::check_bolt_group(&bolts)?)?)
            }
            None => None,
        };

        let fatigue = match &request.fatigue {
            Some(options) => {
                let solved = self.fatigue_stage(options, loads, members.result())?;
                Some(stages.envelope(fatigue::SOLVER, solved)?)
            }
            None => None,
        };

        let report = PipelineReport {
            load,
            members,
            foundation,
            connection,
            fatigue,
        };
        tracing::info!(
            event = "pipeline_complete",
            confidence = report.confidence(),
            warnings = report.warnings().len(),
            "sign pipeline finished"
        );
        Ok(report)
    }

    /// Stress range is the full service bending stress M / Sx_eff in the
    /// top-ranked member unless given. Abstains without a member.
    fn fatigue_stage(
        &self,
        options: &FatigueOptions,
        loads: &LoadResult,
        members: &MemberSelection,
    ) -> CalcResult<Solved<Option<FatigueResult>>> {
        let stress_range = match (options.stress_range_ksi, members.best()) {
            (Some(stress), _) => stress,
            (None, Some(best)) => {
                let moment: KipIn = loads.moment_kipft.into();
                moment.value() / best.section.effective_sx()
            }
            (None, None) => {
                return Ok(Solved::new(
                    None,
                    vec![Warning::abstain(
                        fatigue::SOLVER.name,
                        "No member selected; fatigue stress range unknown",
                    )],
                ));
            }
        };

        let mut input = FatigueInput::new(stress_range, options.category);
        if let Some(cycles) = options.cycles_per_year {
            input.cycles_per_year = cycles;
        }
        if let Some(years) = options.design_life_years {
            input.design_life_years = years;
        }
        Ok(fatigue::check(&input)?.map(Some))
    }
}
