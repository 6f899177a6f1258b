#![deny(
    unsafe_code,
    missing_docs,
    dead_code,
    unused_results,
    non_snake_case,
    unreachable_pub
)]

//! Soul possession mod.
//!
//! Adds three elements to the host: the wandering `soul`, the `ectoplasm` it
//! occasionally drips and the `tombstone` that raises new souls. It also
//! chains possession hooks onto the host's `body`, `head` and `human`
//! elements and wires declarative reactions between them. Bulk operations
//! used by the console commands live in [`possess_area`], [`exorcise_area`]
//! and [`census`].

mod areas;
mod behavior;
mod tuning;

use sandmod_core::{
    ElementDefinition, ElementKind, ElementRegistry, LogSink, MatterState, Reaction, Rgb,
    Severity, Transform,
};
use tracing::{info, warn};

pub use areas::{census, exorcise_area, possess_area, SoulCensus};
pub use behavior::{plan_stage, StagePlan, POSSESSED_HEAD_TINT};
pub use tuning::{SoulTuning, TuningError};

/// Name of the wandering spirit element.
pub const SOUL: &str = "soul";
/// Name of the liquid souls leave behind.
pub const ECTOPLASM: &str = "ectoplasm";
/// Name of the soul-raising grave marker.
pub const TOMBSTONE: &str = "tombstone";

const FLASH: &str = "flash";
const BLESS: &str = "bless";
const RELEASING_VESSELS: [&str; 2] = ["body", "human"];
const HEAD: &str = "head";

/// Elements this mod adds or patches that were present when it installed.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct InstallReport {
    /// Host elements that received possession hooks or reactions.
    pub patched: Vec<String>,
    /// Host elements the mod wanted to patch but could not find.
    pub missing: Vec<String>,
}

/// Definition of the `soul` element with its tick hook and reactions.
#[must_use]
pub fn soul_definition(tuning: &SoulTuning) -> ElementDefinition {
    let mut soul = ElementDefinition::new(SOUL, "life", MatterState::Gas);
    soul.colors = vec![Rgb::from_hex(0x87fff9)];
    soul.temperature = 29.0;
    soul.density = 1_000.0;
    soul.hidden = true;
    soul.kind = ElementKind::Spirit;
    soul.description = "A restless spirit that drifts, descends and wanders, \
                        possessing any vacant body it brushes against."
        .to_owned();

    let tuning = *tuning;
    soul.add_tick(move |context, coord| behavior::soul_tick(&tuning, context, coord));

    for vessel in ["body", HEAD, "human"] {
        soul.set_reaction(
            Reaction::with(vessel)
                .chance(tuning.possess_reaction_chance)
                .this_becomes(Transform::Delete)
                .possess_other(),
        );
    }
    soul.set_reaction(Reaction::with("proton").this_becomes(Transform::Delete));
    soul
}

/// Definition of the `ectoplasm` element.
#[must_use]
pub fn ectoplasm_definition(tuning: &SoulTuning) -> ElementDefinition {
    let mut ectoplasm = ElementDefinition::new(ECTOPLASM, "liquids", MatterState::Liquid);
    ectoplasm.colors = vec![Rgb::from_hex(0xadf9e7), Rgb::from_hex(0xc1fbed)];
    ectoplasm.temperature = -2.0;
    ectoplasm.density = 0.0001;
    ectoplasm.hidden = true;
    ectoplasm.description = "Cold residue of a passing soul. Evaporates with age.".to_owned();

    let tuning = *tuning;
    ectoplasm.add_tick(move |context, coord| behavior::ectoplasm_tick(&tuning, context, coord));
    ectoplasm.set_reaction(Reaction::with("body").other_panic(tuning.panic));
    ectoplasm.set_reaction(
        Reaction::with("rock_wall")
            .this_becomes(Transform::Delete)
            .other_becomes(Transform::Become(TOMBSTONE.to_owned())),
    );
    ectoplasm
}

/// Definition of the `tombstone` element.
#[must_use]
pub fn tombstone_definition(tuning: &SoulTuning) -> ElementDefinition {
    let mut tombstone = ElementDefinition::new(TOMBSTONE, "special", MatterState::Solid);
    tombstone.colors = vec![
        Rgb::from_hex(0x5f5f5f),
        Rgb::from_hex(0x434343),
        Rgb::from_hex(0x282828),
    ];
    tombstone.density = 2_550.0;
    tombstone.description = "Grave marker that occasionally raises a soul.".to_owned();
    tombstone.break_into = ["rock", "rock", "rock", "rock", SOUL, ECTOPLASM]
        .into_iter()
        .map(str::to_owned)
        .collect();

    let tuning = *tuning;
    tombstone.add_tick(move |context, coord| behavior::tombstone_tick(&tuning, context, coord));
    tombstone
}

/// Installs the soul elements and chains possession hooks onto the host's
/// vessels.
///
/// Installing twice replaces the mod's own elements but chains a second copy
/// of the vessel hooks, so callers install once per registry.
pub fn install(
    registry: &mut ElementRegistry,
    tuning: &SoulTuning,
    log: &mut dyn LogSink,
) -> InstallReport {
    log.log("Soul Possession Mod loading...".to_owned(), Severity::System);
    let mut report = InstallReport::default();

    for definition in [
        soul_definition(tuning),
        ectoplasm_definition(tuning),
        tombstone_definition(tuning),
    ] {
        let _ = registry.insert(definition);
    }

    let release_tuning = *tuning;
    for vessel in RELEASING_VESSELS {
        let Some(definition) = registry.get_mut(vessel) else {
            report.missing.push(vessel.to_owned());
            continue;
        };
        definition.add_tick(move |context, coord| {
            behavior::vessel_release_tick(&release_tuning, context, coord)
        });
        report.patched.push(vessel.to_owned());
    }

    if let Some(head) = registry.get_mut(HEAD) {
        head.break_into = vec![SOUL.to_owned()];
        head.add_tick(behavior::head_tint_tick);
        let head_tuning = *tuning;
        head.add_remove_hook(move |host, coord, _head, removal| {
            behavior::head_removed(&head_tuning, host, coord, removal);
        });
        report.patched.push(HEAD.to_owned());
    } else {
        report.missing.push(HEAD.to_owned());
    }

    if let Some(bless) = registry.get_mut(BLESS) {
        bless.set_reaction(
            Reaction::with(SOUL).other_becomes(Transform::Become("human".to_owned())),
        );
        bless.set_reaction(Reaction::with(ECTOPLASM).other_becomes(Transform::Delete));
        bless.set_reaction(
            Reaction::with(TOMBSTONE).other_becomes(Transform::Become("rock_wall".to_owned())),
        );
        report.patched.push(BLESS.to_owned());
    }

    for missing in &report.missing {
        warn!(element = %missing, "host element missing; possession hook skipped");
        log.log(
            format!("Element '{missing}' not found; its possession hook was skipped."),
            Severity::Warning,
        );
    }
    info!(patched = ?report.patched, "soul possession mod installed");
    log.log(
        "Soul Possession Mod loaded successfully!".to_owned(),
        Severity::System,
    );
    report
}

#[cfg(test)]
mod tests {
    use super::*;
    use sandmod_core::LogEntry;

    fn vessels_only() -> ElementRegistry {
        let mut registry = ElementRegistry::new();
        for name in ["body", "head"] {
            let mut vessel = ElementDefinition::new(name, "life", MatterState::Solid);
            vessel.kind = ElementKind::Vessel;
            let _ = registry.insert(vessel);
        }
        registry
    }

    #[test]
    fn install_reports_missing_vessels() {
        let mut registry = vessels_only();
        let mut log: Vec<LogEntry> = Vec::new();

        let report = install(&mut registry, &SoulTuning::DEFAULT, &mut log);

        assert_eq!(report.patched, vec!["body".to_owned(), "head".to_owned()]);
        assert_eq!(report.missing, vec!["human".to_owned()]);
        assert!(log
            .iter()
            .any(|entry| entry.severity == Severity::Warning && entry.message.contains("human")));
        assert!(registry.contains(SOUL));
        assert!(registry.contains(ECTOPLASM));
        assert!(registry.contains(TOMBSTONE));
    }

    #[test]
    fn install_chains_hooks_after_existing_ones() {
        let mut registry = vessels_only();
        let mut log: Vec<LogEntry> = Vec::new();

        let _ = install(&mut registry, &SoulTuning::DEFAULT, &mut log);

        let head = registry.get(HEAD).expect("head");
        assert_eq!(head.ticks.len(), 1);
        assert_eq!(head.on_remove.len(), 1);
        assert_eq!(head.break_into, vec![SOUL.to_owned()]);
        assert_eq!(registry.get("body").expect("body").ticks.len(), 1);
    }

    #[test]
    fn soul_possession_reactions_follow_tuning() {
        let tuning = SoulTuning {
            possess_reaction_chance: 0.75,
            ..SoulTuning::DEFAULT
        };
        let soul = soul_definition(&tuning);

        let body = soul.reaction_with("body").expect("body reaction");
        assert!(body.possess_other);
        assert_eq!(body.chance, 0.75);
        assert_eq!(body.other_panic, 0);
        assert_eq!(body.this_becomes, Transform::Delete);
        assert_eq!(soul.reaction_with("human").expect("human").other_panic, 0);
        assert_eq!(
            soul.reaction_with("proton").expect("proton").this_becomes,
            Transform::Delete
        );
    }

    #[test]
    fn tombstone_breaks_into_rock_soul_and_ectoplasm() {
        let tombstone = tombstone_definition(&SoulTuning::DEFAULT);
        assert_eq!(
            tombstone.break_into.iter().filter(|name| *name == "rock").count(),
            4
        );
        assert!(tombstone.break_into.iter().any(|name| name == SOUL));
        assert!(tombstone.break_into.iter().any(|name| name == ECTOPLASM));
        assert!(!tombstone.movable);
    }
}
