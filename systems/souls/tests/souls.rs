use rand::SeedableRng;
use rand_chacha::ChaCha8Rng;
use sandmod_core::{
    ElementDefinition, GridCoord, GridSize, LogEntry, MatterState, Pixel, Reaction, SandboxHost,
    Severity, SoulStage, Transform,
};
use sandmod_system_souls::{
    census, exorcise_area, install, possess_area, SoulCensus, SoulTuning, POSSESSED_HEAD_TINT,
};
use sandmod_world::{query, World};

/// Tuning under which nothing happens unless a test opts in.
fn still() -> SoulTuning {
    SoulTuning {
        rise_chance: 0.0,
        drift_chance: 0.0,
        drift_climb_chance: 0.0,
        drift_advance_chance: 0.0,
        descend_advance_chance: 0.0,
        wander_chance: 0.0,
        wander_return_chance: 0.0,
        possess_scan_chance: 0.0,
        glow_on_chance: 0.0,
        glow_off_chance: 0.0,
        ectoplasm_chance: 0.0,
        flash_chance: 0.0,
        possess_reaction_chance: 0.0,
        release_chance: 0.0,
        ectoplasm_decay_chance: 0.0,
        tombstone_spawn_chance: 0.0,
        ..SoulTuning::DEFAULT
    }
}

fn haunted_world(size: GridSize, tuning: &SoulTuning) -> (World, Vec<LogEntry>) {
    let mut world = World::with_size(size);
    let mut log = Vec::new();
    let _ = install(world.elements_mut(), tuning, &mut log);
    (world, log)
}

fn messages(log: &[LogEntry], severity: Severity) -> Vec<String> {
    log.iter()
        .filter(|entry| entry.severity == severity)
        .map(|entry| entry.message.clone())
        .collect()
}

#[test]
fn souls_at_the_ceiling_vanish() {
    let (mut world, mut log) = haunted_world(GridSize::new(6, 6), &still());
    let mut rng = ChaCha8Rng::seed_from_u64(1);
    world.create_pixel("soul", GridCoord::new(2, 1)).expect("create");
    world.create_pixel("soul", GridCoord::new(3, 4)).expect("create");

    let _ = world.step(&mut rng, &mut log);

    assert_eq!(query::cells_of(&world, "soul"), vec![GridCoord::new(3, 4)]);
}

#[test]
fn scanning_soul_possesses_adjacent_body_and_disappears() {
    let tuning = SoulTuning {
        possess_scan_chance: 1.0,
        ..still()
    };
    let (mut world, mut log) = haunted_world(GridSize::new(8, 8), &tuning);
    let mut rng = ChaCha8Rng::seed_from_u64(2);
    world.create_pixel("soul", GridCoord::new(4, 4)).expect("create");
    world.create_pixel("body", GridCoord::new(4, 5)).expect("create");

    let _ = world.step(&mut rng, &mut log);

    assert_eq!(query::count_of(&world, "soul"), 0);
    assert!(world
        .pixel(GridCoord::new(4, 5))
        .is_some_and(|pixel| pixel.is_possessed()));
    assert_eq!(
        messages(&log, Severity::Success),
        vec!["Soul possessed body at (4,5)".to_owned()]
    );
}

#[test]
fn possessed_body_releases_a_soul_nearby() {
    let tuning = SoulTuning {
        release_chance: 1.0,
        ..still()
    };
    let (mut world, mut log) = haunted_world(GridSize::new(8, 8), &tuning);
    let mut rng = ChaCha8Rng::seed_from_u64(3);
    let body = GridCoord::new(4, 4);
    world.create_pixel("body", body).expect("create");
    assert_eq!(possess_area(&mut world, body, 0), 1);

    let _ = world.step(&mut rng, &mut log);

    assert_eq!(
        census(&world),
        SoulCensus {
            souls: 1,
            possessions: 0
        }
    );
    assert_eq!(query::cells_of(&world, "soul"), vec![GridCoord::new(4, 5)]);
    assert!(messages(&log, Severity::Info).contains(&"Soul released from body at (4,4)".to_owned()));
}

#[test]
fn possessed_heads_turn_pale_blue() {
    let (mut world, mut log) = haunted_world(GridSize::new(8, 8), &still());
    let mut rng = ChaCha8Rng::seed_from_u64(4);
    let head = GridCoord::new(2, 2);
    world.create_pixel("head", head).expect("create");
    world.create_pixel("head", GridCoord::new(6, 6)).expect("create");
    assert_eq!(possess_area(&mut world, head, 1), 1);

    let _ = world.step(&mut rng, &mut log);

    assert_eq!(
        world.pixel(head).and_then(|pixel| pixel.tint),
        Some(POSSESSED_HEAD_TINT)
    );
    assert_eq!(
        world.pixel(GridCoord::new(6, 6)).and_then(|pixel| pixel.tint),
        None
    );
}

#[test]
fn tombstone_raises_souls_on_open_sides() {
    let tuning = SoulTuning {
        tombstone_spawn_chance: 1.0,
        ..still()
    };
    let (mut world, mut log) = haunted_world(GridSize::new(8, 8), &tuning);
    let mut rng = ChaCha8Rng::seed_from_u64(5);
    world.create_pixel("tombstone", GridCoord::new(3, 3)).expect("create");

    let _ = world.step(&mut rng, &mut log);

    assert_eq!(
        query::cells_of(&world, "soul"),
        vec![
            GridCoord::new(3, 2),
            GridCoord::new(2, 3),
            GridCoord::new(4, 3)
        ]
    );
}

#[test]
fn ectoplasm_evaporates_only_once_old_enough() {
    let tuning = SoulTuning {
        ectoplasm_decay_chance: 1.0,
        ectoplasm_min_age: 2,
        ..still()
    };
    let (mut world, mut log) = haunted_world(GridSize::new(8, 8), &tuning);
    let mut rng = ChaCha8Rng::seed_from_u64(6);
    world.create_pixel("ectoplasm", GridCoord::new(3, 3)).expect("create");

    let _ = world.step(&mut rng, &mut log);
    let _ = world.step(&mut rng, &mut log);
    assert_eq!(query::count_of(&world, "ectoplasm"), 1);

    let _ = world.step(&mut rng, &mut log);
    assert_eq!(query::count_of(&world, "ectoplasm"), 0);
}

#[test]
fn ectoplasm_turns_rock_wall_into_tombstone() {
    let (mut world, mut log) = haunted_world(GridSize::new(5, 5), &still());
    let mut rng = ChaCha8Rng::seed_from_u64(7);
    let center = GridCoord::new(2, 2);
    world.create_pixel("ectoplasm", center).expect("create");
    for neighbour in center.neighbours() {
        world.create_pixel("rock_wall", neighbour).expect("create");
    }

    let _ = world.step(&mut rng, &mut log);

    assert_eq!(query::count_of(&world, "ectoplasm"), 0);
    assert_eq!(query::count_of(&world, "tombstone"), 1);
    assert_eq!(query::count_of(&world, "rock_wall"), 7);
}

#[test]
fn bless_turns_a_soul_into_a_human() {
    let (mut world, mut log) = haunted_world(GridSize::new(5, 6), &still());
    let mut rng = ChaCha8Rng::seed_from_u64(8);
    let center = GridCoord::new(2, 3);
    world.create_pixel("bless", center).expect("create");
    for neighbour in center.neighbours() {
        world.create_pixel("soul", neighbour).expect("create");
    }

    let _ = world.step(&mut rng, &mut log);

    assert_eq!(query::count_of(&world, "human"), 1);
    assert_eq!(query::count_of(&world, "soul"), 7);
}

#[test]
fn exorcism_frees_every_possession_in_range() {
    let (mut world, _log) = haunted_world(GridSize::new(20, 20), &still());
    for x in [5, 7, 15] {
        world.create_pixel("body", GridCoord::new(x, 10)).expect("create");
    }
    world.create_pixel("sand", GridCoord::new(6, 10)).expect("create");

    assert_eq!(possess_area(&mut world, GridCoord::new(6, 10), 2), 2);
    assert_eq!(possess_area(&mut world, GridCoord::new(6, 10), 2), 0);
    assert_eq!(census(&world).possessions, 2);

    assert_eq!(exorcise_area(&mut world, GridCoord::new(6, 10), 5), 2);

    assert_eq!(
        census(&world),
        SoulCensus {
            souls: 2,
            possessions: 0
        }
    );
}

#[test]
fn areas_clamp_to_the_grid() {
    let (mut world, _log) = haunted_world(GridSize::new(4, 4), &still());
    world.create_pixel("head", GridCoord::new(0, 0)).expect("create");

    assert_eq!(possess_area(&mut world, GridCoord::new(-3, -3), 5), 1);
    assert_eq!(possess_area(&mut world, GridCoord::new(100, 100), 5), 0);
}

fn soul_at(world: &World, cell: GridCoord) -> &Pixel {
    world
        .pixel(cell)
        .filter(|pixel| pixel.element() == "soul")
        .expect("soul at cell")
}

#[test]
fn drifting_soul_moves_sideways_and_sometimes_climbs() {
    let level = SoulTuning {
        drift_chance: 1.0,
        ..still()
    };
    let (mut world, mut log) = haunted_world(GridSize::new(8, 8), &level);
    let mut rng = ChaCha8Rng::seed_from_u64(10);
    world.create_pixel("soul", GridCoord::new(3, 4)).expect("create");
    let _ = world.step(&mut rng, &mut log);
    assert_eq!(query::cells_of(&world, "soul"), vec![GridCoord::new(4, 4)]);

    let climbing = SoulTuning {
        drift_climb_chance: 1.0,
        ..level
    };
    let (mut world, mut log) = haunted_world(GridSize::new(8, 8), &climbing);
    world.create_pixel("soul", GridCoord::new(3, 4)).expect("create");
    let _ = world.step(&mut rng, &mut log);
    assert_eq!(query::cells_of(&world, "soul"), vec![GridCoord::new(4, 3)]);
}

#[test]
fn blocked_drift_turns_the_soul_around() {
    let tuning = SoulTuning {
        drift_chance: 1.0,
        ..still()
    };
    let (mut world, mut log) = haunted_world(GridSize::new(8, 8), &tuning);
    let mut rng = ChaCha8Rng::seed_from_u64(11);
    let start = GridCoord::new(3, 4);
    world.create_pixel("soul", start).expect("create");
    world.create_pixel("wall", GridCoord::new(4, 4)).expect("create");

    let _ = world.step(&mut rng, &mut log);
    assert!(soul_at(&world, start).flip_x);

    let _ = world.step(&mut rng, &mut log);
    assert_eq!(query::cells_of(&world, "soul"), vec![GridCoord::new(2, 4)]);
}

#[test]
fn descending_soul_moves_diagonally_down() {
    let (mut world, mut log) = haunted_world(GridSize::new(8, 8), &still());
    let mut rng = ChaCha8Rng::seed_from_u64(12);
    let start = GridCoord::new(3, 3);
    world.create_pixel("soul", start).expect("create");
    world
        .pixel_mut(start)
        .expect("soul")
        .set_soul_stage(SoulStage::Descend);

    let _ = world.step(&mut rng, &mut log);

    let moved = GridCoord::new(4, 4);
    assert_eq!(query::cells_of(&world, "soul"), vec![moved]);
    assert_eq!(soul_at(&world, moved).soul_stage(), Some(SoulStage::Descend));
}

#[test]
fn wandering_soul_steps_at_most_one_cell_and_never_turns() {
    let tuning = SoulTuning {
        wander_chance: 1.0,
        ..still()
    };
    let (mut world, mut log) = haunted_world(GridSize::new(41, 41), &tuning);
    let mut rng = ChaCha8Rng::seed_from_u64(13);
    let start = GridCoord::new(20, 24);
    world.create_pixel("soul", start).expect("create");
    world
        .pixel_mut(start)
        .expect("soul")
        .set_soul_stage(SoulStage::Wander);

    let mut here = start;
    for _ in 0..20 {
        let _ = world.step(&mut rng, &mut log);
        let cells = query::cells_of(&world, "soul");
        assert_eq!(cells.len(), 1);
        let next = cells[0];
        assert!((next.x() - here.x()).abs() <= 1 && (next.y() - here.y()).abs() <= 1);
        let soul = soul_at(&world, next);
        assert!(!soul.flip_x);
        assert_eq!(soul.soul_stage(), Some(SoulStage::Wander));
        here = next;
    }
}

#[test]
fn rising_soul_climbs_or_swaps_only_with_movable_blockers() {
    let tuning = SoulTuning {
        rise_chance: 1.0,
        ..still()
    };
    let (mut world, mut log) = haunted_world(GridSize::new(8, 8), &tuning);
    let mut rng = ChaCha8Rng::seed_from_u64(14);
    for x in [1, 3, 5] {
        world.create_pixel("soul", GridCoord::new(x, 5)).expect("create");
    }
    world.create_pixel("sand", GridCoord::new(3, 4)).expect("create");
    world.create_pixel("wall", GridCoord::new(5, 4)).expect("create");

    let _ = world.step(&mut rng, &mut log);

    assert_eq!(
        query::cells_of(&world, "soul"),
        vec![
            GridCoord::new(1, 4),
            GridCoord::new(3, 4),
            GridCoord::new(5, 5)
        ]
    );
    assert_eq!(query::cells_of(&world, "sand"), vec![GridCoord::new(3, 5)]);
    assert_eq!(query::cells_of(&world, "wall"), vec![GridCoord::new(5, 4)]);
}

#[test]
fn glow_switches_on_and_off() {
    let tuning = SoulTuning {
        glow_on_chance: 1.0,
        glow_off_chance: 1.0,
        ..still()
    };
    let (mut world, mut log) = haunted_world(GridSize::new(8, 8), &tuning);
    let mut rng = ChaCha8Rng::seed_from_u64(15);
    let dark = GridCoord::new(2, 4);
    let lit = GridCoord::new(5, 4);
    world.create_pixel("soul", dark).expect("create");
    world.create_pixel("soul", lit).expect("create");
    world.pixel_mut(lit).expect("soul").glow = true;

    let _ = world.step(&mut rng, &mut log);

    assert!(soul_at(&world, dark).glow);
    assert!(!soul_at(&world, lit).glow);
}

#[test]
fn soul_drips_ectoplasm_only_into_an_empty_cell_below() {
    let tuning = SoulTuning {
        ectoplasm_chance: 1.0,
        ..still()
    };
    let (mut world, mut log) = haunted_world(GridSize::new(8, 8), &tuning);
    let mut rng = ChaCha8Rng::seed_from_u64(16);
    world.create_pixel("soul", GridCoord::new(2, 3)).expect("create");
    world.create_pixel("soul", GridCoord::new(5, 3)).expect("create");
    world.create_pixel("wall", GridCoord::new(5, 4)).expect("create");

    let _ = world.step(&mut rng, &mut log);

    assert_eq!(query::cells_of(&world, "ectoplasm"), vec![GridCoord::new(2, 4)]);
}

#[test]
fn flash_burst_fills_open_neighbours_with_cold_flash() {
    let tuning = SoulTuning {
        flash_chance: 1.0,
        ..still()
    };
    let (mut world, mut log) = haunted_world(GridSize::new(8, 8), &tuning);
    let mut rng = ChaCha8Rng::seed_from_u64(17);
    let center = GridCoord::new(3, 3);
    world.create_pixel("soul", center).expect("create");
    world.create_pixel("wall", GridCoord::new(4, 3)).expect("create");

    let _ = world.step(&mut rng, &mut log);

    let flashes = query::cells_of(&world, "flash");
    assert_eq!(flashes.len(), 7);
    for cell in flashes {
        let flash = world.pixel(cell).expect("flash");
        assert_eq!(flash.temperature, tuning.flash_temperature);
    }
}

#[test]
fn drift_advances_to_descend_at_the_combined_rate() {
    let tuning = SoulTuning::DEFAULT;
    let (mut world, mut log) = haunted_world(GridSize::new(5, 5), &tuning);
    let mut rng = ChaCha8Rng::seed_from_u64(18);
    let cage = GridCoord::new(2, 2);
    world.create_pixel("soul", cage).expect("create");
    for neighbour in cage.neighbours() {
        world.create_pixel("wall", neighbour).expect("create");
    }

    let frames = 40_000;
    let mut advanced = 0;
    for _ in 0..frames {
        world
            .pixel_mut(cage)
            .expect("caged soul")
            .set_soul_stage(SoulStage::Drift);
        let _ = world.step(&mut rng, &mut log);
        if soul_at(&world, cage).soul_stage() == Some(SoulStage::Descend) {
            advanced += 1;
        }
    }

    let rate = f64::from(advanced) / f64::from(frames);
    let expected = tuning.drift_chance * tuning.drift_advance_chance;
    assert!((rate - expected).abs() < 0.005, "rate {rate}, expected {expected}");
}

#[test]
fn deleting_a_head_frightens_neighbours_and_frees_a_soul() {
    let (mut world, _log) = haunted_world(GridSize::new(8, 8), &still());
    let head = GridCoord::new(4, 4);
    world.create_pixel("head", head).expect("create");
    world.create_pixel("body", head.offset(0, 1)).expect("create");

    assert!(world.delete_pixel(head).is_some());

    assert_eq!(query::cells_of(&world, "soul"), vec![head.offset(0, -1)]);
    assert_eq!(
        world.pixel(head.offset(0, 1)).and_then(Pixel::panic),
        Some(still().panic)
    );
}

fn head_ring_around_converter(into: &str) -> World {
    let (mut world, _log) = haunted_world(GridSize::new(7, 9), &still());
    let mut converter = ElementDefinition::new("converter", "test", MatterState::Solid);
    converter.set_reaction(
        Reaction::with("head").other_becomes(Transform::Become(into.to_owned())),
    );
    let _ = world.elements_mut().insert(converter);

    let center = GridCoord::new(3, 5);
    world.create_pixel("converter", center).expect("create");
    for neighbour in center.neighbours() {
        world.create_pixel("head", neighbour).expect("create");
    }
    world
}

#[test]
fn converted_head_frees_a_soul_unless_it_became_one() {
    let mut rng = ChaCha8Rng::seed_from_u64(19);
    let mut log: Vec<LogEntry> = Vec::new();

    let mut world = head_ring_around_converter("sand");
    let summary = world.step(&mut rng, &mut log);
    assert_eq!(summary.reactions, 1);
    assert_eq!(query::count_of(&world, "sand"), 1);
    assert_eq!(query::count_of(&world, "soul"), 1);

    let mut world = head_ring_around_converter("soul");
    let summary = world.step(&mut rng, &mut log);
    assert_eq!(summary.reactions, 1);
    assert_eq!(query::count_of(&world, "head"), 7);
    assert_eq!(query::count_of(&world, "soul"), 1);
}
