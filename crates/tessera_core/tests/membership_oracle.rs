//! Membership index vs. brute force.
//!
//! Random spawn / add / remove / despawn sequences, interleaved with system
//! registrations, are checked after every step against a full scan of the
//! live entities.

use std::collections::BTreeSet;

use rand::{Rng, SeedableRng};
use rand_chacha::ChaCha8Rng;
use tessera_core::{
    Archetype, EntityId, KindSet, QueryItem, System, SystemError, World, WorldConfig,
};

struct A;
struct B;
struct C;
struct D;

/// Empty-query systems; one type per registration slot.
struct Watcher<const N: usize>;

impl<const N: usize> System for Watcher<N> {
    type Query = ();

    fn run(&mut self, _: EntityId, _: QueryItem<'_, Self::Query>) -> Result<(), SystemError> {
        Ok(())
    }
}

fn add_random(world: &mut World, rng: &mut ChaCha8Rng, entity: EntityId) {
    match rng.gen_range(0..4) {
        0 => world.add_component(entity, A),
        1 => world.add_component(entity, B),
        2 => world.add_component(entity, C),
        _ => world.add_component(entity, D),
    };
}

fn remove_random(world: &mut World, rng: &mut ChaCha8Rng, entity: EntityId) {
    match rng.gen_range(0..4) {
        0 => world.remove_component::<A>(entity),
        1 => world.remove_component::<B>(entity),
        2 => world.remove_component::<C>(entity),
        _ => world.remove_component::<D>(entity),
    };
}

/// Builds a random archetype over A..D.
fn random_archetype(world: &World, rng: &mut ChaCha8Rng) -> Archetype {
    let kinds = [
        world.types().kind_of::<A>(),
        world.types().kind_of::<B>(),
        world.types().kind_of::<C>(),
        world.types().kind_of::<D>(),
    ];
    let mut all = Vec::new();
    let mut any = Vec::new();
    let mut none = Vec::new();
    for kind in kinds {
        match rng.gen_range(0..5) {
            0 => all.push(kind),
            1 => any.push(kind),
            2 => none.push(kind),
            _ => {}
        }
    }
    Archetype::from_kinds(world.types(), all, any, none)
}

fn register_random(world: &mut World, rng: &mut ChaCha8Rng, archetypes: &mut Vec<Archetype>) {
    let archetype = random_archetype(world, rng);
    // Reusing a slot exercises re-registration and entry release.
    let registered = match rng.gen_range(0..6) {
        0 => world.register_system(Watcher::<0>, archetype.clone()),
        1 => world.register_system(Watcher::<1>, archetype.clone()),
        2 => world.register_system(Watcher::<2>, archetype.clone()),
        3 => world.register_system(Watcher::<3>, archetype.clone()),
        4 => world.register_system(Watcher::<4>, archetype.clone()),
        _ => world.register_system(Watcher::<5>, archetype.clone()),
    };
    registered.unwrap();
    archetypes.push(archetype);
}

fn check(world: &World, archetypes: &[Archetype]) {
    for archetype in archetypes {
        let Some(members) = world.members(archetype) else {
            // Entry was released by a re-registration.
            continue;
        };

        let unique: BTreeSet<EntityId> = members.iter().copied().collect();
        assert_eq!(unique.len(), members.len(), "duplicate member in {archetype}");

        let expected: BTreeSet<EntityId> = world
            .entities()
            .filter(|&e| {
                let mut kinds = KindSet::new();
                let types = world.types();
                for (present, kind) in [
                    (world.has_component::<A>(e), types.kind_of::<A>()),
                    (world.has_component::<B>(e), types.kind_of::<B>()),
                    (world.has_component::<C>(e), types.kind_of::<C>()),
                    (world.has_component::<D>(e), types.kind_of::<D>()),
                ] {
                    if present {
                        kinds.insert(kind);
                    }
                }
                archetype.matches(&kinds)
            })
            .collect();
        assert_eq!(unique, expected, "membership diverged for {archetype}");
    }
}

fn run_sequence(seed: u64, steps: usize) {
    let mut rng = ChaCha8Rng::seed_from_u64(seed);
    let mut world = World::with_config(WorldConfig::sequential()).unwrap();
    let mut live: Vec<EntityId> = Vec::new();
    let mut archetypes = Vec::new();

    for _ in 0..steps {
        match rng.gen_range(0..100) {
            0..=29 => {
                let e = world.spawn(());
                for _ in 0..rng.gen_range(0..3) {
                    add_random(&mut world, &mut rng, e);
                }
                live.push(e);
            }
            30..=54 if !live.is_empty() => {
                let e = live[rng.gen_range(0..live.len())];
                add_random(&mut world, &mut rng, e);
            }
            55..=74 if !live.is_empty() => {
                let e = live[rng.gen_range(0..live.len())];
                remove_random(&mut world, &mut rng, e);
            }
            75..=89 if !live.is_empty() => {
                let e = live.swap_remove(rng.gen_range(0..live.len()));
                assert!(world.despawn(e));
                assert!(!world.despawn(e));
            }
            90..=99 => register_random(&mut world, &mut rng, &mut archetypes),
            _ => {}
        }
        check(&world, &archetypes);
    }

    let report = world.tick().unwrap();
    assert!(report.is_clean());
}

#[test]
fn test_membership_matches_oracle() {
    for seed in [1, 7, 42, 1337] {
        run_sequence(seed, 400);
    }
}

#[test]
fn test_membership_after_late_registrations() {
    let mut rng = ChaCha8Rng::seed_from_u64(99);
    let mut world = World::with_config(WorldConfig::sequential()).unwrap();
    for _ in 0..200 {
        let e = world.spawn(());
        for _ in 0..rng.gen_range(0..4) {
            add_random(&mut world, &mut rng, e);
        }
    }

    let mut archetypes = Vec::new();
    for _ in 0..12 {
        register_random(&mut world, &mut rng, &mut archetypes);
        check(&world, &archetypes);
    }
}
