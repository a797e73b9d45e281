//! Party factory: builds a [`Party`] from a species/IV spec and a
//! [`SpeciesLookup`]. The full pokédex is an external collaborator; this
//! module only carries the contract plus a small in-memory fixture so the
//! crate is runnable end-to-end without a live data source.

use std::collections::HashMap;

use crate::codec::{Evs, Ivs, Party, Pokemon, PokemonStats, Pp};
use crate::error::PartyBuildError;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BaseStats {
    pub hp: u16,
    pub attack: u16,
    pub defense: u16,
    pub speed: u16,
    pub special_attack: u16,
    pub special_defense: u16,
}

/// Contract for looking up a species' base stats and level-1 movepool.
/// A full implementation would query a complete Generation I/II pokédex;
/// [`FixtureSpeciesLookup`] below is a documented stand-in.
pub trait SpeciesLookup {
    fn base_stats(&self, species_id: u8) -> Option<BaseStats>;

    /// Moves learned at or before level 1 in generation <= 2, in learn
    /// order, truncated to four.
    fn level_one_moves(&self, species_id: u8) -> Vec<u8>;
}

#[derive(Debug, Clone)]
pub struct PokemonSpec {
    pub species_id: u8,
    pub ivs: [u8; 5],
    pub held_item_id: Option<u8>,
    pub ot_id: Option<u16>,
    pub nickname: Option<String>,
}

#[derive(Debug, Clone)]
pub struct PartySpec {
    pub trainer_name: String,
    pub slots: Vec<PokemonSpec>,
}

const LEVEL: u8 = 1;

fn level_one_stat(base: u16, iv: u8, is_hp: bool) -> u16 {
    let raw = ((base + iv as u16) * 2 * LEVEL as u16) / 100;
    if is_hp { raw + LEVEL as u16 + 10 } else { raw + 5 }
}

/// Builds a complete, tradeable [`Party`] from a spec against a species
/// data source, matching the level-1 stat formula used across the
/// Generation I/II core series.
pub fn build_party(spec: &PartySpec, lookup: &dyn SpeciesLookup) -> Result<Party, PartyBuildError> {
    let mut pokemon = Vec::with_capacity(spec.slots.len());
    let mut ot_names = Vec::with_capacity(spec.slots.len());
    let mut nicknames = Vec::with_capacity(spec.slots.len());

    for slot in &spec.slots {
        let base = lookup
            .base_stats(slot.species_id)
            .ok_or(PartyBuildError::UnknownSpecies(slot.species_id))?;
        let moves_ids = lookup.level_one_moves(slot.species_id);
        let [hp_iv, atk_iv, def_iv, spe_iv, spc_iv] = slot.ivs;

        let stats = PokemonStats {
            hp: level_one_stat(base.hp, hp_iv, true),
            max_hp: level_one_stat(base.hp, hp_iv, true),
            attack: level_one_stat(base.attack, atk_iv, false),
            defense: level_one_stat(base.defense, def_iv, false),
            speed: level_one_stat(base.speed, spe_iv, false),
            special_attack: level_one_stat(base.special_attack, spc_iv, false),
            special_defense: level_one_stat(base.special_defense, spc_iv, false),
        };

        let moves_pps = moves_ids.iter().map(|_| Pp { pp_ups: 0, current_pps: 1 }).collect();

        pokemon.push(Pokemon {
            dex_id: slot.species_id,
            item_held_id: slot.held_item_id.unwrap_or(0),
            moves_ids,
            moves_pps,
            ot: slot.ot_id.unwrap_or(0),
            exp_points: 0,
            evs: Evs::default(),
            ivs: Ivs { hp: 0, attack: atk_iv, defense: def_iv, speed: spe_iv, special: spc_iv },
            friendship_or_egg_cycles: 70,
            pokerus: 0,
            caught_data: 0,
            level: LEVEL,
            status_cond: 0,
            stats,
        });
        ot_names.push(spec.trainer_name.clone());
        nicknames.push(slot.nickname.clone().unwrap_or_else(|| species_default_name(slot.species_id)));
    }

    Ok(Party {
        trainer_name: spec.trainer_name.clone(),
        pokemon,
        ot_names,
        nicknames,
    })
}

fn species_default_name(species_id: u8) -> String {
    format!("MON{species_id:03}")
}

/// A small, documented stand-in for a full Generation I/II pokédex.
/// Covers enough species to build and trade varied demo parties; extend
/// the table (or provide another [`SpeciesLookup`]) for broader coverage.
pub struct FixtureSpeciesLookup {
    table: HashMap<u8, (BaseStats, Vec<u8>)>,
}

impl FixtureSpeciesLookup {
    pub fn new() -> Self {
        let mut table = HashMap::new();
        // (species_id, base stats, level-1 moves) pulled from the public
        // Generation I/II base stat tables.
        table.insert(
            1, // Bulbasaur
            (BaseStats { hp: 45, attack: 49, defense: 49, speed: 45, special_attack: 65, special_defense: 65 }, vec![33, 45]),
        );
        table.insert(
            4, // Charmander
            (BaseStats { hp: 39, attack: 52, defense: 43, speed: 65, special_attack: 60, special_defense: 50 }, vec![33, 10]),
        );
        table.insert(
            7, // Squirtle
            (BaseStats { hp: 44, attack: 48, defense: 65, speed: 43, special_attack: 50, special_defense: 64 }, vec![33, 45]),
        );
        table.insert(
            25, // Pikachu
            (BaseStats { hp: 35, attack: 55, defense: 30, speed: 90, special_attack: 50, special_defense: 40 }, vec![84, 45]),
        );
        table.insert(
            152, // Chikorita
            (BaseStats { hp: 45, attack: 49, defense: 65, speed: 32, special_attack: 49, special_defense: 65 }, vec![33, 45]),
        );
        table.insert(
            155, // Cyndaquil
            (BaseStats { hp: 39, attack: 52, defense: 43, speed: 65, special_attack: 60, special_defense: 50 }, vec![33, 10]),
        );
        table.insert(
            158, // Totodile
            (BaseStats { hp: 50, attack: 65, defense: 64, speed: 43, special_attack: 44, special_defense: 48 }, vec![33, 45]),
        );
        Self { table }
    }
}

impl Default for FixtureSpeciesLookup {
    fn default() -> Self {
        Self::new()
    }
}

impl SpeciesLookup for FixtureSpeciesLookup {
    fn base_stats(&self, species_id: u8) -> Option<BaseStats> {
        self.table.get(&species_id).map(|(stats, _)| *stats)
    }

    fn level_one_moves(&self, species_id: u8) -> Vec<u8> {
        self.table.get(&species_id).map(|(_, moves)| moves.clone()).unwrap_or_default()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn build_party_computes_level_one_stats() {
        let lookup = FixtureSpeciesLookup::new();
        let spec = PartySpec {
            trainer_name: "RED".into(),
            slots: vec![PokemonSpec {
                species_id: 1,
                ivs: [0, 15, 9, 3, 12],
                held_item_id: None,
                ot_id: Some(1),
                nickname: None,
            }],
        };
        let party = build_party(&spec, &lookup).unwrap();
        assert_eq!(party.pokemon.len(), 1);
        let mon = &party.pokemon[0];
        assert_eq!(mon.stats.hp, 11);
        assert_eq!(mon.moves_ids, vec![33, 45]);
    }

    #[test]
    fn build_party_rejects_unknown_species() {
        let lookup = FixtureSpeciesLookup::new();
        let spec = PartySpec {
            trainer_name: "RED".into(),
            slots: vec![PokemonSpec { species_id: 250, ivs: [0; 5], held_item_id: None, ot_id: None, nickname: None }],
        };
        assert!(matches!(build_party(&spec, &lookup), Err(PartyBuildError::UnknownSpecies(250))));
    }
}
