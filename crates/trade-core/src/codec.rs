//! Generation II party/Pokémon binary layout and pokestr text encoding.
//!
//! See <https://bulbapedia.bulbagarden.net/wiki/Pok%C3%A9mon_data_structure_(Generation_II)>
//! and the analogous Generation I party layout for the trainer/OT/nickname
//! fields.

use crate::error::CodecError;

pub const POKE_TEXT_MAX_LEN: usize = 10;
pub const POKE_TEXT_FIELD_LEN: usize = POKE_TEXT_MAX_LEN + 1;
pub const POKEMON_N_BYTES: usize = 48;
pub const MAX_PARTY_POKEMON: usize = 6;
pub const PARTY_N_BYTES: usize =
    POKE_TEXT_FIELD_LEN + 10 + POKEMON_N_BYTES * MAX_PARTY_POKEMON + POKE_TEXT_FIELD_LEN * MAX_PARTY_POKEMON * 2;

const POKE_TEXT_OFFSET: u8 = 0x3F;
const POKE_TEXT_TERMINATOR: u8 = 0x50;
const DEX_ID_TERMINATOR: u8 = 0xFF;
const PARTY_HEADER_SENTINEL: [u8; 2] = [0xF3, 0x74];

/// Encodes a trainer/OT/nickname string into an 11-byte pokestr field.
pub fn encode_pokestr(s: &str) -> Result<[u8; POKE_TEXT_FIELD_LEN], CodecError> {
    let chars: Vec<char> = s.chars().collect();
    if chars.len() > POKE_TEXT_MAX_LEN {
        return Err(CodecError::InvalidName(s.to_string()));
    }
    let mut field = [0u8; POKE_TEXT_FIELD_LEN];
    for (i, c) in chars.iter().enumerate() {
        field[i] = *c as u32 as u8 + POKE_TEXT_OFFSET;
    }
    field[chars.len()] = POKE_TEXT_TERMINATOR;
    Ok(field)
}

/// Decodes an 11-byte pokestr field back into a string, stopping at the
/// terminator byte.
pub fn decode_pokestr(field: &[u8; POKE_TEXT_FIELD_LEN]) -> Result<String, CodecError> {
    let term = field
        .iter()
        .position(|&b| b == POKE_TEXT_TERMINATOR)
        .ok_or(CodecError::InvalidLayout("pokestr field missing terminator"))?;
    Ok(field[..term].iter().map(|&b| (b - POKE_TEXT_OFFSET) as u32).filter_map(char::from_u32).collect())
}

/// Packed per-stat individual values (0..=15 each). `hp` is never stored on
/// the wire; it is always treated as 0 on decode and never re-derived.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct Ivs {
    pub hp: u8,
    pub attack: u8,
    pub defense: u8,
    pub speed: u8,
    pub special: u8,
}

impl Ivs {
    fn pack(self) -> u16 {
        (self.attack as u16) | (self.defense as u16) << 4 | (self.speed as u16) << 8 | (self.special as u16) << 12
    }

    fn unpack(word: u16) -> Self {
        Self {
            hp: 0,
            attack: (word & 0xF) as u8,
            defense: (word >> 4 & 0xF) as u8,
            speed: (word >> 8 & 0xF) as u8,
            special: (word >> 12 & 0xF) as u8,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct Evs {
    pub hp: u16,
    pub attack: u16,
    pub defense: u16,
    pub speed: u16,
    pub special: u16,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct PokemonStats {
    pub hp: u16,
    pub max_hp: u16,
    pub attack: u16,
    pub defense: u16,
    pub speed: u16,
    pub special_attack: u16,
    pub special_defense: u16,
}

/// One move's PP state: upgrade count (0..=3) in the top two bits, current
/// PP in the bottom six.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct Pp {
    pub pp_ups: u8,
    pub current_pps: u8,
}

impl Pp {
    fn pack(self) -> u8 {
        (self.pp_ups << 6 & 0xC0) | (self.current_pps & 0x3F)
    }

    fn unpack(byte: u8) -> Self {
        Self {
            pp_ups: byte >> 6 & 0x3,
            current_pps: byte & 0x3F,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Pokemon {
    pub dex_id: u8,
    pub item_held_id: u8,
    pub moves_ids: Vec<u8>,
    pub moves_pps: Vec<Pp>,
    pub ot: u16,
    pub exp_points: u32,
    pub evs: Evs,
    pub ivs: Ivs,
    pub friendship_or_egg_cycles: u8,
    pub pokerus: u8,
    pub caught_data: u16,
    pub level: u8,
    pub status_cond: u8,
    pub stats: PokemonStats,
}

impl Pokemon {
    pub fn to_bytes(&self) -> [u8; POKEMON_N_BYTES] {
        let mut buf = [0u8; POKEMON_N_BYTES];
        let mut moves = [0u8; 4];
        moves[..self.moves_ids.len()].copy_from_slice(&self.moves_ids);
        let mut pps = [0u8; 4];
        for (i, pp) in self.moves_pps.iter().enumerate() {
            pps[i] = pp.pack();
        }

        buf[0] = self.dex_id;
        buf[1] = self.item_held_id;
        buf[2..6].copy_from_slice(&moves);
        buf[6..8].copy_from_slice(&self.ot.to_be_bytes());
        buf[8..11].copy_from_slice(&self.exp_points.to_be_bytes()[1..4]);
        buf[11..13].copy_from_slice(&self.evs.hp.to_be_bytes());
        buf[13..15].copy_from_slice(&self.evs.attack.to_be_bytes());
        buf[15..17].copy_from_slice(&self.evs.defense.to_be_bytes());
        buf[17..19].copy_from_slice(&self.evs.speed.to_be_bytes());
        buf[19..21].copy_from_slice(&self.evs.special.to_be_bytes());
        buf[21..23].copy_from_slice(&self.ivs.pack().to_be_bytes());
        buf[23..27].copy_from_slice(&pps);
        buf[27] = self.friendship_or_egg_cycles;
        buf[28] = self.pokerus;
        buf[29..31].copy_from_slice(&self.caught_data.to_be_bytes());
        buf[31] = self.level;
        buf[32] = self.status_cond;
        buf[33] = 0; // unused padding byte
        buf[34..36].copy_from_slice(&self.stats.hp.to_be_bytes());
        buf[36..38].copy_from_slice(&self.stats.max_hp.to_be_bytes());
        buf[38..40].copy_from_slice(&self.stats.attack.to_be_bytes());
        buf[40..42].copy_from_slice(&self.stats.defense.to_be_bytes());
        buf[42..44].copy_from_slice(&self.stats.speed.to_be_bytes());
        buf[44..46].copy_from_slice(&self.stats.special_attack.to_be_bytes());
        buf[46..48].copy_from_slice(&self.stats.special_defense.to_be_bytes());
        buf
    }

    pub fn from_bytes(buf: &[u8; POKEMON_N_BYTES]) -> Self {
        let u16_at = |o: usize| u16::from_be_bytes([buf[o], buf[o + 1]]);
        let moves_ids: Vec<u8> = buf[2..6].iter().copied().filter(|&m| m != 0).collect();
        let moves_pps: Vec<Pp> = buf[23..23 + moves_ids.len()].iter().map(|&b| Pp::unpack(b)).collect();
        Self {
            dex_id: buf[0],
            item_held_id: buf[1],
            moves_ids,
            moves_pps,
            ot: u16_at(6),
            exp_points: u32::from_be_bytes([0, buf[8], buf[9], buf[10]]),
            evs: Evs {
                hp: u16_at(11),
                attack: u16_at(13),
                defense: u16_at(15),
                speed: u16_at(17),
                special: u16_at(19),
            },
            ivs: Ivs::unpack(u16_at(21)),
            friendship_or_egg_cycles: buf[27],
            pokerus: buf[28],
            caught_data: u16_at(29),
            level: buf[31],
            status_cond: buf[32],
            stats: PokemonStats {
                hp: u16_at(34),
                max_hp: u16_at(36),
                attack: u16_at(38),
                defense: u16_at(40),
                speed: u16_at(42),
                special_attack: u16_at(44),
                special_defense: u16_at(46),
            },
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Party {
    pub trainer_name: String,
    pub pokemon: Vec<Pokemon>,
    pub ot_names: Vec<String>,
    pub nicknames: Vec<String>,
}

/// Encodes a party to its fixed 441-byte on-wire layout.
pub fn encode_party(party: &Party) -> Result<[u8; PARTY_N_BYTES], CodecError> {
    let mut buf = [0u8; PARTY_N_BYTES];
    let mut offset = 0;

    buf[offset..offset + POKE_TEXT_FIELD_LEN].copy_from_slice(&encode_pokestr(&party.trainer_name)?);
    offset += POKE_TEXT_FIELD_LEN;

    buf[offset] = party.pokemon.len() as u8;
    offset += 1;

    for slot in 0..MAX_PARTY_POKEMON {
        buf[offset] = party.pokemon.get(slot).map(|p| p.dex_id).unwrap_or(DEX_ID_TERMINATOR);
        offset += 1;
    }
    buf[offset] = DEX_ID_TERMINATOR;
    offset += 1;

    buf[offset..offset + 2].copy_from_slice(&PARTY_HEADER_SENTINEL);
    offset += 2;

    for slot in 0..MAX_PARTY_POKEMON {
        if let Some(p) = party.pokemon.get(slot) {
            buf[offset..offset + POKEMON_N_BYTES].copy_from_slice(&p.to_bytes());
        }
        offset += POKEMON_N_BYTES;
    }

    for names in [&party.ot_names, &party.nicknames] {
        for slot in 0..MAX_PARTY_POKEMON {
            if let Some(name) = names.get(slot) {
                buf[offset..offset + POKE_TEXT_FIELD_LEN].copy_from_slice(&encode_pokestr(name)?);
            }
            offset += POKE_TEXT_FIELD_LEN;
        }
    }

    debug_assert_eq!(offset, PARTY_N_BYTES);
    Ok(buf)
}

/// Decodes a party from its fixed 441-byte on-wire layout.
pub fn decode_party(buf: &[u8; PARTY_N_BYTES]) -> Result<Party, CodecError> {
    let mut offset = 0;
    let name_field: [u8; POKE_TEXT_FIELD_LEN] = buf[offset..offset + POKE_TEXT_FIELD_LEN].try_into().unwrap();
    let trainer_name = decode_pokestr(&name_field)?;
    offset += POKE_TEXT_FIELD_LEN;

    let count = buf[offset] as usize;
    offset += 1;
    if count > MAX_PARTY_POKEMON {
        return Err(CodecError::InvalidLayout("party pokemon count exceeds 6"));
    }

    offset += MAX_PARTY_POKEMON + 1; // species ids + terminator, not needed beyond count
    offset += 2; // header sentinel

    let mut pokemon = Vec::with_capacity(count);
    for slot in 0..MAX_PARTY_POKEMON {
        let chunk: [u8; POKEMON_N_BYTES] = buf[offset..offset + POKEMON_N_BYTES].try_into().unwrap();
        if slot < count {
            pokemon.push(Pokemon::from_bytes(&chunk));
        }
        offset += POKEMON_N_BYTES;
    }

    let mut ot_names = Vec::with_capacity(count);
    let mut nicknames = Vec::with_capacity(count);
    for (slot_count, names) in [&mut ot_names, &mut nicknames].into_iter().enumerate() {
        let _ = slot_count;
        for slot in 0..MAX_PARTY_POKEMON {
            let field: [u8; POKE_TEXT_FIELD_LEN] = buf[offset..offset + POKE_TEXT_FIELD_LEN].try_into().unwrap();
            if slot < count {
                names.push(decode_pokestr(&field)?);
            }
            offset += POKE_TEXT_FIELD_LEN;
        }
    }

    debug_assert_eq!(offset, PARTY_N_BYTES);
    Ok(Party {
        trainer_name,
        pokemon,
        ot_names,
        nicknames,
    })
}
