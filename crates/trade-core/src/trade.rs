//! Magic-byte-driven Generation II trade protocol, run over a stream of
//! SIO bytes. Every inbound byte produces exactly one outbound byte; the
//! state machine never initiates a transfer on its own.

use log::{debug, trace};
use rand::Rng;

use crate::codec::{decode_party, encode_party, Party, PARTY_N_BYTES};
use crate::error::TradeError;

pub const MASTER: u8 = 0x01;
pub const SLAVE: u8 = 0x02;
pub const CONNECTED: u8 = 0x61;
pub const TERMINATOR: u8 = 0xFD;
pub const IN_TRADE_ROOM: u8 = 0xD1;
pub const FIRST_POKEMON: u8 = 0x70;
pub const LAST_POKEMON: u8 = 0x75;
pub const EXIT_SELECTION: u8 = 0x7F;
pub const CANCEL: u8 = 0x71;
pub const CONFIRM: u8 = 0x72;

/// A source of inbound SIO bytes. `recv` blocks until a byte is available
/// and returns `None` once the source is permanently closed.
pub trait ByteSource {
    fn recv(&mut self) -> Option<u8>;
}

/// A sink for outbound SIO bytes, framed by the caller as MASTER/SLAVE
/// link packets.
pub trait ByteSink {
    fn send(&mut self, byte: u8) -> Result<(), TradeError>;
}

#[derive(Debug, Clone, PartialEq, Eq)]
enum State {
    NotConnected,
    InTradeRoom,
    SendingRandomSeed,
    InterchangePokemonTeams,
    SelectingPokemon,
    WaitingTradeConfirm,
    TradingPokemon,
    WaitFor { value: u8, echo: Option<u8>, next: Box<State> },
    WaitWhile { value: u8, echo: Option<u8>, next: Box<State> },
}

fn wait_for(value: u8, echo: Option<u8>, next: State) -> State {
    State::WaitFor { value, echo, next: Box::new(next) }
}

fn wait_while(value: u8, echo: Option<u8>, next: State) -> State {
    State::WaitWhile { value, echo, next: Box::new(next) }
}

/// Drives one side of a Generation II trade against a counterpart SIO
/// stream, mutating the local party in place on a confirmed swap.
pub struct TradeMachine {
    state: State,
    party: Party,
    peer_party: Option<Party>,
    me_sends: Option<usize>,
    other_sends: Option<usize>,
    lookahead: Option<u8>,
}

impl TradeMachine {
    pub fn new(party: Party) -> Self {
        Self {
            state: State::NotConnected,
            party,
            peer_party: None,
            me_sends: None,
            other_sends: None,
            lookahead: None,
        }
    }

    pub fn party(&self) -> &Party {
        &self.party
    }

    fn next_byte(&mut self, src: &mut dyn ByteSource) -> Option<u8> {
        self.lookahead.take().or_else(|| src.recv())
    }

    fn peek_byte(&mut self, src: &mut dyn ByteSource) -> Option<u8> {
        if self.lookahead.is_none() {
            self.lookahead = src.recv();
        }
        self.lookahead
    }

    /// Runs until the SIO source closes, returning `Ok(())` on a clean
    /// shutdown or the error that ended the trade early.
    pub fn run(&mut self, src: &mut dyn ByteSource, sink: &mut dyn ByteSink) -> Result<(), TradeError> {
        loop {
            self.state = self.step(src, sink)?;
        }
    }

    fn step(&mut self, src: &mut dyn ByteSource, sink: &mut dyn ByteSink) -> Result<State, TradeError> {
        match std::mem::replace(&mut self.state, State::NotConnected) {
            State::NotConnected => {
                let d = self.next_byte(src).ok_or(TradeError::EndOfStream)?;
                match d {
                    MASTER => {
                        sink.send(SLAVE)?;
                        Ok(State::NotConnected)
                    }
                    SLAVE => {
                        sink.send(MASTER)?;
                        Ok(State::NotConnected)
                    }
                    CONNECTED => {
                        sink.send(CONNECTED)?;
                        Ok(wait_for(IN_TRADE_ROOM, None, State::InTradeRoom))
                    }
                    other => {
                        sink.send(other)?;
                        Ok(State::NotConnected)
                    }
                }
            }

            State::InTradeRoom => Ok(wait_for(TERMINATOR, None, State::SendingRandomSeed)),

            State::SendingRandomSeed => Ok(wait_for(TERMINATOR, None, State::InterchangePokemonTeams)),

            State::InterchangePokemonTeams => {
                let local_bytes = encode_party(&self.party)
                    .map_err(|_| TradeError::ProtocolViolation("failed to encode local party for interchange"))?;
                let mut peer_buf = [0u8; PARTY_N_BYTES];
                for (pb, opb) in local_bytes.iter().zip(peer_buf.iter_mut()) {
                    let incoming = self.next_byte(src).ok_or(TradeError::EndOfStream)?;
                    sink.send(*pb)?;
                    *opb = incoming;
                }
                self.peer_party = Some(
                    decode_party(&peer_buf)
                        .map_err(|_| TradeError::ProtocolViolation("peer sent an invalid party layout"))?,
                );
                Ok(wait_while(TERMINATOR, None, State::SelectingPokemon))
            }

            State::SelectingPokemon => {
                let d = self.next_byte(src).ok_or(TradeError::EndOfStream)?;
                if (FIRST_POKEMON..=LAST_POKEMON).contains(&d) {
                    if self.party.pokemon.is_empty() {
                        return Err(TradeError::ProtocolViolation("cannot offer a pokemon from an empty party"));
                    }
                    let other_slot = (d - FIRST_POKEMON) as usize;
                    let my_slot = rand::thread_rng().gen_range(0..self.party.pokemon.len());
                    trace!("selecting local slot {my_slot} against peer slot {other_slot}");
                    self.me_sends = Some(my_slot);
                    self.other_sends = Some(other_slot);
                    let reply = FIRST_POKEMON + my_slot as u8;
                    sink.send(reply)?;
                    Ok(wait_while(d, Some(reply), State::WaitingTradeConfirm))
                } else if d == EXIT_SELECTION {
                    sink.send(EXIT_SELECTION)?;
                    Ok(wait_while(EXIT_SELECTION, None, State::InTradeRoom))
                } else {
                    sink.send(d)?;
                    Ok(State::SelectingPokemon)
                }
            }

            State::WaitingTradeConfirm => {
                let d = self.next_byte(src).ok_or(TradeError::EndOfStream)?;
                sink.send(d)?;
                match d {
                    CANCEL => Ok(wait_while(CANCEL, Some(CANCEL), State::SelectingPokemon)),
                    CONFIRM => Ok(wait_while(CONFIRM, Some(CONFIRM), State::TradingPokemon)),
                    _ => Ok(State::WaitingTradeConfirm),
                }
            }

            State::TradingPokemon => {
                let d = self.next_byte(src).ok_or(TradeError::EndOfStream)?;
                sink.send(d)?;
                if d == TERMINATOR {
                    self.commit_trade()?;
                    Ok(wait_while(TERMINATOR, None, State::SendingRandomSeed))
                } else {
                    Ok(State::TradingPokemon)
                }
            }

            State::WaitFor { value, echo, next } => {
                let d = self.next_byte(src).ok_or(TradeError::EndOfStream)?;
                sink.send(echo.unwrap_or(d))?;
                if d == value {
                    Ok(wait_while(value, echo, *next))
                } else {
                    Ok(wait_for(value, echo, *next))
                }
            }

            State::WaitWhile { value, echo, next } => {
                let d = self.peek_byte(src).ok_or(TradeError::EndOfStream)?;
                if d != value {
                    sink.send(echo.unwrap_or(d))?;
                    Ok(*next)
                } else {
                    self.lookahead = None;
                    sink.send(echo.unwrap_or(d))?;
                    Ok(wait_while(value, echo, *next))
                }
            }
        }
    }

    fn commit_trade(&mut self) -> Result<(), TradeError> {
        let me = self.me_sends.take().ok_or(TradeError::ProtocolViolation("trade confirmed with no local slot chosen"))?;
        let other = self.other_sends.take().ok_or(TradeError::ProtocolViolation("trade confirmed with no peer slot chosen"))?;
        let peer = self.peer_party.take().ok_or(TradeError::ProtocolViolation("trade confirmed with no peer party received"))?;

        let incoming_pokemon = peer.pokemon.get(other).cloned().ok_or(TradeError::ProtocolViolation("peer slot out of range"))?;
        let incoming_ot = peer.ot_names.get(other).cloned().unwrap_or_default();
        let incoming_nick = peer.nicknames.get(other).cloned().unwrap_or_default();

        if me >= self.party.pokemon.len() {
            return Err(TradeError::ProtocolViolation("local slot out of range"));
        }
        self.party.pokemon[me] = incoming_pokemon;
        self.party.ot_names[me] = incoming_ot;
        self.party.nicknames[me] = incoming_nick;
        debug!("committed trade: local slot {me} now holds peer slot {other}");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::VecDeque;

    struct VecSource(VecDeque<u8>);
    impl ByteSource for VecSource {
        fn recv(&mut self) -> Option<u8> {
            self.0.pop_front()
        }
    }

    #[derive(Default)]
    struct VecSink(Vec<u8>);
    impl ByteSink for VecSink {
        fn send(&mut self, byte: u8) -> Result<(), TradeError> {
            self.0.push(byte);
            Ok(())
        }
    }

    fn sample_party(name: &str) -> Party {
        use crate::codec::{Evs, Ivs, Pokemon, PokemonStats, Pp};
        Party {
            trainer_name: name.into(),
            pokemon: vec![Pokemon {
                dex_id: 25,
                item_held_id: 0,
                moves_ids: vec![84],
                moves_pps: vec![Pp { pp_ups: 0, current_pps: 20 }],
                ot: 1,
                exp_points: 0,
                evs: Evs::default(),
                ivs: Ivs::default(),
                friendship_or_egg_cycles: 70,
                pokerus: 0,
                caught_data: 0,
                level: 1,
                status_cond: 0,
                stats: PokemonStats { hp: 11, max_hp: 11, attack: 7, defense: 6, speed: 8, special_attack: 6, special_defense: 6 },
            }],
            ot_names: vec![name.into()],
            nicknames: vec!["PIKACHU".into()],
        }
    }

    #[test]
    fn not_connected_replies_to_master_and_slave() {
        let mut machine = TradeMachine::new(sample_party("RED"));
        let mut src = VecSource(VecDeque::from([MASTER]));
        let mut sink = VecSink::default();
        let next = machine.step(&mut src, &mut sink).unwrap();
        assert_eq!(sink.0, vec![SLAVE]);
        assert_eq!(next, State::NotConnected);
    }

    #[test]
    fn connected_byte_advances_to_wait_for_trade_room() {
        let mut machine = TradeMachine::new(sample_party("RED"));
        let mut src = VecSource(VecDeque::from([CONNECTED]));
        let mut sink = VecSink::default();
        let next = machine.step(&mut src, &mut sink).unwrap();
        assert_eq!(sink.0, vec![CONNECTED]);
        assert!(matches!(next, State::WaitFor { value: IN_TRADE_ROOM, .. }));
    }

    #[test]
    fn wait_for_echoes_until_target_then_transitions() {
        let next = wait_for(0xAA, None, State::InTradeRoom);
        let mut machine = TradeMachine::new(sample_party("RED"));
        machine.state = next;
        let mut src = VecSource(VecDeque::from([0x11]));
        let mut sink = VecSink::default();
        let s1 = machine.step(&mut src, &mut sink).unwrap();
        assert_eq!(sink.0, vec![0x11]);
        assert!(matches!(s1, State::WaitFor { value: 0xAA, .. }));

        machine.state = s1;
        let mut src2 = VecSource(VecDeque::from([0xAA]));
        let mut sink2 = VecSink::default();
        let s2 = machine.step(&mut src2, &mut sink2).unwrap();
        assert_eq!(sink2.0, vec![0xAA]);
        assert!(matches!(s2, State::WaitWhile { value: 0xAA, .. }));
    }

    #[test]
    fn wait_while_does_not_consume_the_transition_byte() {
        let mut machine = TradeMachine::new(sample_party("RED"));
        machine.state = wait_while(TERMINATOR, None, State::SelectingPokemon);
        let mut src = VecSource(VecDeque::from([FIRST_POKEMON]));
        let mut sink = VecSink::default();
        let next = machine.step(&mut src, &mut sink).unwrap();
        assert_eq!(next, State::SelectingPokemon);
        // The byte was echoed but not consumed from the lookahead/queue view:
        // the next state will see it again via lookahead.
        assert_eq!(sink.0, vec![FIRST_POKEMON]);
        assert_eq!(machine.lookahead, Some(FIRST_POKEMON));
    }

    #[test]
    fn full_trade_swaps_exactly_one_slot() {
        // Handshake and the random-seed barriers are exercised by the
        // WaitFor/WaitWhile tests above; start past them to keep this test
        // focused on the interchange -> select -> confirm -> commit path.
        let mut machine = TradeMachine::new(sample_party("RED"));
        machine.state = State::InterchangePokemonTeams;

        let mut peer = sample_party("BLUE");
        peer.pokemon[0].dex_id = 1; // distinguish from RED's starting Pikachu
        peer.nicknames[0] = "BULBASAUR".into();
        let peer_bytes = encode_party(&peer).unwrap();

        let mut bytes = VecDeque::new();
        bytes.extend(peer_bytes.iter().copied());
        bytes.push_back(FIRST_POKEMON); // peer offers their only slot (0)
        bytes.push_back(CONFIRM);
        bytes.push_back(TERMINATOR);

        let mut src = VecSource(bytes);
        let mut sink = VecSink::default();
        loop {
            match machine.step(&mut src, &mut sink) {
                Ok(next) => machine.state = next,
                Err(TradeError::EndOfStream) => break,
                Err(e) => panic!("unexpected error: {e:?}"),
            }
        }

        assert_eq!(machine.party().pokemon[0].dex_id, 1);
        assert_eq!(machine.party().nicknames[0], "BULBASAUR");
        assert!(machine.peer_party.is_none());
        assert!(machine.me_sends.is_none());
    }
}
