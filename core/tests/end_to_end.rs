//! End-to-end round scenarios (spec.md §8), driven over a chain of 3 with
//! 1 dead-drop server: FrontServer (hop 0) -> MiddleServer (hop 1, also
//! `last_onion_hop`) -> SpreadingServer (hop 2) -> DeadDropServer -> and
//! back. Every hop's admit/shuffle/complete methods are synchronous and
//! lock-guarded, so the round can be driven directly without a runtime;
//! the `tokio::test` harness is used anyway to match the async surface
//! the simulation binary drives the same servers through.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use mixchain_core::crypto::{PublicKeyBytes, StaticKeypair};
use mixchain_core::onion::{ChainLayer, DeadDropLayer};
use mixchain_core::server::deaddrop::DeadDropServer;
use mixchain_core::server::front::FrontServer;
use mixchain_core::server::middle::MiddleServer;
use mixchain_core::server::spreading::SpreadingServer;
use mixchain_core::{ChainConfig, Client};

struct Chain {
    cfg: Arc<ChainConfig>,
    front: FrontServer<u32>,
    middle: MiddleServer,
    spreading: SpreadingServer,
    dead_drops: Vec<DeadDropServer>,
}

fn build_chain(dead_drop_count: usize) -> Chain {
    let front_secret = StaticKeypair::generate();
    let middle_secret = StaticKeypair::generate();
    let spreading_key = StaticKeypair::generate().public(); // never used for AEAD
    let dd_secrets: Vec<_> = (0..dead_drop_count).map(|_| StaticKeypair::generate()).collect();

    let cfg = Arc::new(ChainConfig {
        chain_len: 3,
        chain_keys: vec![front_secret.public(), middle_secret.public(), spreading_key],
        dead_drop_count,
        dead_drop_keys: dd_secrets.iter().map(|k| k.public()).collect(),
        slot_space: mixchain_core::config::FULL_SLOT_SPACE,
        inner_payload_budget: 256,
        round_duration: Duration::from_millis(100),
        hop_timeout: Duration::from_millis(100),
        reply_timeout: Duration::from_millis(100),
    });
    cfg.validate().unwrap();

    Chain {
        cfg: cfg.clone(),
        front: FrontServer::new(cfg.clone(), front_secret),
        middle: MiddleServer::new(1, middle_secret),
        spreading: SpreadingServer::new(),
        dead_drops: dd_secrets.into_iter().map(DeadDropServer::new).collect(),
    }
}

/// Run one full round given each client's outer onion, keyed by its
/// long-term public key. Returns the wrapped reply for every admitted
/// client, in no particular order.
fn run_round(
    chain: &Chain,
    round: u64,
    admissions: &[(PublicKeyBytes, ChainLayer)],
) -> HashMap<PublicKeyBytes, Vec<u8>> {
    chain.front.start_round(round);
    chain.middle.start_round(round);
    chain.spreading.start_round(round);
    for dd in &chain.dead_drops {
        dd.start_round(round);
    }

    let n = admissions.len();
    for (client_key, outer) in admissions {
        chain.front.admit(*client_key, outer).unwrap();
    }

    let to_middle = chain.front.close_and_shuffle();
    assert_eq!(to_middle.len(), n);

    chain.middle.set_expected(n);
    for body in &to_middle {
        let layer: ChainLayer = bincode::deserialize(body).unwrap();
        chain.middle.admit(&layer).unwrap();
    }
    let to_spreading = chain.middle.close_and_shuffle();
    assert_eq!(to_spreading.len(), n);

    chain.spreading.set_expected(n);
    for body in &to_spreading {
        chain.spreading.admit(body).unwrap();
    }
    let routed = chain.spreading.route_to_dead_drops();

    let mut dd_replies: HashMap<u16, Vec<Vec<u8>>> = HashMap::new();
    for (dead_drop_index, indices_and_layers) in &routed.dest {
        let dd = &chain.dead_drops[*dead_drop_index as usize];
        dd.set_expected(indices_and_layers.len());
        let layers: Vec<DeadDropLayer> = indices_and_layers.iter().map(|(_, l)| l.clone()).collect();
        for layer in &layers {
            dd.admit(layer).unwrap();
        }
        dd_replies.insert(*dead_drop_index, dd.match_and_wrap());
    }

    let from_spreading = chain.spreading.complete_round(&routed, dd_replies);
    let from_middle = chain.middle.complete_round(from_spreading);
    let from_front = chain.front.complete_round(from_middle);

    from_front.into_iter().collect()
}

#[tokio::test]
async fn single_active_pair_swaps_messages() {
    let chain = build_chain(1);
    let mut alice = Client::new(chain.cfg.clone(), 0);
    let mut bob = Client::new(chain.cfg.clone(), 0);
    alice.dial(bob.public_key());
    bob.dial(alice.public_key());
    alice.new_message(b"Hello".to_vec()).unwrap();
    bob.new_message(b"Hi".to_vec()).unwrap();

    let pending_alice = alice.on_round_start(0).unwrap();
    let pending_bob = bob.on_round_start(0).unwrap();
    let admissions = vec![
        (alice.public_key(), alice.outer_onion(&pending_alice)),
        (bob.public_key(), bob.outer_onion(&pending_bob)),
    ];

    let replies = run_round(&chain, 0, &admissions);

    let alice_reply = alice.decrypt_reply(&pending_alice, &replies[&alice.public_key()]).unwrap();
    let bob_reply = bob.decrypt_reply(&pending_bob, &replies[&bob.public_key()]).unwrap();
    assert_eq!(alice_reply, b"Hi");
    assert_eq!(bob_reply, b"Hello");
}

#[tokio::test]
async fn mismatched_partner_both_get_empty() {
    let chain = build_chain(1);
    let mut alice = Client::new(chain.cfg.clone(), 0);
    let bob = Client::new(chain.cfg.clone(), 0);
    alice.dial(bob.public_key()); // bob never dials alice back
    alice.new_message(b"Test".to_vec()).unwrap();

    let pending_alice = alice.on_round_start(0).unwrap();
    let admissions = vec![(alice.public_key(), alice.outer_onion(&pending_alice))];
    let replies = run_round(&chain, 0, &admissions);

    let alice_reply = alice.decrypt_reply(&pending_alice, &replies[&alice.public_key()]).unwrap();
    assert!(alice_reply.is_empty());
}

#[tokio::test]
async fn idle_round_everyone_covers_and_nothing_crashes() {
    let chain = build_chain(1);
    let mut clients: Vec<Client> = (0..3).map(|_| Client::new(chain.cfg.clone(), 0)).collect();

    let pending: Vec<_> = clients.iter_mut().map(|c| c.on_round_start(0).unwrap()).collect();
    let admissions: Vec<_> = clients
        .iter()
        .zip(&pending)
        .map(|(c, p)| (c.public_key(), c.outer_onion(p)))
        .collect();

    let replies = run_round(&chain, 0, &admissions);
    assert_eq!(replies.len(), 3);

    for (client, pending) in clients.iter().zip(&pending) {
        assert!(pending.is_cover());
        assert!(client.decrypt_reply(pending, &replies[&client.public_key()]).is_none());
    }
}

#[tokio::test]
async fn three_clients_two_paired_one_idle() {
    let chain = build_chain(1);
    let mut alice = Client::new(chain.cfg.clone(), 0);
    let mut bob = Client::new(chain.cfg.clone(), 0);
    let mut carol = Client::new(chain.cfg.clone(), 0);
    alice.dial(bob.public_key());
    bob.dial(alice.public_key());
    alice.new_message(b"A to B".to_vec()).unwrap();
    bob.new_message(b"B to A".to_vec()).unwrap();
    // carol dials and enqueues nothing -> on_round_start treats her as cover.

    let pending_alice = alice.on_round_start(0).unwrap();
    let pending_bob = bob.on_round_start(0).unwrap();
    let pending_carol = carol.on_round_start(0).unwrap();
    assert!(pending_carol.is_cover());

    let admissions = vec![
        (alice.public_key(), alice.outer_onion(&pending_alice)),
        (bob.public_key(), bob.outer_onion(&pending_bob)),
        (carol.public_key(), carol.outer_onion(&pending_carol)),
    ];
    let replies = run_round(&chain, 0, &admissions);

    assert_eq!(alice.decrypt_reply(&pending_alice, &replies[&alice.public_key()]).unwrap(), b"B to A");
    assert_eq!(bob.decrypt_reply(&pending_bob, &replies[&bob.public_key()]).unwrap(), b"A to B");
    assert!(carol.decrypt_reply(&pending_carol, &replies[&carol.public_key()]).is_none());
}

#[tokio::test]
async fn late_arrival_is_dropped_without_affecting_others() {
    let chain = build_chain(1);
    let mut alice = Client::new(chain.cfg.clone(), 0);
    let mut bob = Client::new(chain.cfg.clone(), 0);
    alice.dial(bob.public_key());
    bob.dial(alice.public_key());
    alice.new_message(b"on time".to_vec()).unwrap();
    bob.new_message(b"also on time".to_vec()).unwrap();

    let pending_alice = alice.on_round_start(0).unwrap();
    let pending_bob = bob.on_round_start(0).unwrap();

    chain.front.start_round(0);
    chain.front.admit(alice.public_key(), &alice.outer_onion(&pending_alice)).unwrap();
    chain.front.admit(bob.public_key(), &bob.outer_onion(&pending_bob)).unwrap();

    // D's onion "arrives" only after the admission window has already
    // closed for this round.
    let mut dave = Client::new(chain.cfg.clone(), 0);
    let pending_dave = dave.on_round_start(0).unwrap();
    let to_middle = chain.front.close_and_shuffle();
    assert!(matches!(
        chain.front.admit(dave.public_key(), &dave.outer_onion(&pending_dave)),
        Err(mixchain_core::server::front::FrontError::RoundClosed)
    ));

    let n = 2;
    chain.middle.start_round(0);
    chain.middle.set_expected(n);
    for body in &to_middle {
        let layer: ChainLayer = bincode::deserialize(body).unwrap();
        chain.middle.admit(&layer).unwrap();
    }
    let to_spreading = chain.middle.close_and_shuffle();

    chain.spreading.start_round(0);
    chain.spreading.set_expected(n);
    for body in &to_spreading {
        chain.spreading.admit(body).unwrap();
    }
    let routed = chain.spreading.route_to_dead_drops();

    let mut dd_replies = HashMap::new();
    for (dead_drop_index, indices_and_layers) in &routed.dest {
        let dd = &chain.dead_drops[*dead_drop_index as usize];
        dd.start_round(0);
        dd.set_expected(indices_and_layers.len());
        for (_, layer) in indices_and_layers {
            dd.admit(layer).unwrap();
        }
        dd_replies.insert(*dead_drop_index, dd.match_and_wrap());
    }

    let from_spreading = chain.spreading.complete_round(&routed, dd_replies);
    let from_middle = chain.middle.complete_round(from_spreading);
    let replies: HashMap<_, _> = chain.front.complete_round(from_middle).into_iter().collect();

    assert_eq!(replies.len(), 2);
    assert_eq!(alice.decrypt_reply(&pending_alice, &replies[&alice.public_key()]).unwrap(), b"also on time");
    assert_eq!(bob.decrypt_reply(&pending_bob, &replies[&bob.public_key()]).unwrap(), b"on time");
}

#[tokio::test]
async fn multiple_rounds_use_different_slots_but_still_match() {
    let chain = build_chain(1);
    let mut alice = Client::new(chain.cfg.clone(), 0);
    let mut bob = Client::new(chain.cfg.clone(), 0);
    alice.dial(bob.public_key());
    bob.dial(alice.public_key());

    for round in 0u64..3 {
        alice.new_message(format!("a-says-{round}").into_bytes()).unwrap();
        bob.new_message(format!("b-says-{round}").into_bytes()).unwrap();

        let pending_alice = alice.on_round_start(round).unwrap();
        let pending_bob = bob.on_round_start(round).unwrap();
        let admissions = vec![
            (alice.public_key(), alice.outer_onion(&pending_alice)),
            (bob.public_key(), bob.outer_onion(&pending_bob)),
        ];
        let replies = run_round(&chain, round, &admissions);

        let alice_reply = alice.decrypt_reply(&pending_alice, &replies[&alice.public_key()]).unwrap();
        let bob_reply = bob.decrypt_reply(&pending_bob, &replies[&bob.public_key()]).unwrap();
        assert_eq!(alice_reply, format!("b-says-{round}").into_bytes());
        assert_eq!(bob_reply, format!("a-says-{round}").into_bytes());
    }
}

/// Spec §4.3: the spreading server fans inbound traffic out across
/// however many dead-drop servers the chain configures, and §4.4's
/// matching is per-dead-drop — a pair's slot determines which single
/// dead drop both messages land on, but distinct pairs scatter across
/// all of them.
#[tokio::test]
async fn multiple_pairs_scatter_across_several_dead_drops_and_still_match() {
    let chain = build_chain(8);
    let mut pairs: Vec<(Client, Client)> = (0..5)
        .map(|_| (Client::new(chain.cfg.clone(), 0), Client::new(chain.cfg.clone(), 0)))
        .collect();
    for (a, b) in pairs.iter_mut() {
        let (pk_a, pk_b) = (a.public_key(), b.public_key());
        a.dial(pk_b);
        b.dial(pk_a);
    }
    for (i, (a, b)) in pairs.iter_mut().enumerate() {
        a.new_message(format!("a{i}-to-b{i}").into_bytes()).unwrap();
        b.new_message(format!("b{i}-to-a{i}").into_bytes()).unwrap();
    }

    let pending: Vec<_> = pairs
        .iter_mut()
        .map(|(a, b)| (a.on_round_start(0).unwrap(), b.on_round_start(0).unwrap()))
        .collect();
    let admissions: Vec<_> = pairs
        .iter()
        .zip(&pending)
        .flat_map(|((a, b), (pa, pb))| {
            [(a.public_key(), a.outer_onion(pa)), (b.public_key(), b.outer_onion(pb))]
        })
        .collect();

    let replies = run_round(&chain, 0, &admissions);

    for (i, ((a, b), (pa, pb))) in pairs.iter().zip(&pending).enumerate() {
        let a_reply = a.decrypt_reply(pa, &replies[&a.public_key()]).unwrap();
        let b_reply = b.decrypt_reply(pb, &replies[&b.public_key()]).unwrap();
        assert_eq!(a_reply, format!("b{i}-to-a{i}").into_bytes());
        assert_eq!(b_reply, format!("a{i}-to-b{i}").into_bytes());
    }
}
